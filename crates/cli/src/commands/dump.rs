use super::utils::*;
use crate::config::IndexerConfig;
use anyhow::Result;
use serde_json::{json, Value};
use stub_core::{ElementTypeId, ElementTypeRegistry, StubField, StubTree, UnitId};

pub fn handle_dump(config: &IndexerConfig, file: &str, as_json: bool) -> Result<()> {
    let project = open_project(config)?;
    let unit = UnitId::new(file);
    let tree = project.dump(&unit)?;

    if as_json {
        let value = tree_to_json(project.registry(), &tree);
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_info(&format!("{} ({} stubs, version {:016x})", unit, tree.len(), tree.version()), "🌳");
    for line in render_tree(project.registry(), &tree) {
        println!("{}", line);
    }
    Ok(())
}

/// 1スタブ1行、深さでインデントする
pub fn render_tree(registry: &ElementTypeRegistry, tree: &StubTree) -> Vec<String> {
    tree.preorder()
        .filter_map(|stub| {
            let location = tree.location(stub.id())?;
            let fields: Vec<String> = stub.fields().iter().map(field_text).collect();
            Some(format!(
                "{}{} {} [{}]",
                "  ".repeat(location.depth()),
                location,
                type_name(registry, stub.element_type()),
                fields.join(", ")
            ))
        })
        .collect()
}

pub fn tree_to_json(registry: &ElementTypeRegistry, tree: &StubTree) -> Value {
    let stubs: Vec<Value> = tree
        .preorder()
        .map(|stub| {
            json!({
                "location": tree.location(stub.id()).map(|l| l.to_string()),
                "type": type_name(registry, stub.element_type()),
                "fields": stub.fields().iter().map(field_json).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "version": format!("{:016x}", tree.version()),
        "strings": tree.string_table().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        "stubs": stubs,
    })
}

fn type_name(registry: &ElementTypeRegistry, id: ElementTypeId) -> &'static str {
    registry
        .resolve(id)
        .map(|element_type| element_type.external_id())
        .unwrap_or("<unknown>")
}

fn field_text(field: &StubField) -> String {
    match field {
        StubField::Name(Some(name)) => format!("{:?}", &**name),
        StubField::Name(None) => "-".to_string(),
        StubField::Names(names) => format!(
            "[{}]",
            names.iter().map(|n| &**n).collect::<Vec<_>>().join(" ")
        ),
        StubField::Flags(flags) => format!("{:#x}", flags),
        StubField::Int(value) => value.to_string(),
        StubField::Bool(value) => value.to_string(),
    }
}

fn field_json(field: &StubField) -> Value {
    match field {
        StubField::Name(name) => json!(name.as_deref()),
        StubField::Names(names) => json!(names.iter().map(|n| n.to_string()).collect::<Vec<_>>()),
        StubField::Flags(flags) => json!(flags),
        StubField::Int(value) => json!(value),
        StubField::Bool(value) => json!(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stub_core::{CharTable, StubBuilder};
    use stub_java::{java_registry, parse_java};

    fn pair_tree() -> (std::sync::Arc<ElementTypeRegistry>, StubTree) {
        let registry = java_registry().unwrap();
        let light = parse_java("Pair.java", "class Pair<T> { T first; }").unwrap();
        let chars = CharTable::new();
        let tree = StubBuilder::new(&registry).build(&light.walker(&chars)).unwrap();
        (registry, tree)
    }

    #[test]
    fn test_render_tree() {
        let (registry, tree) = pair_tree();
        let lines = render_tree(&registry, &tree);
        assert_eq!(lines.len(), tree.len());
        assert!(lines[1].contains("java.CLASS"));
        assert!(lines[1].contains("\"Pair\""));
    }

    #[test]
    fn test_tree_to_json() {
        let (registry, tree) = pair_tree();
        let value = tree_to_json(&registry, &tree);
        assert_eq!(value["stubs"].as_array().unwrap().len(), tree.len());
        assert_eq!(value["stubs"][1]["location"], "/0");
        assert_eq!(value["stubs"][1]["fields"][0], "Pair");
    }
}
