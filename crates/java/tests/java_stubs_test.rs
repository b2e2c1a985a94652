use std::sync::Arc;
use stub_core::{
    collect_index_entries, shared_char_table, CharTable, PsiMaterializer, StubBuilder,
    StubLocation, StubSerializer, StubTree,
};
use stub_java::{
    flags, java_registry, parse_java, JavaKind, CLASS_SHORT_NAME_INDEX, FIELD_NAME_INDEX,
    METHOD_NAME_INDEX, SERVICE_PROVIDES_INDEX, SERVICE_USES_INDEX,
};

const PAIR: &str = r#"
package com.example;

public class Pair<T, U> {
    private T first;
    U second, third;

    public Pair(T first, U second) {
        this.first = first;
    }

    public T getFirst() {
        return first;
    }
}
"#;

fn build(source: &str) -> StubTree {
    let registry = java_registry().unwrap();
    let light = parse_java("Test.java", source).unwrap();
    let chars = CharTable::new();
    StubBuilder::new(&registry)
        .build(&light.walker(&chars))
        .unwrap()
}

#[test]
fn test_generic_class_stubs() {
    let tree = build(PAIR);

    assert_eq!(tree.root().name().map(|n| &**n), Some("com.example"));
    let class = tree.stubs_of_type(JavaKind::Class.id())[0];
    assert_eq!(class.name().map(|n| &**n), Some("Pair"));
    assert_eq!(class.fields().name(1).map(|n| &**n), Some("com.example.Pair"));
    assert_eq!(class.fields().flags(2) & flags::PUBLIC, flags::PUBLIC);

    let kinds: Vec<_> = class.children().map(JavaKind::of).collect();
    assert_eq!(
        kinds,
        vec![
            Some(JavaKind::TypeParameterList),
            Some(JavaKind::Field),
            Some(JavaKind::Field),
            Some(JavaKind::Method),
            Some(JavaKind::Method),
        ]
    );

    // 型パラメータはリストの下に順序どおり
    let list = class.children().next().unwrap();
    let params: Vec<&str> = list.children().filter_map(|p| p.name()).map(|n| &**n).collect();
    assert_eq!(params, vec!["T", "U"]);

    let fields = tree.stubs_of_type(JavaKind::Field.id());
    assert_eq!(fields[1].fields().names(0).len(), 2);
    assert_eq!(fields[0].fields().flags(1) & flags::PRIVATE, flags::PRIVATE);

    let methods = tree.stubs_of_type(JavaKind::Method.id());
    assert_eq!(methods[0].fields().flags(1) & flags::CONSTRUCTOR, flags::CONSTRUCTOR);
    assert_eq!(methods[0].fields().int(2), Some(2));
    assert_eq!(methods[1].name().map(|n| &**n), Some("getFirst"));
}

#[test]
fn test_round_trip_and_index_entries() {
    let registry = java_registry().unwrap();
    let tree = build(PAIR);

    let codec = StubSerializer::new(&registry);
    let decoded = codec.deserialize(&codec.serialize(&tree).unwrap()).unwrap();
    assert_eq!(decoded, tree);

    let entries = collect_index_entries(&registry, &decoded).unwrap();
    let keys_of = |index: stub_core::StubIndexKey| -> Vec<String> {
        entries
            .iter()
            .filter(|e| e.index == index)
            .map(|e| e.key.to_string())
            .collect()
    };
    assert_eq!(keys_of(CLASS_SHORT_NAME_INDEX), vec!["Pair"]);
    assert_eq!(keys_of(FIELD_NAME_INDEX), vec!["first", "second", "third"]);
    assert_eq!(keys_of(METHOD_NAME_INDEX), vec!["getFirst"]);

    // 型パラメータの位置からはエントリが出ない
    for param in decoded.stubs_of_type(JavaKind::TypeParameter.id()) {
        let location = decoded.location(param.id()).unwrap();
        assert!(entries.iter().all(|e| e.location != location));
    }
}

#[test]
fn test_module_directives() {
    let source = r#"
module com.example.app {
    requires transitive java.logging;
    uses com.example.spi.Plugin;
    provides com.example.spi.Plugin with com.example.impl.DefaultPlugin;
}
"#;
    let registry = java_registry().unwrap();
    let tree = build(source);

    let module = tree.stubs_of_type(JavaKind::Module.id())[0];
    assert_eq!(module.name().map(|n| &**n), Some("com.example.app"));

    let uses = tree.stubs_of_type(JavaKind::Uses.id());
    assert_eq!(uses.len(), 1);
    assert_eq!(uses[0].name().map(|n| &**n), Some("com.example.spi.Plugin"));

    let provides = tree.stubs_of_type(JavaKind::Provides.id())[0];
    assert_eq!(
        provides.fields().names(1).iter().map(|n| &**n).collect::<Vec<_>>(),
        vec!["com.example.impl.DefaultPlugin"]
    );

    let entries = collect_index_entries(&registry, &tree).unwrap();
    assert!(entries
        .iter()
        .any(|e| e.index == SERVICE_USES_INDEX && &*e.key == "com.example.spi.Plugin"));
    assert!(entries
        .iter()
        .any(|e| e.index == SERVICE_PROVIDES_INDEX && &*e.key == "com.example.spi.Plugin"));
}

#[test]
fn test_materialize_type_parameter_bound() {
    let source = "class Box<T extends Comparable<T>> { T value; }";
    let registry = java_registry().unwrap();
    let light = Arc::new(parse_java("Box.java", source).unwrap());
    let (tree, bindings) = StubBuilder::new(&registry)
        .build_with_bindings(&light.walker(shared_char_table()))
        .unwrap();

    let materializer =
        PsiMaterializer::with_bindings(registry.clone(), Arc::new(tree), light, bindings);

    // file / class / type parameter list / type parameter
    let param = materializer
        .materialize_at(&StubLocation::from_path(vec![0, 0, 0]))
        .unwrap();
    assert_eq!(param.name.as_deref(), Some("T"));
    assert_eq!(param.property("bound"), Some("extends Comparable<T>"));
    assert_eq!(param.text.as_deref(), Some("T extends Comparable<T>"));

    let class = materializer
        .materialize_at(&StubLocation::from_path(vec![0]))
        .unwrap();
    assert_eq!(class.property("kind"), Some("class"));
    assert_eq!(class.text.as_deref(), Some(source));
}

#[test]
fn test_multiple_top_level_classes() {
    let tree = build("class Ok { int a; } class Fine { void run() {} }");
    assert_eq!(tree.stubs_of_type(JavaKind::Class.id()).len(), 2);
}
