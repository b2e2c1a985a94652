use stub_core::{LightTree, LightTreeBuilder, Result, StubError, SyntaxKind};
use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

/// Tree-sitterベースのJavaパーサー
///
/// 構文木をそのままライトツリーに写す。葉ノード（キーワードなどの無名トークンも含む）は
/// トークン、それ以外は複合ノードになる。
pub struct JavaParser {
    parser: Parser,
}

impl JavaParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(tree_sitter_java::language())
            .map_err(|e| StubError::Source {
                unit: "<java grammar>".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    /// ソースをパースしてライトツリーを返す
    pub fn parse(&mut self, unit: &str, source: &str) -> Result<LightTree> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| StubError::Source {
                unit: unit.to_string(),
                message: "parser produced no tree".to_string(),
            })?;
        if tree.root_node().has_error() {
            debug!("{} has syntax errors; erroneous regions are skipped", unit);
        }
        to_light_tree(&tree, source)
    }
}

/// Parses one Java source with a fresh parser.
pub fn parse_java(unit: &str, source: &str) -> Result<LightTree> {
    JavaParser::new()?.parse(unit, source)
}

fn to_light_tree(tree: &Tree, source: &str) -> Result<LightTree> {
    let mut builder = LightTreeBuilder::with_source(source);
    let mut cursor = tree.walk();

    'walk: loop {
        let node = cursor.node();
        if node.child_count() == 0 {
            builder.token_at(light_kind(node), node.byte_range());
        } else {
            builder.start_node_at(light_kind(node), node.start_byte());
            if cursor.goto_first_child() {
                continue;
            }
        }

        // 次の兄弟へ、なければ親を閉じながら上がる
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
            builder.finish_node_at(cursor.node().end_byte());
        }
    }

    builder.finish()
}

/// Syntax kind recorded in the light tree.
///
/// Older grammar releases emit one generic `module_directive`; it is split by
/// its leading keyword so every directive has its own kind.
fn light_kind(node: Node<'_>) -> SyntaxKind {
    let kind = node.kind();
    if kind != "module_directive" {
        return kind;
    }
    match node.child(0).map(|keyword| keyword.kind()) {
        Some("requires") => "requires_module_directive",
        Some("exports") => "exports_module_directive",
        Some("opens") => "opens_module_directive",
        Some("uses") => "uses_module_directive",
        Some("provides") => "provides_module_directive",
        _ => kind,
    }
}
