//! Property-based tests for the stub codec
//!
//! Random toy light trees (nested classes, type parameters, transparent and
//! skipped nodes) must build deterministically and survive a round trip.

use proptest::prelude::*;
use stub_core::test_fixtures::toy_registry;
use stub_core::{
    collect_index_entries, CharTable, LightTree, LightTreeBuilder, StubBuilder, StubSerializer,
};

const KINDS: [&str; 6] = [
    "class",
    "type_parameter",
    "type_parameters",
    "block",
    "class_body",
    "comment",
];
// 重複した名前で後方参照も通る
const NAMES: [&str; 5] = ["T", "U", "List", "Map", "T"];

#[derive(Debug, Clone)]
enum Op {
    Open(usize),
    Close,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..KINDS.len()).prop_map(Op::Open),
        2 => Just(Op::Close),
    ]
}

/// 操作列からバランスの取れたライトツリーを作る
fn light_tree(ops: &[Op], names: &[usize]) -> LightTree {
    let mut b = LightTreeBuilder::new();
    b.start_node("file");
    let mut depth = 0;
    let mut next_name = names.iter().cycle();
    for op in ops {
        match *op {
            Op::Open(kind) => {
                b.start_node(KINDS[kind]);
                if matches!(KINDS[kind], "class" | "type_parameter") {
                    let name = next_name.next().copied().unwrap_or(0);
                    b.token("identifier", NAMES[name]);
                }
                depth += 1;
            }
            Op::Close if depth > 0 => {
                b.finish_node();
                depth -= 1;
            }
            Op::Close => {}
        }
    }
    for _ in 0..depth {
        b.finish_node();
    }
    b.finish_node();
    b.finish().unwrap()
}

fn tree_strategy() -> impl Strategy<Value = LightTree> {
    (
        prop::collection::vec(op_strategy(), 0..120),
        prop::collection::vec(0..NAMES.len(), 1..8),
    )
        .prop_map(|(ops, names)| light_tree(&ops, &names))
}

/// Property: deserialize(serialize(tree)) == tree, and the index entries of
/// the decoded tree equal those of the built one.
#[test]
fn prop_round_trip_preserves_tree_and_entries() {
    let registry = toy_registry();
    let codec = StubSerializer::new(&registry);

    proptest!(|(light in tree_strategy())| {
        let chars = CharTable::new();
        let tree = StubBuilder::new(&registry).build(&light.walker(&chars)).unwrap();

        let bytes = codec.serialize(&tree).unwrap();
        let decoded = codec.deserialize(&bytes).unwrap();
        prop_assert_eq!(&decoded, &tree);

        // 名前テーブルに重複はない
        let table = decoded.string_table();
        for (i, name) in table.iter().enumerate() {
            prop_assert!(!table[..i].contains(name), "duplicate name {}", name);
        }

        prop_assert_eq!(
            collect_index_entries(&registry, &decoded).unwrap(),
            collect_index_entries(&registry, &tree).unwrap()
        );

        for stub in decoded.preorder() {
            let location = decoded.location(stub.id()).unwrap();
            prop_assert_eq!(decoded.resolve(&location), Some(stub.id()));
        }
    });
}

/// Property: building and serializing the same light tree twice gives equal
/// trees and identical bytes.
#[test]
fn prop_build_and_serialize_are_deterministic() {
    let registry = toy_registry();
    let codec = StubSerializer::new(&registry);

    proptest!(|(light in tree_strategy())| {
        let first = StubBuilder::new(&registry)
            .build(&light.walker(&CharTable::new()))
            .unwrap();
        let second = StubBuilder::new(&registry)
            .build(&light.walker(&CharTable::new()))
            .unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(codec.serialize(&first).unwrap(), codec.serialize(&second).unwrap());
    });
}
