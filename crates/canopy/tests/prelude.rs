#![cfg(feature = "bt")]

use std::sync::Arc;

use canopy::prelude::*;

#[test]
fn prelude_drives_a_tree() {
    let mut forest = Forest::new();
    let id = forest.create("hello");
    let tree = forest.get_mut(id).unwrap();
    let root = tree.root().clone();
    tree.add(Subtree::command("greet", "greet"), &root, None, false)
        .unwrap();

    let behaviors = Arc::new(Behaviors::<u64>::new().with_command("greet", |_, globals| {
        globals.values.insert("greeted".into(), true.into());
    }));
    let mut handler = AiHandler::new(behaviors);
    let mut agent = 9u64;
    handler.setup(&forest, &agent, Some("hello".into()), false).unwrap();

    assert_eq!(handler.tick(&forest, &mut agent).unwrap(), BtStatus::Success);
    let globals = &handler.blackboard().unwrap().globals;
    assert_eq!(globals.values["greeted"], serde_json::Value::Bool(true));
}

#[cfg(feature = "serde")]
#[test]
fn subtree_loads_from_json() {
    let subtree: Subtree = serde_json::from_str(
        r#"{"name":"gate","kind":{"type":"limiter","limit":2},
            "children":[{"name":"go","kind":{"type":"command","action":"go"}}]}"#,
    )
    .unwrap();
    assert_eq!(subtree.kind, NodeKind::Limiter { limit: 2 });
    assert_eq!(subtree.node_count(), 2);
    assert_eq!(subtree.children[0].weight, 1.0);
}
