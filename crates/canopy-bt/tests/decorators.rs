use std::sync::Arc;

use canopy_bt::{AiHandler, Behaviors, BtStatus, HandlerConfig};
use canopy_core::{Agent, NodeHash, TreeId};
use canopy_tools::VecTraceSink;
use canopy_tree::{Forest, NodeKind, Subtree};

#[derive(Debug, Default)]
struct Npc {
    counter: u32,
    ran: bool,
}

impl Agent for Npc {
    fn stable_id(&self) -> u64 {
        11
    }
}

fn behaviors() -> Arc<Behaviors<Npc>> {
    Arc::new(
        Behaviors::<Npc>::new()
            .with_condition("always", |_, _| true)
            .with_condition("never", |_, _| false)
            .with_command("inc", |npc, _| npc.counter += 1)
            .with_command("run", |npc, _| npc.ran = true),
    )
}

fn forest_with(subtree: Subtree) -> (Forest, TreeId) {
    let mut forest = Forest::new();
    let id = forest.create("main");
    let tree = forest.get_mut(id).unwrap();
    let root = tree.root().clone();
    tree.add(subtree, &root, None, false).unwrap();
    (forest, id)
}

fn hash_of(forest: &Forest, id: TreeId, name: &str) -> NodeHash {
    forest
        .get(id)
        .unwrap()
        .find_by_name(name)
        .next()
        .unwrap()
        .hash()
        .clone()
}

fn bound_with(forest: &Forest, id: TreeId, config: HandlerConfig) -> AiHandler<Npc> {
    let mut handler = AiHandler::with_config(behaviors(), config);
    handler.setup(forest, &Npc::default(), Some(id.into()), false).unwrap();
    handler
}

fn bound(forest: &Forest, id: TreeId) -> AiHandler<Npc> {
    bound_with(forest, id, HandlerConfig::default())
}

fn decorate(kind: NodeKind, child: Subtree) -> Subtree {
    Subtree::new("deco", kind).with_child(child)
}

fn status_of(kind: NodeKind, child: Subtree) -> BtStatus {
    let (forest, id) = forest_with(decorate(kind, child));
    let mut handler = bound(&forest, id);
    handler.tick(&forest, &mut Npc::default()).unwrap()
}

#[test]
fn inverter_succeeder_failer() {
    assert_eq!(
        status_of(NodeKind::Inverter, Subtree::condition("c", "never")),
        BtStatus::Success
    );
    assert_eq!(
        status_of(NodeKind::Inverter, Subtree::condition("c", "always")),
        BtStatus::Failure
    );
    assert_eq!(
        status_of(NodeKind::Succeeder, Subtree::condition("c", "never")),
        BtStatus::Success
    );
    assert_eq!(
        status_of(NodeKind::Failer, Subtree::condition("c", "always")),
        BtStatus::Failure
    );
    assert_eq!(
        status_of(NodeKind::Inverter, Subtree::condition("c", "unknown")),
        BtStatus::Error
    );
}

#[test]
fn repeater_ticks_child_twice_then_succeeds() {
    let (forest, id) = forest_with(decorate(
        NodeKind::Repeater { repeats: 2 },
        Subtree::command("bump", "inc"),
    ));
    let deco = hash_of(&forest, id, "deco");
    let mut handler = bound(&forest, id);
    let mut npc = Npc::default();

    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Running);
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Running);
    assert_eq!(npc.counter, 2);

    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Success);
    assert_eq!(npc.counter, 2);
    assert_eq!(
        handler.blackboard().unwrap().state(&deco).unwrap().repeat_count(),
        Some(0)
    );

    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Running);
    assert_eq!(npc.counter, 3);
}

#[test]
fn repeater_counts_failures_too() {
    let (forest, id) = forest_with(decorate(
        NodeKind::Repeater { repeats: 1 },
        Subtree::condition("c", "never"),
    ));
    let mut handler = bound(&forest, id);
    let mut npc = Npc::default();
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Running);
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Success);
}

#[test]
fn limiter_allows_exactly_its_budget() {
    let (forest, id) = forest_with(decorate(
        NodeKind::Limiter { limit: 2 },
        Subtree::command("bump", "inc"),
    ));
    let deco = hash_of(&forest, id, "deco");
    let mut handler = bound(&forest, id);
    let mut npc = Npc::default();

    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Success);
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Success);
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Failure);
    assert_eq!(npc.counter, 2);
    assert_eq!(
        handler.blackboard().unwrap().state(&deco).unwrap().remaining(),
        Some(0)
    );
}

#[test]
fn limiter_budget_can_be_topped_up() {
    let (forest, id) = forest_with(decorate(
        NodeKind::Limiter { limit: 1 },
        Subtree::command("bump", "inc"),
    ));
    let deco = hash_of(&forest, id, "deco");
    let mut handler = bound(&forest, id);
    let mut npc = Npc::default();

    handler.tick(&forest, &mut npc).unwrap();
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Failure);
    handler
        .blackboard_mut()
        .unwrap()
        .state_mut(&deco)
        .unwrap()
        .set_remaining(1);
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Success);
    assert_eq!(npc.counter, 2);
}

#[test]
fn allocator_waits_while_resource_is_taken() {
    let (forest, id) = forest_with(decorate(
        NodeKind::Allocator {
            resources: vec!["door".to_string(), "key".to_string()],
        },
        Subtree::command("go", "run"),
    ));
    let mut handler = bound(&forest, id);
    let mut npc = Npc::default();
    handler.blackboard_mut().unwrap().globals.claim("key");

    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Running);
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Running);
    assert!(!npc.ran);

    handler.blackboard_mut().unwrap().globals.release("key");
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Success);
    assert!(npc.ran);

    let resources = &handler.blackboard().unwrap().globals.resources;
    assert_eq!(resources.len(), 1);
    assert_eq!(resources.get("key"), Some(&false));
}

#[test]
fn verifier_gates_its_child() {
    let (forest, id) = forest_with(decorate(
        NodeKind::Verifier {
            predicate: "never".to_string(),
        },
        Subtree::command("go", "run"),
    ));
    let mut handler = bound(&forest, id);
    let mut npc = Npc::default();
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Failure);
    assert!(!npc.ran);

    let (forest, id) = forest_with(decorate(
        NodeKind::Verifier {
            predicate: "always".to_string(),
        },
        Subtree::command("go", "run"),
    ));
    let mut handler = bound(&forest, id);
    assert_eq!(handler.tick(&forest, &mut npc).unwrap(), BtStatus::Success);
    assert!(npc.ran);
}

#[test]
fn echo_nodes_emit_trace_events() {
    let (forest, id) = forest_with(
        Subtree::new(
            "announce",
            NodeKind::EchoDecorator {
                message: "entering".to_string(),
            },
        )
        .with_child(Subtree::new(
            "say",
            NodeKind::EchoLeaf {
                message: "hello".to_string(),
                succeed: false,
            },
        )),
    );
    let say = hash_of(&forest, id, "say");
    let config = HandlerConfig {
        record_trace: true,
        ..HandlerConfig::default()
    };
    let mut handler = bound_with(&forest, id, config);
    let sink = VecTraceSink::default();
    handler
        .blackboard_mut()
        .unwrap()
        .set_trace_sink(Some(Box::new(sink.clone())));

    assert_eq!(
        handler.tick(&forest, &mut Npc::default()).unwrap(),
        BtStatus::Failure
    );

    let log = handler.blackboard().unwrap().trace_log().unwrap();
    let echoes: Vec<_> = log.with_tag("bt.echo").collect();
    assert_eq!(echoes.len(), 2);
    assert_eq!(echoes[0].detail, "entering");
    assert_eq!(echoes[1].detail, "hello");
    assert_eq!(echoes[1].node.as_ref(), Some(&say));
    assert_eq!(echoes[1].tick, 1);
    assert_eq!(sink.snapshot().len(), 2);
}

#[test]
fn lifecycle_events_when_enabled() {
    let (forest, id) = forest_with(decorate(NodeKind::Inverter, Subtree::condition("c", "never")));
    let config = HandlerConfig {
        record_trace: true,
        trace_lifecycle: true,
        ..HandlerConfig::default()
    };
    let mut handler = bound_with(&forest, id, config);
    handler.tick(&forest, &mut Npc::default()).unwrap();

    let log = handler.blackboard().unwrap().trace_log().unwrap();
    // root, deco and c each open and close once
    assert_eq!(log.with_tag("bt.open").count(), 3);
    assert_eq!(log.with_tag("bt.close").count(), 3);
    assert_eq!(log.with_tag("bt.abandon").count(), 0);

    let drained = handler
        .blackboard_mut()
        .unwrap()
        .tracer_mut()
        .take_log()
        .unwrap();
    assert_eq!(drained.with_tag("bt.open").count(), 3);
    let log = handler.blackboard().unwrap().trace_log().unwrap();
    assert_eq!(log.with_tag("bt.open").count(), 0);
}
