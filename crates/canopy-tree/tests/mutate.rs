use canopy_core::NodeHash;
use canopy_tree::{NodeKind, NodeOrigin, ParallelSpec, Subtree, TopologyError, Tree};

fn seq(name: &str) -> Subtree {
    Subtree::new(name, NodeKind::Sequence)
}

fn cond(name: &str) -> Subtree {
    Subtree::condition(name, "always")
}

/// root -> Sequence "main" [Condition "a", Condition "b", Inverter "inv" -> Condition "c"]
fn sample() -> (Tree, NodeHash) {
    let mut tree = Tree::new("sample");
    let root = tree.root().clone();
    let main = tree
        .add(
            seq("main").with_children([
                cond("a"),
                cond("b"),
                Subtree::new("inv", NodeKind::Inverter).with_child(cond("c")),
            ]),
            &root,
            None,
            false,
        )
        .unwrap();
    (tree, main)
}

fn by_name(tree: &Tree, name: &str) -> NodeHash {
    tree.find_by_name(name).next().unwrap().hash().clone()
}

fn child_names(tree: &Tree, hash: &NodeHash) -> Vec<String> {
    tree.children_of(hash)
        .iter()
        .map(|h| tree.get(h).unwrap().name().to_string())
        .collect()
}

#[test]
fn add_registers_whole_subtree_with_unique_hashes() {
    let (tree, main) = sample();
    assert_eq!(tree.node_count(), 6);
    assert!(tree.is_consistent());
    assert_eq!(child_names(&tree, &main), vec!["a", "b", "inv"]);

    let mut seen = std::collections::BTreeSet::new();
    for node in tree.nodes() {
        assert!(node.hash().is_scoped_to(tree.id()));
        assert!(seen.insert(node.hash().clone()));
    }
}

#[test]
fn add_to_leaf_fails_and_leaves_tree_unchanged() {
    let (mut tree, _) = sample();
    let before = tree.node_count();
    let leaf = by_name(&tree, "a");

    let err = tree.add(cond("x"), &leaf, None, false).unwrap_err();
    assert!(matches!(err, TopologyError::LeafTarget { .. }));
    assert!(!err.to_string().is_empty());
    assert_eq!(tree.node_count(), before);
    assert!(tree.is_consistent());
}

#[test]
fn add_to_occupied_decorator_fails() {
    let (mut tree, _) = sample();
    let inv = by_name(&tree, "inv");
    let err = tree.add(cond("x"), &inv, None, false).unwrap_err();
    assert!(matches!(err, TopologyError::TargetOccupied { .. }));

    let root = tree.root().clone();
    let err = tree.add(cond("x"), &root, None, false).unwrap_err();
    assert!(matches!(err, TopologyError::TargetOccupied { .. }));
}

#[test]
fn root_nodes_cannot_be_added() {
    let (mut tree, main) = sample();
    let err = tree
        .add(Subtree::new("r", NodeKind::Root), &main, None, false)
        .unwrap_err();
    assert_eq!(err, TopologyError::RootNode);

    let root = tree.root().clone();
    let err = tree.add(&root, &main, None, true).unwrap_err();
    assert_eq!(err, TopologyError::RootNode);
}

#[test]
fn malformed_detached_subtree_is_rejected() {
    let (mut tree, main) = sample();
    let bad = cond("leaf").with_child(cond("child"));
    let err = tree.add(bad, &main, None, false).unwrap_err();
    assert!(matches!(err, TopologyError::MalformedSubtree(_)));
    assert_eq!(tree.node_count(), 6);
}

#[test]
fn add_inserts_at_position() {
    let (mut tree, main) = sample();
    tree.add(cond("first"), &main, Some(0), false).unwrap();
    tree.add(cond("last"), &main, Some(99), false).unwrap();
    assert_eq!(child_names(&tree, &main), vec!["first", "a", "b", "inv", "last"]);
}

#[test]
fn moving_locally_keeps_hashes() {
    let (mut tree, main) = sample();
    let c = by_name(&tree, "c");
    let inv = by_name(&tree, "inv");

    let moved = tree.add(&c, &main, Some(0), false).unwrap();
    assert_eq!(moved, c);
    assert_eq!(child_names(&tree, &main), vec!["c", "a", "b", "inv"]);
    assert!(tree.children_of(&inv).is_empty());
    assert!(tree.is_consistent());
}

#[test]
fn moving_into_own_descendant_is_refused() {
    let (mut tree, main) = sample();
    let inner = tree.add(seq("inner"), &main, None, false).unwrap();
    let err = tree.add(&main, &inner, None, false).unwrap_err();
    assert_eq!(err, TopologyError::WouldCycle(main.clone()));
    assert!(tree.is_consistent());
}

#[test]
fn moving_a_decorators_only_child_back_under_it_is_allowed() {
    let (mut tree, _) = sample();
    let inv = by_name(&tree, "inv");
    let c = by_name(&tree, "c");
    tree.add(&c, &inv, None, false).unwrap();
    assert_eq!(tree.children_of(&inv), &[c]);
}

#[test]
fn copying_within_a_tree_rehashes_the_clone() {
    let (mut tree, main) = sample();
    let inv = by_name(&tree, "inv");
    let before = tree.node_count();

    let copy = tree.add(&inv, &main, None, true).unwrap();
    assert_ne!(copy, inv);
    assert_eq!(tree.node_count(), before + 2);
    assert_eq!(tree.get(&copy).unwrap().name(), "inv");
    assert_eq!(child_names(&tree, &copy), vec!["c"]);
    assert!(tree.contains(&inv));
    assert!(tree.is_consistent());
}

#[test]
fn copying_into_another_tree_rehashes_and_leaves_source() {
    let (mut source, _) = sample();
    let mut dest = Tree::new("dest");
    let root = dest.root().clone();
    let inv = by_name(&source, "inv");

    let copy = dest
        .add(
            NodeOrigin::Foreign {
                tree: &mut source,
                node: inv.clone(),
            },
            &root,
            None,
            true,
        )
        .unwrap();

    assert!(copy.is_scoped_to(dest.id()));
    assert_eq!(dest.node_count(), 3);
    assert_eq!(source.node_count(), 6);
    assert!(source.contains(&inv));
}

#[test]
fn moving_from_another_tree_detaches_from_source() {
    let (mut source, _) = sample();
    let mut dest = Tree::new("dest");
    let root = dest.root().clone();
    let inv = by_name(&source, "inv");

    dest.add(
        NodeOrigin::Foreign {
            tree: &mut source,
            node: inv.clone(),
        },
        &root,
        None,
        false,
    )
    .unwrap();

    assert_eq!(source.node_count(), 4);
    assert!(!source.contains(&inv));
    assert!(source.is_consistent());
    assert!(dest.is_consistent());
}

#[test]
fn foreign_node_missing_from_source_is_reported() {
    let (mut source, _) = sample();
    let mut dest = Tree::new("dest");
    let root = dest.root().clone();
    let err = dest
        .add(
            NodeOrigin::Foreign {
                tree: &mut source,
                node: NodeHash::new("nope-0"),
            },
            &root,
            None,
            false,
        )
        .unwrap_err();
    assert_eq!(err, TopologyError::NotInSource(NodeHash::new("nope-0")));
    assert_eq!(dest.node_count(), 1);
    assert_eq!(source.node_count(), 6);
}

#[test]
fn shift_reorders_siblings() {
    let (mut tree, main) = sample();
    let a = by_name(&tree, "a");
    tree.shift(&a, None).unwrap();
    assert_eq!(child_names(&tree, &main), vec!["b", "inv", "a"]);
    tree.shift(&a, Some(1)).unwrap();
    assert_eq!(child_names(&tree, &main), vec!["b", "a", "inv"]);
}

#[test]
fn shift_under_decorator_is_refused() {
    let (mut tree, _) = sample();
    let c = by_name(&tree, "c");
    assert_eq!(tree.shift(&c, Some(0)), Err(TopologyError::NotComposite(c)));
    let root = tree.root().clone();
    assert_eq!(tree.shift(&root, Some(0)), Err(TopologyError::RootNode));
}

#[test]
fn shift_keeps_parallel_primary_on_the_same_child() {
    let mut tree = Tree::new("par");
    let root = tree.root().clone();
    let par = tree
        .add(
            Subtree::new(
                "par",
                NodeKind::Parallel(ParallelSpec {
                    primary_child: Some(0),
                    ..ParallelSpec::default()
                }),
            )
            .with_children([cond("p"), cond("q")]),
            &root,
            None,
            false,
        )
        .unwrap();
    let p = by_name(&tree, "p");
    tree.shift(&p, None).unwrap();

    match tree.get(&par).unwrap().kind() {
        NodeKind::Parallel(spec) => assert_eq!(spec.primary_child, Some(1)),
        other => panic!("unexpected kind {other:?}"),
    }
}

fn primary_name(tree: &Tree, par: &NodeHash) -> Option<String> {
    match tree.get(par).unwrap().kind() {
        NodeKind::Parallel(spec) => spec
            .primary_child
            .map(|i| tree.get(&tree.children_of(par)[i]).unwrap().name().to_string()),
        other => panic!("unexpected kind {other:?}"),
    }
}

/// root -> Sequence "main" [Parallel "par" (primary 0) [p, q], Condition "r"]
fn parallel_sample() -> (Tree, NodeHash) {
    let mut tree = Tree::new("par");
    let root = tree.root().clone();
    tree.add(
        seq("main").with_children([
            Subtree::new(
                "par",
                NodeKind::Parallel(ParallelSpec {
                    primary_child: Some(0),
                    ..ParallelSpec::default()
                }),
            )
            .with_children([cond("p"), cond("q")]),
            cond("r"),
        ]),
        &root,
        None,
        false,
    )
    .unwrap();
    let par = by_name(&tree, "par");
    (tree, par)
}

#[test]
fn swap_keeps_parallel_primary_on_the_same_child() {
    let (mut tree, par) = parallel_sample();
    let p = by_name(&tree, "p");
    let q = by_name(&tree, "q");

    tree.swap(&p, &q).unwrap();
    assert_eq!(child_names(&tree, &par), vec!["q", "p"]);
    assert_eq!(primary_name(&tree, &par).as_deref(), Some("p"));

    tree.swap(&q, &p).unwrap();
    assert_eq!(primary_name(&tree, &par).as_deref(), Some("p"));
}

#[test]
fn swapping_the_primary_out_of_its_parallel_clears_it() {
    let (mut tree, par) = parallel_sample();
    let q = by_name(&tree, "q");
    let r = by_name(&tree, "r");

    // q leaves without touching the primary
    tree.swap(&q, &r).unwrap();
    assert_eq!(child_names(&tree, &par), vec!["p", "r"]);
    assert_eq!(primary_name(&tree, &par).as_deref(), Some("p"));

    let p = by_name(&tree, "p");
    tree.swap(&p, &q).unwrap();
    assert_eq!(child_names(&tree, &par), vec!["q", "r"]);
    assert_eq!(primary_name(&tree, &par), None);
    assert!(tree.is_consistent());
}

#[test]
fn swap_across_trees_clears_a_departing_primary() {
    let (mut left, par) = parallel_sample();
    let (mut right, _) = sample();
    let p = by_name(&left, "p");
    let b = by_name(&right, "b");

    left.swap_across(&p, &mut right, &b).unwrap();
    assert_eq!(child_names(&left, &par), vec!["b", "q"]);
    assert_eq!(primary_name(&left, &par), None);
}

#[test]
fn swap_exchanges_slots_within_a_tree() {
    let (mut tree, main) = sample();
    let a = by_name(&tree, "a");
    let c = by_name(&tree, "c");
    let inv = by_name(&tree, "inv");

    tree.swap(&a, &c).unwrap();
    assert_eq!(child_names(&tree, &main), vec!["c", "b", "inv"]);
    assert_eq!(tree.children_of(&inv), &[a]);
    assert!(tree.is_consistent());
}

#[test]
fn swap_with_root_or_ancestor_fails() {
    let (mut tree, main) = sample();
    let root = tree.root().clone();
    let c = by_name(&tree, "c");
    let inv = by_name(&tree, "inv");

    assert_eq!(tree.swap(&root, &c), Err(TopologyError::RootNode));
    assert!(matches!(tree.swap(&inv, &c), Err(TopologyError::WouldCycle(_))));
    assert!(matches!(tree.swap(&c, &main), Err(TopologyError::WouldCycle(_))));
    assert_eq!(tree.swap(&c, &c), Ok(()));
}

#[test]
fn swap_across_trees_rehashes_both_sides() {
    let (mut left, _) = sample();
    let (mut right, right_main) = sample();
    let inv = by_name(&left, "inv");
    let b = by_name(&right, "b");

    let (inv_there, b_here) = left.swap_across(&inv, &mut right, &b).unwrap();
    assert!(inv_there.is_scoped_to(right.id()));
    assert!(b_here.is_scoped_to(left.id()));
    assert_eq!(left.node_count(), 5);
    assert_eq!(right.node_count(), 7);
    assert_eq!(child_names(&right, &right_main), vec!["a", "inv", "inv"]);
    assert!(left.is_consistent());
    assert!(right.is_consistent());
}

#[test]
fn interpose_splices_a_decorator_above_target() {
    let (mut tree, main) = sample();
    let b = by_name(&tree, "b");

    let wrap = tree
        .interpose(Subtree::new("not", NodeKind::Inverter), &b, None, false)
        .unwrap();
    assert_eq!(child_names(&tree, &main), vec!["a", "not", "inv"]);
    assert_eq!(tree.children_of(&wrap), &[b.clone()]);
    assert_eq!(tree.get(&b).unwrap().parent(), Some(&wrap));
    assert!(tree.is_consistent());
}

#[test]
fn interpose_existing_sibling_above_target() {
    let (mut tree, main) = sample();
    let a = by_name(&tree, "a");
    let extra = tree.add(seq("extra"), &main, None, false).unwrap();

    tree.interpose(&extra, &a, None, false).unwrap();
    assert_eq!(child_names(&tree, &main), vec!["extra", "b", "inv"]);
    assert_eq!(child_names(&tree, &extra), vec!["a"]);
    assert!(tree.is_consistent());
}

#[test]
fn interpose_refusals() {
    let (mut tree, main) = sample();
    let a = by_name(&tree, "a");
    let b = by_name(&tree, "b");
    let inv = by_name(&tree, "inv");
    let root = tree.root().clone();
    let before = tree.node_count();

    assert_eq!(
        tree.interpose(&main, &main, None, false),
        Err(TopologyError::SelfInterpose(main.clone()))
    );
    assert_eq!(
        tree.interpose(seq("top"), &root, None, false),
        Err(TopologyError::RootNode)
    );
    assert!(matches!(
        tree.interpose(&a, &b, None, false),
        Err(TopologyError::LeafTarget { .. })
    ));
    assert!(matches!(
        tree.interpose(&inv, &a, None, false),
        Err(TopologyError::TargetOccupied { .. })
    ));
    let c = by_name(&tree, "c");
    assert!(matches!(
        tree.interpose(&main, &c, None, false),
        Err(TopologyError::WouldCycle(_))
    ));
    assert_eq!(tree.node_count(), before);
    assert!(tree.is_consistent());
}

#[test]
fn remove_purges_subtree_and_returns_it() {
    let (mut tree, main) = sample();
    let inv = by_name(&tree, "inv");
    let c = by_name(&tree, "c");

    let removed = tree.remove(&inv).unwrap();
    assert_eq!(removed.node_count(), 2);
    assert_eq!(removed.hash, Some(inv.clone()));
    assert!(!tree.contains(&inv));
    assert!(!tree.contains(&c));
    assert_eq!(child_names(&tree, &main), vec!["a", "b"]);

    let root = tree.root().clone();
    assert_eq!(tree.remove(&root), Err(TopologyError::RootNode));
}

#[test]
fn removed_subtree_can_be_added_back_with_its_hashes() {
    let (mut tree, main) = sample();
    let inv = by_name(&tree, "inv");
    let removed = tree.remove(&inv).unwrap();
    let back = tree.add(removed, &main, Some(0), false).unwrap();
    assert_eq!(back, inv);
}

#[test]
fn validate_reports_first_empty_decorator_or_root() {
    let tree = Tree::new("empty");
    let err = tree.validate_tree().unwrap_err();
    assert!(err.to_string().contains("Root"));

    let (mut tree, main) = sample();
    assert!(tree.validate_tree().is_ok());
    tree.add(Subtree::new("gate", NodeKind::Limiter { limit: 1 }), &main, None, false)
        .unwrap();
    let err = tree.validate_tree().unwrap_err();
    assert!(err.to_string().contains("gate"));
}

#[test]
fn validate_sees_deeply_nested_decorators() {
    let mut tree = Tree::new("deep");
    let root = tree.root().clone();
    tree.add(
        seq("s1").with_child(seq("s2").with_child(
            Subtree::new("deep-inv", NodeKind::Inverter),
        )),
        &root,
        None,
        false,
    )
    .unwrap();
    let err = tree.validate_tree().unwrap_err();
    assert!(err.to_string().contains("deep-inv"));
}

#[test]
fn replace_kind_checks_arity() {
    let (mut tree, main) = sample();
    assert!(matches!(
        tree.replace_kind(&main, NodeKind::Inverter),
        Err(TopologyError::ArityMismatch { children: 3, .. })
    ));
    tree.replace_kind(&main, NodeKind::MemSelector).unwrap();
    assert_eq!(tree.get(&main).unwrap().kind(), &NodeKind::MemSelector);
    let root = tree.root().clone();
    assert_eq!(
        tree.replace_kind(&root, NodeKind::Sequence),
        Err(TopologyError::RootNode)
    );
}
