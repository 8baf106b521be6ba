use automata_core::prelude::*;

use super::*;
use crate::{oracle::SulOracle, sul::MealySimulatorSul};

fn toggle() -> MealyMachine<CharAlphabet, u8> {
    MealyBuilder::default()
        .with_transitions([(0, 'a', 0, 1), (1, 'a', 1, 0), (0, 'b', 0, 0), (1, 'b', 1, 1)])
        .into_mealy(0)
}

fn word(outputs: &[u8]) -> Word<u8> {
    Word::from(outputs.to_vec())
}

/// Root reads `a`, state 0 answers 0 and state 1 answers 1.
fn split_root() -> (Adt<char, u8>, NodeId, NodeId) {
    let mut adt = Adt::single_leaf(0);
    let old = adt.root().unwrap();
    let new = adt
        .split_leaf(
            old,
            &Word::from("a"),
            &word(&[0]),
            &word(&[1]),
            LeafSplitters::DefaultSplitter,
        )
        .unwrap();
    adt.set_state(new, 1).unwrap();
    (adt, old, new)
}

fn sift_word(adt: &mut Adt<char, u8>, long_prefix: &str) -> NodeId {
    let mut oracle = SulOracle::new(MealySimulatorSul::new(toggle(), 9));
    let long_prefix = Word::from(long_prefix);
    oracle.reset();
    for &symbol in &long_prefix {
        oracle.query(symbol).unwrap();
    }
    let root = adt.root().unwrap();
    adt.sift(&mut oracle, &long_prefix, root).unwrap()
}

#[test_log::test]
fn splitting_the_root() {
    let (mut adt, old, new) = split_root();
    let root = adt.root().unwrap();
    assert_eq!(adt.size(), 3);
    assert_eq!(adt.get(root).and_then(|node| node.input()), Some('a'));
    assert_eq!(adt.parent(old), Some(root));
    assert_eq!(adt.child_on(root, &1), Some(new));
    assert_eq!(adt.effective_resets(root), 0);

    assert_eq!(sift_word(&mut adt, "a"), new);
    assert_eq!(sift_word(&mut adt, "aa"), old);
    assert_eq!(sift_word(&mut adt, "b"), old);
    assert_eq!(adt.size(), 3);
}

#[test_log::test]
fn sifting_creates_leaves_for_unknown_outputs() {
    let mut adt: Adt<char, u8> = Adt::from_trace(&Word::from("a"), &word(&[0]), 0).unwrap();
    let leaf = sift_word(&mut adt, "a");
    assert_eq!(adt.state(leaf), None);
    assert_eq!(adt.size(), 3);
    assert_eq!(adt.build_trace_for_node(leaf), (Word::from("a"), word(&[1])));
}

#[test_log::test]
fn splitting_inner_leaves_inserts_resets() {
    let (mut adt, old, new) = split_root();
    let root = adt.root().unwrap();
    let newest = adt
        .split_leaf(
            new,
            &Word::from("b"),
            &word(&[0]),
            &word(&[1]),
            LeafSplitters::DefaultSplitter,
        )
        .unwrap();
    adt.set_state(newest, 2).unwrap();

    assert_eq!(adt.size(), 6);
    assert_eq!(adt.effective_resets(root), 1);
    let resets = adt.collect_reset_nodes(root);
    assert_eq!(resets.len(), 1);
    assert_eq!(adt.child_on(root, &1), Some(resets[0]));
    assert_eq!(adt.collect_states(root), vec![0, 1, 2]);

    assert_eq!(
        adt.build_trace_for_node(newest),
        (Word::from("b"), word(&[1]))
    );
    assert_eq!(
        adt.reset_separated_traces(newest),
        vec![
            (Word::from("b"), word(&[1])),
            (Word::from("a"), word(&[1]))
        ]
    );
    assert_eq!(adt.start_of_ads(old), root);
    assert_eq!(adt.parent(adt.start_of_ads(newest)), Some(resets[0]));
    assert_eq!(adt.reset_depth(newest), 1);
}

#[test_log::test]
fn extending_leaves_without_reset() {
    let (mut adt, _, new) = split_root();
    let root = adt.root().unwrap();
    let newest = adt
        .extend_leaf(
            new,
            &Word::from("ab"),
            &word(&[1, 0]),
            &word(&[1, 1]),
            LeafSplitters::DefaultSplitter,
        )
        .unwrap();
    adt.set_state(newest, 2).unwrap();

    assert_eq!(adt.size(), 5);
    assert_eq!(adt.effective_resets(root), 0);
    assert_eq!(adt.parent(new), adt.parent(newest));
    assert_eq!(
        adt.build_trace_for_node(newest),
        (Word::from("ab"), word(&[1, 1]))
    );
    assert!(adt.leaf_bijection().is_ok());

    // a splitter that does not start with the trace of the leaf falls back to splitting
    let last = adt
        .extend_leaf(
            newest,
            &Word::from("b"),
            &word(&[0]),
            &word(&[1]),
            LeafSplitters::DefaultSplitter,
        )
        .unwrap();
    adt.set_state(last, 3).unwrap();
    assert_eq!(adt.effective_resets(root), 1);
}

#[test_log::test]
fn splitting_requires_diverging_outputs() {
    let (mut adt, old, _) = split_root();
    assert!(matches!(
        adt.split_leaf(
            old,
            &Word::from("b"),
            &word(&[0]),
            &word(&[0]),
            LeafSplitters::DefaultSplitter,
        ),
        Err(LearningError::NonDeterministicSul { .. })
    ));
    let root = adt.root().unwrap();
    assert!(adt
        .split_leaf(
            root,
            &Word::from("b"),
            &word(&[0]),
            &word(&[1]),
            LeafSplitters::DefaultSplitter,
        )
        .is_err());
}

#[test_log::test]
fn merging_traces() {
    let mut adt: Adt<char, u8> = Adt::from_trace(&Word::from("ab"), &word(&[0, 0]), 0).unwrap();
    assert!(adt.merge_trace(&Word::from("ab"), &word(&[0, 1]), 1).unwrap());
    assert!(adt.merge_trace(&Word::from("a"), &word(&[1]), 2).unwrap());
    assert!(!adt.merge_trace(&Word::from("b"), &word(&[0]), 3).unwrap());
    assert!(!adt.merge_trace(&Word::from("ab"), &word(&[0, 0]), 3).unwrap());

    let root = adt.root().unwrap();
    assert_eq!(adt.size(), 5);
    assert_eq!(adt.collect_states(root), vec![0, 1, 2]);
    assert_eq!(adt.leaf_bijection().unwrap().len(), 3);
    assert!(Adt::<char, u8>::from_trace(&Word::from("ab"), &word(&[0]), 0).is_err());
}

#[test_log::test]
fn replacing_subtrees() {
    let (mut adt, new) = {
        let (mut adt, _, new) = split_root();
        let newest = adt
            .split_leaf(
                new,
                &Word::from("b"),
                &word(&[0]),
                &word(&[1]),
                LeafSplitters::DefaultSplitter,
            )
            .unwrap();
        adt.set_state(newest, 2).unwrap();
        (adt, new)
    };
    let root = adt.root().unwrap();
    let reset = adt.collect_reset_nodes(root)[0];

    let mut replacement = Adt::from_trace(&Word::from("b"), &word(&[0]), 1).unwrap();
    assert!(replacement
        .merge_trace(&Word::from("b"), &word(&[1]), 2)
        .unwrap());
    let installed = adt.replace_node(reset, &replacement).unwrap();

    assert!(!adt.contains(reset));
    assert!(!adt.contains(new));
    assert_eq!(adt.parent(installed), Some(root));
    assert_eq!(adt.effective_resets(root), 0);
    assert_eq!(adt.size(), 5);
    assert_eq!(adt.collect_states(root), vec![0, 1, 2]);
    assert!(adt.replace_node(reset, &replacement).is_err());
}

#[test_log::test]
fn compacting_removes_holes() {
    let (mut adt, old, new) = split_root();
    let newest = adt
        .split_leaf(
            new,
            &Word::from("b"),
            &word(&[0]),
            &word(&[1]),
            LeafSplitters::DefaultSplitter,
        )
        .unwrap();
    adt.set_state(newest, 2).unwrap();
    let root = adt.root().unwrap();
    let reset = adt.collect_reset_nodes(root)[0];
    let mut replacement = Adt::from_trace(&Word::from("b"), &word(&[0]), 1).unwrap();
    assert!(replacement
        .merge_trace(&Word::from("b"), &word(&[1]), 2)
        .unwrap());
    let installed = adt.replace_node(reset, &replacement).unwrap();
    assert!(adt.capacity() > adt.size());

    let (compact, moved) = adt.compacted().unwrap();
    assert_eq!(compact.capacity(), 5);
    assert_eq!(compact.size(), adt.size());
    assert!(!moved.contains_key(&reset));
    assert_eq!(moved.get(&root), compact.root().as_ref());
    assert_eq!(compact.parent(moved[&installed]), compact.root());
    assert_eq!(compact.leaf_of(0), moved.get(&old).copied());
    assert_eq!(compact.collect_states(compact.root().unwrap()), vec![0, 1, 2]);
    assert_eq!(
        compact.reset_separated_traces(compact.leaf_of(2).unwrap()),
        adt.reset_separated_traces(adt.leaf_of(2).unwrap())
    );
    assert!(compact.leaf_bijection().is_ok());
    assert!(compact.compacted().unwrap().0 == compact);
}

#[test_log::test]
fn effective_resets_take_the_maximum() {
    let mut adt: Adt<char, u8> = Adt::from_trace(&Word::from("a"), &word(&[0]), 0).unwrap();
    assert!(adt.merge_trace(&Word::from("a"), &word(&[1]), 1).unwrap());
    let root = adt.root().unwrap();

    let separate = |first, second| {
        let mut sub = Adt::from_trace(&Word::from("b"), &word(&[0]), first).unwrap();
        assert!(sub.merge_trace(&Word::from("b"), &word(&[1]), second).unwrap());
        sub
    };
    let left = adt.child_on(root, &0).unwrap();
    adt.insert_reset(left, &separate(0, 2)).unwrap();
    let right = adt.child_on(root, &1).unwrap();
    adt.insert_reset(right, &separate(1, 3)).unwrap();

    assert_eq!(adt.collect_reset_nodes(root).len(), 2);
    assert_eq!(adt.effective_resets(root), 1);
    assert_eq!(adt.collect_ads_nodes(root).len(), 3);

    let nested = adt.leaf_of(3).unwrap();
    adt.insert_reset(nested, &separate(3, 4)).unwrap();
    assert_eq!(adt.effective_resets(root), 2);
    assert_eq!(adt.leaf_bijection().unwrap().len(), 5);

    let mut single: Adt<char, u8> = Adt::single_leaf(0);
    let leaf = single.root().unwrap();
    assert!(single.insert_reset(leaf, &separate(0, 1)).is_err());
}

#[test_log::test]
fn lowest_common_ancestors() {
    let (mut adt, old, new) = split_root();
    let root = adt.root().unwrap();
    let newest = adt
        .split_leaf(
            new,
            &Word::from("b"),
            &word(&[0]),
            &word(&[1]),
            LeafSplitters::DefaultSplitter,
        )
        .unwrap();
    adt.set_state(newest, 2).unwrap();

    assert_eq!(
        adt.find_lca(old, newest).unwrap(),
        LcaInfo {
            node: root,
            first_output: 0,
            second_output: 1,
        }
    );
    let lca = adt.find_lca(newest, new).unwrap();
    assert_eq!(adt.get(lca.node).and_then(|node| node.input()), Some('b'));
    assert_eq!((lca.first_output, lca.second_output), (1, 0));
    assert!(adt.find_lca(old, old).is_err());
}

#[test_log::test]
fn leaves_identify_states_uniquely() {
    let (mut adt, old, new) = split_root();
    let bijection = adt.leaf_bijection().unwrap();
    assert_eq!(bijection.get_by_right(&1), Some(&new));
    assert_eq!(adt.leaf_of(0), Some(old));

    adt.set_state(new, 0).unwrap();
    assert!(adt.leaf_bijection().is_err());
    assert!(adt.set_state(adt.root().unwrap(), 3).is_err());
}
