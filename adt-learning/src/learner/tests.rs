use automata_core::random::generate_random_mealy;

use super::*;
use crate::{
    config::{
        EXHAUSTIVE_BEST_EFFORT, EXTEND_PARENT, NEVER_REPLACE, NOP_EXTENDER, SINGLE_BEST_EFFORT,
    },
    equivalence::{EquivalenceOracle, SimulatorEqOracle, WMethodEqOracle},
    oracle::SulOracle,
    sul::{MealySimulatorSul, SymbolCounterSul},
};

fn toggle() -> MealyMachine<CharAlphabet, u8> {
    MealyBuilder::default()
        .with_transitions([(0, 'a', 0, 1), (1, 'a', 1, 0), (0, 'b', 0, 0), (1, 'b', 1, 1)])
        .into_mealy(0)
}

/// Counts the `a`s modulo three, `b` resets the counter.
fn counter() -> MealyMachine<CharAlphabet, u8> {
    MealyBuilder::default()
        .with_transitions([
            (0, 'a', 0, 1),
            (1, 'a', 1, 2),
            (2, 'a', 2, 0),
            (0, 'b', 0, 0),
            (1, 'b', 1, 0),
            (2, 'b', 2, 0),
        ])
        .into_mealy(0)
}

fn random_machine(seed: u64) -> MealyMachine<CharAlphabet, usize> {
    let mut rng = fastrand::Rng::with_seed(seed);
    generate_random_mealy(&mut rng, CharAlphabet::of_size(3), 10, 2)
}

type Simulated<O> = MealySimulatorSul<CharAlphabet, O>;

fn learner_for<O: Color>(
    reference: &MealyMachine<CharAlphabet, O>,
    sink: O,
) -> AdtLearner<CharAlphabet, Simulated<O>> {
    AdtLearner::new(
        reference.alphabet().clone(),
        MealySimulatorSul::new(reference.clone(), sink),
    )
}

/// Refines until the hypothesis is equivalent to `reference` and returns the lengths of the
/// counterexamples that were needed.
fn learn<O, T>(
    learner: &mut AdtLearner<CharAlphabet, T>,
    reference: &MealyMachine<CharAlphabet, O>,
) -> Vec<usize>
where
    O: Color,
    T: Sul<Input = char, Output = O>,
{
    let mut oracle = SimulatorEqOracle::new(reference.clone());
    let mut lengths = vec![];
    while let Some(counterexample) = oracle
        .find_counterexample(learner.hypothesis(), learner.alphabet())
        .unwrap()
    {
        assert!(learner.refine_hypothesis(&counterexample).unwrap());
        lengths.push(counterexample.input().len());
        assert!(
            lengths.len() <= reference.size(),
            "no progress after {} counterexamples",
            lengths.len()
        );
    }
    lengths
}

/// Every leaf identifies exactly one state, no transition is open and every trace that leads to
/// the leaf of a state is what `reference` produces after the access sequence of that state.
fn assert_well_formed<A, B, T>(learner: &AdtLearner<A, T>, reference: &MealyMachine<B, T::Output>)
where
    A: Alphabet,
    B: Alphabet<Symbol = A::Symbol>,
    T: Sul<Input = A::Symbol>,
{
    let bijection = learner.adt().leaf_bijection().unwrap();
    assert_eq!(bijection.len(), learner.hypothesis().size());
    assert!(learner
        .hypothesis()
        .transitions()
        .all(|(_, transition)| !transition.needs_sifting()));

    for (&leaf, &state) in bijection.iter() {
        let access = learner.hypothesis().access_sequence(state).unwrap();
        for (input, output) in learner.adt().reset_separated_traces(leaf) {
            assert_eq!(
                reference.compute_suffix_output(access, &input),
                Some(output),
                "state {state} reached by {access} does not follow {input}"
            );
        }
    }
}

#[test_log::test]
fn single_state_system() {
    let constant = MealyBuilder::default()
        .with_transitions([(0, 'a', 0u8, 0), (0, 'b', 1, 0)])
        .into_mealy(0);
    let mut learner = learner_for(&constant, 9);
    learner.start_learning().unwrap();
    assert_eq!(learner.hypothesis().size(), 1);
    assert_eq!(learner.adt().size(), 1);
    assert!(learner.get_hypothesis_model().bisimilar(&constant));
    assert!(learn(&mut learner, &constant).is_empty());
    assert!(matches!(
        learner.start_learning(),
        Err(LearningError::IllegalState(_))
    ));
}

#[test_log::test]
fn toggle_with_one_counterexample() {
    let toggle = toggle();
    let mut learner = learner_for(&toggle, 9);
    learner.start_learning().unwrap();
    assert_eq!(learner.hypothesis().size(), 1);

    let counterexample = Query::counterexample(Word::from("aa"), Word::from(vec![0, 1]));
    assert!(learner.refine_hypothesis(&counterexample).unwrap());
    assert_eq!(learner.hypothesis().size(), 2);

    let adt = learner.adt();
    let root = adt.root().unwrap();
    assert_eq!(adt.get(root).and_then(|node| node.input()), Some('a'));
    assert_eq!(adt.collect_leaves(root).len(), 2);
    assert_eq!(adt.size(), 3);
    assert!(learner.get_hypothesis_model().bisimilar(&toggle));
    assert_well_formed(&learner, &toggle);
}

#[test_log::test]
fn counter_modulo_three() {
    let counter = counter();
    let mut learner = learner_for(&counter, 9);
    learner.start_learning().unwrap();
    let rounds = learn(&mut learner, &counter).len();
    assert!((1..=2).contains(&rounds));
    assert_eq!(learner.hypothesis().size(), 3);
    let root = learner.adt().root().unwrap();
    assert_eq!(learner.adt().collect_leaves(root).len(), 3);
    assert!(learner.get_hypothesis_model().bisimilar(&counter));
    assert_well_formed(&learner, &counter);
}

#[test_log::test]
fn random_machine_converges() {
    let reference = random_machine(42);
    let mut learner = AdtLearner::new(
        reference.alphabet().clone(),
        SymbolCounterSul::new(MealySimulatorSul::new(reference.clone(), usize::MAX)),
    );
    learner.start_learning().unwrap();
    let lengths = learn(&mut learner, &reference);
    assert!(learner.hypothesis().size() <= 10);
    assert!(learner.get_hypothesis_model().bisimilar(&reference));
    assert_well_formed(&learner, &reference);

    // polynomial in the number of states, the alphabet size and the longest counterexample
    let (n, k) = (reference.size(), reference.alphabet().size());
    let m = lengths.iter().copied().max().unwrap_or(0);
    let symbols = learner.oracle().sul().symbols();
    assert!(
        symbols <= 4 * n * n * k * (n + m),
        "learning took {symbols} symbols"
    );

    let mut w_method: WMethodEqOracle<CharAlphabet, _> =
        WMethodEqOracle::new(SulOracle::new(MealySimulatorSul::new(reference.clone(), 0)), 2);
    assert!(w_method
        .find_counterexample(learner.hypothesis(), learner.alphabet())
        .unwrap()
        .is_none());
}

#[test_log::test]
fn every_strategy_learns_the_same_behaviour() {
    let reference = random_machine(7);
    let strategies = [
        (EXTEND_PARENT, NOP_EXTENDER, NEVER_REPLACE, true),
        (
            LeafSplitters::DefaultSplitter,
            AdtExtenders::ExtendBestEffort,
            SINGLE_BEST_EFFORT,
            true,
        ),
        (EXTEND_PARENT, AdtExtenders::ExtendBestEffort, EXHAUSTIVE_BEST_EFFORT, false),
        (
            LeafSplitters::default(),
            AdtExtenders::default(),
            SubtreeReplacers::default(),
            false,
        ),
    ];
    for (splitter, extender, replacer, cache) in strategies {
        let mut learner = AdtLearnerBuilder::new(
            reference.alphabet().clone(),
            MealySimulatorSul::new(reference.clone(), usize::MAX),
        )
        .with_leaf_splitter(splitter)
        .with_adt_extender(extender)
        .with_subtree_replacer(replacer)
        .use_observation_tree(cache)
        .build();
        learner.start_learning().unwrap();
        learn(&mut learner, &reference);
        assert!(
            learner.get_hypothesis_model().bisimilar(&reference),
            "{splitter:?}, {extender:?} and {replacer:?} learned a wrong model"
        );
        assert_well_formed(&learner, &reference);
    }
}

#[test_log::test]
fn learning_is_deterministic() {
    let reference = random_machine(1);
    let mut first = learner_for(&reference, usize::MAX);
    let mut second = learner_for(&reference, usize::MAX);
    first.start_learning().unwrap();
    second.start_learning().unwrap();
    learn(&mut first, &reference);
    learn(&mut second, &reference);
    assert!(first.suspend().unwrap() == second.suspend().unwrap());
}

#[test_log::test]
fn observation_tree_saves_queries() {
    let counter = counter();
    let mut cached = AdtLearner::new(
        counter.alphabet().clone(),
        SymbolCounterSul::new(MealySimulatorSul::new(counter.clone(), 9)),
    );
    let mut uncached = AdtLearnerBuilder::new(
        counter.alphabet().clone(),
        SymbolCounterSul::new(MealySimulatorSul::new(counter.clone(), 9)),
    )
    .use_observation_tree(false)
    .build();
    cached.start_learning().unwrap();
    uncached.start_learning().unwrap();
    learn(&mut cached, &counter);
    learn(&mut uncached, &counter);
    assert!(cached.oracle().sul().symbols() < uncached.oracle().sul().symbols());
    assert!(cached.suspend().unwrap() == uncached.suspend().unwrap());
}

#[test_log::test]
fn queries_that_agree_are_no_counterexamples() {
    let toggle = toggle();
    let mut learner = learner_for(&toggle, 9);
    learner.start_learning().unwrap();
    let before = learner.suspend().unwrap();
    let agreeing = Query::counterexample(Word::from("ab"), Word::from(vec![0, 0]));
    assert!(!learner.refine_hypothesis(&agreeing).unwrap());
    assert!(learner.suspend().unwrap() == before);
}

#[test_log::test]
fn malformed_counterexamples_are_rejected() {
    let toggle = toggle();
    let mut learner = learner_for(&toggle, 9);
    let valid = Query::counterexample(Word::from("aa"), Word::from(vec![0, 1]));
    assert!(matches!(
        learner.refine_hypothesis(&valid),
        Err(LearningError::IllegalState(_))
    ));
    learner.start_learning().unwrap();

    let rejected = [
        Query::counterexample(Word::epsilon(), Word::epsilon()),
        Query::counterexample(Word::from("az"), Word::from(vec![0, 1])),
        Query::counterexample(Word::from("aa"), Word::from(vec![0])),
        Query::new(Word::epsilon(), Word::from("aa")),
    ];
    for query in rejected {
        assert!(matches!(
            learner.refine_hypothesis(&query),
            Err(LearningError::InvalidArgument(_))
        ));
    }
    assert_eq!(learner.hypothesis().size(), 1);
    assert!(learner.refine_hypothesis(&valid).unwrap());
}

/// Answers every input with the number of inputs it has seen so far, no matter the resets.
struct Flaky(u32);

impl Sul for Flaky {
    type Input = char;
    type Output = u32;

    fn reset(&mut self) {}

    fn step(&mut self, _input: char) -> u32 {
        self.0 += 1;
        self.0
    }
}

#[test_log::test]
fn nondeterminism_is_detected() {
    let mut learner = AdtLearnerBuilder::new(alphabet!(simple 'a', 'b'), Flaky(0))
        .use_observation_tree(false)
        .build();
    learner.start_learning().unwrap();
    let counterexample = Query::counterexample(Word::from("aa"), Word::from(vec![1, 7]));
    assert!(matches!(
        learner.refine_hypothesis(&counterexample),
        Err(LearningError::NonDeterministicSul { .. })
    ));
}

#[test_log::test]
fn suspend_and_resume() {
    let counter = counter();
    let counterexample = Query::counterexample(Word::from("aa"), Word::from(vec![0, 1]));
    let mut uninterrupted = learner_for(&counter, 9);
    uninterrupted.start_learning().unwrap();
    assert!(uninterrupted.refine_hypothesis(&counterexample).unwrap());
    learn(&mut uninterrupted, &counter);

    let mut first = learner_for(&counter, 9);
    first.start_learning().unwrap();
    assert!(first.refine_hypothesis(&counterexample).unwrap());
    let snapshot = first.suspend().unwrap();
    assert_eq!(snapshot.counterexamples().count(), 1);

    let mut second = learner_for(&counter, 9);
    second.resume(snapshot.clone()).unwrap();
    assert!(second.suspend().unwrap() == snapshot);

    // the rebuilt tree knows the reaction of every state to the traces of its leaf
    let tree = second.oracle().tree();
    for state in second.hypothesis().state_indices() {
        let leaf = second.adt().leaf_of(state).unwrap();
        for (input, output) in second.adt().reset_separated_traces(leaf) {
            assert_eq!(tree.trace(state, &input), Some(output));
        }
    }

    learn(&mut second, &counter);
    assert!(second.get_hypothesis_model().bisimilar(&counter));
    assert!(second.suspend().unwrap() == uninterrupted.suspend().unwrap());
    assert_well_formed(&second, &counter);
}

#[test_log::test]
fn snapshots_forget_removed_nodes() {
    let reference = random_machine(3);
    let mut learner = AdtLearner::new(
        reference.alphabet().clone(),
        MealySimulatorSul::new(reference.clone(), usize::MAX),
    );
    learner.start_learning().unwrap();
    learn(&mut learner, &reference);

    let snapshot = learner.suspend().unwrap();
    let adt = snapshot.adt();
    assert_eq!(adt.capacity(), adt.size());
    assert_eq!(adt.size(), learner.adt().size());
    assert!(snapshot.hypothesis().transitions().all(|(_, transition)| {
        transition
            .sift_node()
            .map_or(true, |node| adt.contains(node))
    }));

    let mut resumed = learner_for(&reference, usize::MAX);
    resumed.resume(snapshot.clone()).unwrap();
    assert!(resumed.get_hypothesis_model().bisimilar(&reference));
    assert_well_formed(&resumed, &reference);
}

#[test_log::test]
fn resuming_with_unknown_symbols_fails() {
    let toggle = toggle();
    let mut learner = learner_for(&toggle, 9);
    learner.start_learning().unwrap();
    let snapshot = learner.suspend().unwrap();

    let mut smaller = AdtLearner::new(
        alphabet!(simple 'a'),
        MealySimulatorSul::new(toggle.clone(), 9),
    );
    assert!(matches!(
        smaller.resume(snapshot),
        Err(LearningError::InvalidArgument(_))
    ));
}

#[test_log::test]
fn resuming_into_a_larger_alphabet() {
    let toggle = toggle();
    let mut small = AdtLearner::new(
        alphabet!(simple 'a'),
        MealySimulatorSul::new(toggle.clone(), 9),
    );
    small.start_learning().unwrap();
    let counterexample = Query::counterexample(Word::from("aa"), Word::from(vec![0, 1]));
    assert!(small.refine_hypothesis(&counterexample).unwrap());
    let snapshot = small.suspend().unwrap();

    let mut large = AdtLearner::new(
        alphabet!(simple 'a', 'b'),
        MealySimulatorSul::new(toggle.clone(), 9),
    );
    large.resume(snapshot).unwrap();
    assert_eq!(large.alphabet().size(), 2);
    assert_eq!(large.hypothesis().alphabet().size(), 1);

    large.add_alphabet_symbol('b').unwrap();
    assert_eq!(large.alphabet().size(), 2);
    assert_eq!(large.hypothesis().alphabet().size(), 2);
    assert!(large.get_hypothesis_model().bisimilar(&toggle));
    assert_well_formed(&large, &toggle);
}

#[test_log::test]
fn growing_the_alphabet() {
    let toggle = toggle();
    let mut learner = AdtLearner::new(
        alphabet!(simple 'a'),
        MealySimulatorSul::new(toggle.clone(), 9),
    );
    learner.start_learning().unwrap();
    let counterexample = Query::counterexample(Word::from("aa"), Word::from(vec![0, 1]));
    assert!(learner.refine_hypothesis(&counterexample).unwrap());
    assert_eq!(learner.hypothesis().size(), 2);

    learner.add_alphabet_symbol('b').unwrap();
    assert_eq!(learner.alphabet().size(), 2);
    assert_eq!(learner.hypothesis().alphabet().size(), 2);
    assert!(learner.get_hypothesis_model().bisimilar(&toggle));
    assert_well_formed(&learner, &toggle);

    learner.add_alphabet_symbol('b').unwrap();
    assert_eq!(learner.alphabet().size(), 2);
    assert!(learner.get_hypothesis_model().bisimilar(&toggle));
}

#[test_log::test]
fn symbols_can_be_added_before_learning() {
    let toggle = toggle();
    let mut learner = AdtLearner::new(
        alphabet!(simple 'a'),
        MealySimulatorSul::new(toggle.clone(), 9),
    );
    learner.add_alphabet_symbol('b').unwrap();
    learner.start_learning().unwrap();
    learn(&mut learner, &toggle);
    assert_eq!(learner.hypothesis().size(), 2);
}
