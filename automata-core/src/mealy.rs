use std::{collections::VecDeque, fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::{
    alphabet::{Alphabet, SimpleAlphabet, Symbol},
    math::{self, Map},
    word::Word,
    Color, DefaultIdType, Show,
};

/// Abstracts the requirements on the type that is used to index states.
pub trait IndexType: Copy + Eq + Ord + Hash + Debug + Show {}
impl<T: Copy + Eq + Ord + Hash + Debug + Show> IndexType for T {}

/// Helper type for accessing the symbol type of a [`Mealy`] machine.
pub type SymbolOf<M> = <<M as Mealy>::Alphabet as Alphabet>::Symbol;
/// Helper type for accessing the state index type of a [`Mealy`] machine.
pub type StateIndex<M> = <M as Mealy>::StateIndex;
/// Helper type for accessing the output type of a [`Mealy`] machine.
pub type OutputOf<M> = <M as Mealy>::Output;

/// Everything that behaves like a deterministic Mealy machine. A Mealy machine reads a word and
/// produces one output per symbol, the empty word therefore produces the empty output.
///
/// Transitions may be undefined, which is the case for machines that are still under
/// construction. In that case, the provided methods return `None` as soon as a run
/// hits an undefined transition.
pub trait Mealy {
    /// The alphabet of input symbols.
    type Alphabet: Alphabet;
    /// The type of outputs that are emitted on transitions.
    type Output: Color;
    /// The type used for indexing states.
    type StateIndex: IndexType;
    /// Iterator over all state indices.
    type StateIndices<'this>: Iterator<Item = Self::StateIndex>
    where
        Self: 'this;

    /// Returns a reference to the input alphabet.
    fn alphabet(&self) -> &Self::Alphabet;

    /// Returns the initial state, if it exists.
    fn initial(&self) -> Option<Self::StateIndex>;

    /// Returns an iterator over the indices of all states.
    fn state_indices(&self) -> Self::StateIndices<'_>;

    /// Returns the state that is reached from `state` on `symbol`, if the transition is defined.
    fn successor(&self, state: Self::StateIndex, symbol: SymbolOf<Self>)
        -> Option<Self::StateIndex>;

    /// Returns the output emitted when reading `symbol` in `state`.
    fn transition_output(
        &self,
        state: Self::StateIndex,
        symbol: SymbolOf<Self>,
    ) -> Option<Self::Output>;

    /// Returns the successor together with the output, if both are defined.
    fn transition(
        &self,
        state: Self::StateIndex,
        symbol: SymbolOf<Self>,
    ) -> Option<(Self::StateIndex, Self::Output)> {
        Some((
            self.successor(state, symbol)?,
            self.transition_output(state, symbol)?,
        ))
    }

    /// Returns the number of states.
    fn size(&self) -> usize {
        self.state_indices().count()
    }

    /// Returns the state reached when reading `word` from `from`.
    fn reached_state_from(
        &self,
        from: Self::StateIndex,
        word: &Word<SymbolOf<Self>>,
    ) -> Option<Self::StateIndex> {
        word.iter()
            .try_fold(from, |state, &symbol| self.successor(state, symbol))
    }

    /// Returns the state reached when reading `word` from the initial state.
    fn reached_state(&self, word: &Word<SymbolOf<Self>>) -> Option<Self::StateIndex> {
        self.reached_state_from(self.initial()?, word)
    }

    /// Computes the outputs that are produced when reading `word` from `state`.
    fn compute_state_output(
        &self,
        state: Self::StateIndex,
        word: &Word<SymbolOf<Self>>,
    ) -> Option<Word<Self::Output>> {
        let mut current = state;
        let mut output = Vec::with_capacity(word.len());
        for &symbol in word {
            let (target, out) = self.transition(current, symbol)?;
            output.push(out);
            current = target;
        }
        Some(output.into())
    }

    /// Computes the outputs that are produced when reading `word` from the initial state.
    fn compute_output(&self, word: &Word<SymbolOf<Self>>) -> Option<Word<Self::Output>> {
        self.compute_state_output(self.initial()?, word)
    }

    /// Computes the outputs produced by `suffix` after `prefix` has been read from the
    /// initial state.
    fn compute_suffix_output(
        &self,
        prefix: &Word<SymbolOf<Self>>,
        suffix: &Word<SymbolOf<Self>>,
    ) -> Option<Word<Self::Output>> {
        self.compute_state_output(self.reached_state(prefix)?, suffix)
    }

    /// Searches for a shortest word on which `self` and `other` produce different outputs, doing a
    /// breadth-first search over the reachable part of the product. A transition that is defined
    /// in only one of the two machines is also considered a difference.
    fn witness_inequivalence<M>(&self, other: &M) -> Option<Word<SymbolOf<Self>>>
    where
        M: Mealy<Alphabet = Self::Alphabet, Output = Self::Output>,
    {
        let (left, right) = match (self.initial(), other.initial()) {
            (Some(left), Some(right)) => (left, right),
            (None, None) => return None,
            _ => return Some(Word::epsilon()),
        };
        let symbols = self
            .alphabet()
            .universe()
            .chain(other.alphabet().universe())
            .unique()
            .collect_vec();

        let mut seen = math::HashSet::default();
        seen.insert((left, right));
        let mut queue = VecDeque::from([(left, right, Word::epsilon())]);
        while let Some((l, r, access)) = queue.pop_front() {
            for &symbol in &symbols {
                match (self.transition(l, symbol), other.transition(r, symbol)) {
                    (None, None) => continue,
                    (Some((lt, lo)), Some((rt, ro))) if lo == ro => {
                        if seen.insert((lt, rt)) {
                            queue.push_back((lt, rt, access.append(symbol)));
                        }
                    }
                    _ => return Some(access.append(symbol)),
                }
            }
        }
        None
    }

    /// Returns true if and only if both machines produce the same output on every word.
    fn bisimilar<M>(&self, other: &M) -> bool
    where
        M: Mealy<Alphabet = Self::Alphabet, Output = Self::Output>,
    {
        self.witness_inequivalence(other).is_none()
    }

    /// Collects `self` into a [`MealyMachine`]. States are renumbered in the order in which
    /// [`Mealy::state_indices`] yields them.
    fn collect_mealy(&self) -> MealyMachine<Self::Alphabet, Self::Output> {
        let mut out = MealyMachine::new(self.alphabet().clone());
        let map: Map<_, _> = self
            .state_indices()
            .map(|q| (q, out.add_state()))
            .collect();
        for (&q, &id) in &map {
            for symbol in self.alphabet().universe() {
                if let Some((target, output)) = self.transition(q, symbol) {
                    if let Some(&target) = map.get(&target) {
                        out.add_transition(id, symbol, output, target);
                    }
                }
            }
        }
        if let Some(initial) = self.initial().and_then(|q| map.get(&q)) {
            out.set_initial(*initial);
        }
        out
    }
}

impl<M: Mealy> Mealy for &M {
    type Alphabet = M::Alphabet;
    type Output = M::Output;
    type StateIndex = M::StateIndex;
    type StateIndices<'this> = M::StateIndices<'this> where Self: 'this;

    fn alphabet(&self) -> &Self::Alphabet {
        M::alphabet(self)
    }
    fn initial(&self) -> Option<Self::StateIndex> {
        M::initial(self)
    }
    fn state_indices(&self) -> Self::StateIndices<'_> {
        M::state_indices(self)
    }
    fn successor(
        &self,
        state: Self::StateIndex,
        symbol: SymbolOf<Self>,
    ) -> Option<Self::StateIndex> {
        M::successor(self, state, symbol)
    }
    fn transition_output(
        &self,
        state: Self::StateIndex,
        symbol: SymbolOf<Self>,
    ) -> Option<Self::Output> {
        M::transition_output(self, state, symbol)
    }
}

/// A concrete Mealy machine whose states are consecutive integers. Transitions may be
/// missing, in which case the machine is partial.
///
/// # Example
/// ```
/// use automata_core::prelude::*;
/// let mm = MealyBuilder::default()
///     .with_transitions([(0, 'a', 0, 1), (0, 'b', 1, 0), (1, 'a', 1, 0), (1, 'b', 0, 1)])
///     .into_mealy(0);
/// assert_eq!(mm.size(), 2);
/// assert_eq!(mm.compute_output(&Word::from("aab")), Some(Word::from(vec![0, 1, 1])));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct MealyMachine<A: Alphabet = crate::alphabet::CharAlphabet, O = usize> {
    alphabet: A,
    initial: DefaultIdType,
    states: Vec<Map<A::Symbol, (DefaultIdType, O)>>,
}

impl<A: Alphabet, O: Color> MealyMachine<A, O> {
    /// Creates a new machine without any states over the given alphabet.
    pub fn new(alphabet: A) -> Self {
        Self {
            alphabet,
            initial: 0,
            states: vec![],
        }
    }

    /// Adds a new state and returns its index.
    pub fn add_state(&mut self) -> DefaultIdType {
        self.states.push(Map::default());
        (self.states.len() - 1) as DefaultIdType
    }

    /// Adds a transition from `source` on `symbol` to `target` that emits `output`. Returns
    /// the previous target and output, if the transition was defined before. Panics if one of
    /// the two states does not exist.
    pub fn add_transition(
        &mut self,
        source: DefaultIdType,
        symbol: A::Symbol,
        output: O,
        target: DefaultIdType,
    ) -> Option<(DefaultIdType, O)> {
        assert!((target as usize) < self.states.len(), "target does not exist");
        self.states[source as usize].insert(symbol, (target, output))
    }

    /// Sets the initial state.
    pub fn set_initial(&mut self, initial: DefaultIdType) {
        self.initial = initial;
    }

    /// Consumes `self` and returns it with the given initial state.
    pub fn with_initial(mut self, initial: DefaultIdType) -> Self {
        self.set_initial(initial);
        self
    }

    /// Returns `true` if every state has a transition on every symbol.
    pub fn is_complete(&self) -> bool {
        self.states.iter().all(|transitions| {
            self.alphabet
                .universe()
                .all(|symbol| transitions.contains_key(&symbol))
        })
    }

    /// Returns the set of outputs that appear on some transition.
    pub fn output_range(&self) -> math::Set<O> {
        self.states
            .iter()
            .flat_map(|transitions| transitions.values().map(|(_, o)| o.clone()))
            .collect()
    }
}

impl<A: Alphabet, O: Color> Mealy for MealyMachine<A, O> {
    type Alphabet = A;
    type Output = O;
    type StateIndex = DefaultIdType;
    type StateIndices<'this> = std::ops::Range<DefaultIdType> where Self: 'this;

    fn alphabet(&self) -> &Self::Alphabet {
        &self.alphabet
    }

    fn initial(&self) -> Option<Self::StateIndex> {
        ((self.initial as usize) < self.states.len()).then_some(self.initial)
    }

    fn state_indices(&self) -> Self::StateIndices<'_> {
        0..(self.states.len() as DefaultIdType)
    }

    fn successor(
        &self,
        state: Self::StateIndex,
        symbol: SymbolOf<Self>,
    ) -> Option<Self::StateIndex> {
        self.states
            .get(state as usize)?
            .get(&symbol)
            .map(|(target, _)| *target)
    }

    fn transition_output(
        &self,
        state: Self::StateIndex,
        symbol: SymbolOf<Self>,
    ) -> Option<Self::Output> {
        self.states
            .get(state as usize)?
            .get(&symbol)
            .map(|(_, output)| output.clone())
    }

    fn size(&self) -> usize {
        self.states.len()
    }
}

impl<A: Alphabet, O: Color> Debug for MealyMachine<A, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", transition_table(self))
    }
}

/// Renders the transition table of a Mealy machine, the initial state is marked with an arrow.
pub fn transition_table<M: Mealy>(mm: &M) -> String {
    let mut builder = tabled::builder::Builder::default();
    builder.push_record(
        std::iter::once("State".to_string())
            .chain(mm.alphabet().universe().map(|s| s.show())),
    );
    for id in mm.state_indices().sorted() {
        let mut row = vec![if Some(id) == mm.initial() {
            format!("→ {}", id.show())
        } else {
            id.show()
        }];
        for symbol in mm.alphabet().universe() {
            row.push(match mm.successor(id, symbol) {
                Some(target) => format!(
                    "{:?} → {}",
                    mm.transition_output(id, symbol),
                    target.show()
                ),
                None => "-".to_string(),
            });
        }
        builder.push_record(row);
    }

    builder
        .build()
        .with(tabled::settings::Style::rounded())
        .to_string()
}

/// Helper for quickly building [`MealyMachine`]s from a list of transitions, each given as
/// a tuple `(source, symbol, output, target)`. The alphabet is inferred from the transitions.
#[derive(Debug, Clone)]
pub struct MealyBuilder<S, O> {
    transitions: Vec<(DefaultIdType, S, O, DefaultIdType)>,
}

impl<S, O> Default for MealyBuilder<S, O> {
    fn default() -> Self {
        Self {
            transitions: vec![],
        }
    }
}

impl<S: Symbol, O: Color> MealyBuilder<S, O> {
    /// Adds the given transitions.
    pub fn with_transitions<I>(mut self, transitions: I) -> Self
    where
        I: IntoIterator<Item = (DefaultIdType, S, O, DefaultIdType)>,
    {
        self.transitions.extend(transitions);
        self
    }

    /// Builds the machine with `initial` as initial state. The number of states is one more than
    /// the largest state index that occurs.
    pub fn into_mealy(self, initial: DefaultIdType) -> MealyMachine<SimpleAlphabet<S>, O> {
        let alphabet: SimpleAlphabet<S> = self.transitions.iter().map(|t| t.1).collect();
        self.into_mealy_over(alphabet, initial)
    }

    /// Builds the machine over the given alphabet, which may contain symbols that are not used
    /// by any transition.
    pub fn into_mealy_over<A: Alphabet<Symbol = S>>(
        self,
        alphabet: A,
        initial: DefaultIdType,
    ) -> MealyMachine<A, O> {
        let size = self
            .transitions
            .iter()
            .map(|(p, _, _, q)| std::cmp::max(*p, *q) + 1)
            .chain(std::iter::once(initial + 1))
            .max()
            .unwrap_or(1);
        let mut mm = MealyMachine::new(alphabet);
        for _ in 0..size {
            mm.add_state();
        }
        for (source, symbol, output, target) in self.transitions {
            mm.add_transition(source, symbol, output, target);
        }
        mm.with_initial(initial)
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    fn counter(modulus: u32) -> MealyMachine<CharAlphabet, u32> {
        MealyBuilder::default()
            .with_transitions(
                (0..modulus).flat_map(|q| [(q, 'a', q, (q + 1) % modulus), (q, 'b', q, 0)]),
            )
            .into_mealy(0)
    }

    #[test_log::test]
    fn mealy_equivalence() {
        let mm1 = MealyBuilder::default()
            .with_transitions([
                (0, 'a', 1, 0),
                (0, 'b', 0, 1),
                (1, 'a', 1, 0),
                (1, 'b', 0, 2),
                (2, 'a', 1, 0),
                (2, 'b', 0, 0),
            ])
            .into_mealy(0);
        let mm2 = MealyBuilder::default()
            .with_transitions([
                (0, 'a', 1, 0),
                (0, 'b', 0, 1),
                (1, 'a', 1, 0),
                (1, 'b', 0, 2),
                (2, 'a', 1, 0),
                (2, 'b', 1, 0),
            ])
            .into_mealy(0);
        assert_eq!(mm1.witness_inequivalence(&mm2), Some(Word::from("bbb")));
        assert!(mm1.bisimilar(&mm1.collect_mealy()));
    }

    #[test]
    fn outputs_of_counter() {
        let mm = counter(3);
        assert!(mm.is_complete());
        assert_eq!(
            mm.compute_output(&Word::from("aaab")),
            Some(Word::from(vec![0, 1, 2, 0]))
        );
        assert_eq!(
            mm.compute_suffix_output(&Word::from("aa"), &Word::from("a")),
            Some(Word::singleton(2))
        );
        assert_eq!(mm.reached_state(&Word::from("aab")), Some(0));
        assert_eq!(mm.compute_output(&Word::from("c")), None);
        assert_eq!(mm.output_range().len(), 3);
    }

    #[test]
    fn partial_machines_differ_from_complete_ones() {
        let mut partial = MealyMachine::new(CharAlphabet::of_size(2));
        let q = partial.add_state();
        partial.add_transition(q, 'a', 0u32, q);
        let complete = MealyBuilder::default()
            .with_transitions([(0, 'a', 0u32, 0), (0, 'b', 0, 0)])
            .into_mealy(0);
        assert!(!partial.is_complete());
        assert_eq!(
            partial.witness_inequivalence(&complete),
            Some(Word::from("b"))
        );
    }

    #[test]
    fn transition_table_marks_initial() {
        let table = format!("{:?}", counter(2));
        assert!(table.contains("→ 0"));
        assert!(table.contains("Some(1) → 0"));
    }
}
