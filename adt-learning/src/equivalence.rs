use std::{collections::VecDeque, marker::PhantomData};

use automata_core::{
    math::{HashSet, Map, Set},
    prelude::*,
};
use itertools::Itertools;
use tracing::{debug, trace};

use crate::{oracle::MembershipOracle, query::Query, LearningError, Result};

type QueryOf<E> = Query<
    <<E as EquivalenceOracle>::Alphabet as Alphabet>::Symbol,
    <E as EquivalenceOracle>::Output,
>;

/// Decides whether a hypothesis is correct. If it is not, a counterexample is returned, that
/// is an answered query on which the hypothesis produces a different output.
pub trait EquivalenceOracle {
    type Alphabet: Alphabet;
    type Output: Color;

    fn find_counterexample<H>(
        &mut self,
        hypothesis: &H,
        alphabet: &Self::Alphabet,
    ) -> Result<Option<QueryOf<Self>>>
    where
        H: Mealy<Alphabet = Self::Alphabet, Output = Self::Output>;
}

/// Compares the hypothesis with a known reference machine, the returned counterexamples are
/// shortest ones.
#[derive(Debug, Clone)]
pub struct SimulatorEqOracle<A: Alphabet, O: Color> {
    reference: MealyMachine<A, O>,
}

impl<A: Alphabet, O: Color> SimulatorEqOracle<A, O> {
    pub fn new(reference: MealyMachine<A, O>) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &MealyMachine<A, O> {
        &self.reference
    }
}

impl<A: Alphabet, O: Color> EquivalenceOracle for SimulatorEqOracle<A, O> {
    type Alphabet = A;
    type Output = O;

    fn find_counterexample<H>(
        &mut self,
        hypothesis: &H,
        _alphabet: &A,
    ) -> Result<Option<Query<A::Symbol, O>>>
    where
        H: Mealy<Alphabet = A, Output = O>,
    {
        let Some(witness) = hypothesis.witness_inequivalence(&self.reference) else {
            return Ok(None);
        };
        let output = self.reference.compute_output(&witness).ok_or_else(|| {
            LearningError::invalid(format!("reference machine is not defined on {witness}"))
        })?;
        debug!("simulator found counterexample {witness}");
        Ok(Some(Query::counterexample(witness, output)))
    }
}

/// Tests the hypothesis with the words of the W-method: every word of the transition cover,
/// followed by every word of length at most `depth`, followed by every word of a
/// characterizing set of the hypothesis. The words are posed to a [`MembershipOracle`] in
/// batches and in a fixed order, so the first counterexample found is deterministic.
#[derive(Debug, Clone)]
pub struct WMethodEqOracle<A, M> {
    oracle: M,
    depth: usize,
    batch_size: usize,
    _alphabet: PhantomData<A>,
}

impl<A: Alphabet, M: MembershipOracle<Input = A::Symbol>> WMethodEqOracle<A, M> {
    pub fn new(oracle: M, depth: usize) -> Self {
        Self {
            oracle,
            depth,
            batch_size: 64,
            _alphabet: PhantomData,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn oracle(&self) -> &M {
        &self.oracle
    }
}

/// Shortest access words for all reachable states, in breadth-first order.
fn state_cover<H: Mealy>(hypothesis: &H, symbols: &[SymbolOf<H>]) -> Map<H::StateIndex, Word<SymbolOf<H>>> {
    let mut cover = Map::default();
    let Some(initial) = hypothesis.initial() else {
        return cover;
    };
    cover.insert(initial, Word::epsilon());
    let mut queue = VecDeque::from([initial]);
    while let Some(state) = queue.pop_front() {
        let access = cover.get(&state).cloned().unwrap_or_else(Word::epsilon);
        for &symbol in symbols {
            if let Some(target) = hypothesis.successor(state, symbol) {
                if !cover.contains_key(&target) {
                    cover.insert(target, access.append(symbol));
                    queue.push_back(target);
                }
            }
        }
    }
    cover
}

/// A shortest word on which `first` and `second` produce different outputs.
fn separating_word<H: Mealy>(
    hypothesis: &H,
    symbols: &[SymbolOf<H>],
    first: H::StateIndex,
    second: H::StateIndex,
) -> Option<Word<SymbolOf<H>>> {
    let mut seen = HashSet::default();
    seen.insert((first, second));
    let mut queue = VecDeque::from([(first, second, Word::epsilon())]);
    while let Some((left, right, word)) = queue.pop_front() {
        for &symbol in symbols {
            let (Some((lt, lo)), Some((rt, ro))) = (
                hypothesis.transition(left, symbol),
                hypothesis.transition(right, symbol),
            ) else {
                continue;
            };
            let extended = word.append(symbol);
            if lo != ro {
                return Some(extended);
            }
            if seen.insert((lt, rt)) {
                queue.push_back((lt, rt, extended));
            }
        }
    }
    None
}

/// All words over `symbols` of length at most `depth`, shorter ones first.
fn middle_words<S: Symbol>(symbols: &[S], depth: usize) -> Vec<Word<S>> {
    let mut out = vec![Word::epsilon()];
    let mut layer = vec![Word::epsilon()];
    for _ in 0..depth {
        layer = layer
            .iter()
            .cartesian_product(symbols)
            .map(|(word, &symbol)| word.append(symbol))
            .collect();
        out.extend(layer.iter().cloned());
    }
    out
}

impl<A, M> EquivalenceOracle for WMethodEqOracle<A, M>
where
    A: Alphabet,
    M: MembershipOracle<Input = A::Symbol>,
{
    type Alphabet = A;
    type Output = M::Output;

    fn find_counterexample<H>(
        &mut self,
        hypothesis: &H,
        alphabet: &A,
    ) -> Result<Option<Query<A::Symbol, M::Output>>>
    where
        H: Mealy<Alphabet = Self::Alphabet, Output = Self::Output>,
    {
        let symbols = alphabet.universe().collect_vec();
        let cover = state_cover(hypothesis, &symbols);

        let mut prefixes: Set<Word<M::Input>> = Set::default();
        for access in cover.values() {
            prefixes.insert(access.clone());
            for &symbol in &symbols {
                prefixes.insert(access.append(symbol));
            }
        }

        let states = cover.keys().copied().collect_vec();
        let mut suffixes: Set<Word<M::Input>> = Set::default();
        for (i, &first) in states.iter().enumerate() {
            for &second in &states[i + 1..] {
                if let Some(word) = separating_word(hypothesis, &symbols, first, second) {
                    suffixes.insert(word);
                }
            }
        }
        if suffixes.is_empty() {
            suffixes.insert(Word::epsilon());
        }
        let middle = middle_words(&symbols, self.depth);
        debug!(
            "w-method with {} prefixes, {} middle words and {} suffixes",
            prefixes.len(),
            middle.len(),
            suffixes.len()
        );

        let tests: Set<Word<M::Input>> = prefixes
            .iter()
            .cartesian_product(&middle)
            .cartesian_product(&suffixes)
            .map(|((prefix, middle), suffix)| prefix.concat(middle).concat(suffix))
            .filter(|word| !word.is_empty())
            .collect();

        for chunk in &tests.into_iter().chunks(self.batch_size) {
            let mut queries = chunk
                .map(|word| Query::new(Word::epsilon(), word))
                .collect_vec();
            self.oracle.process_queries(&mut queries)?;
            for query in queries {
                if query.is_counterexample(hypothesis) {
                    trace!("w-method test {query:?} fails");
                    return Ok(Some(query));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{oracle::SulOracle, sul::MealySimulatorSul};

    fn toggle() -> MealyMachine<CharAlphabet, u8> {
        MealyBuilder::default()
            .with_transitions([(0, 'a', 0, 1), (1, 'a', 1, 0), (0, 'b', 0, 0), (1, 'b', 1, 1)])
            .into_mealy(0)
    }

    fn single_state() -> MealyMachine<CharAlphabet, u8> {
        MealyBuilder::default()
            .with_transitions([(0, 'a', 0, 0), (0, 'b', 0, 0)])
            .into_mealy(0)
    }

    #[test_log::test]
    fn simulator_returns_shortest_counterexample() {
        let mut oracle = SimulatorEqOracle::new(toggle());
        let hypothesis = single_state();
        let query = oracle
            .find_counterexample(&hypothesis, hypothesis.alphabet())
            .unwrap()
            .unwrap();
        assert_eq!(query.input(), Word::from("aa"));
        assert_eq!(query.output(), Some(&Word::from(vec![0, 1])));
        assert!(query.is_counterexample(&hypothesis));

        let reference = toggle();
        assert!(oracle
            .find_counterexample(&reference, reference.alphabet())
            .unwrap()
            .is_none());
    }

    #[test_log::test]
    fn w_method_finds_differences() {
        let mut oracle: WMethodEqOracle<CharAlphabet, _> =
            WMethodEqOracle::new(SulOracle::new(MealySimulatorSul::new(toggle(), 9)), 1);
        let hypothesis = single_state();
        let query = oracle
            .find_counterexample(&hypothesis, hypothesis.alphabet())
            .unwrap()
            .unwrap();
        assert!(query.is_counterexample(&hypothesis));

        let reference = toggle();
        assert!(oracle
            .find_counterexample(&reference, reference.alphabet())
            .unwrap()
            .is_none());
    }

    #[test_log::test]
    fn words_of_bounded_length() {
        let words = middle_words(&['a', 'b'], 2);
        assert_eq!(words.len(), 7);
        assert_eq!(words[0], Word::epsilon());
        assert_eq!(words[6], Word::from("bb"));
    }
}
