use automata_core::{math::Map, mealy::SymbolOf, prelude::*};
use tracing::trace;

use crate::{
    hypothesis::AdtHypothesis, oracle::MembershipOracle, query::Query, LearningError, Result,
};

/// A Mealy machine whose states have access sequences, i.e. words that lead to them from the
/// initial state.
pub trait AccessSequences: Mealy {
    fn access_sequence(&self, state: Self::StateIndex) -> Option<Word<SymbolOf<Self>>>;

    /// The access sequence of the state that is reached by `word`.
    fn transform_access_sequence(&self, word: &Word<SymbolOf<Self>>) -> Option<Word<SymbolOf<Self>>> {
        self.access_sequence(self.reached_state(word)?)
    }
}

impl<A: Alphabet, O: Color> AccessSequences for AdtHypothesis<A, O> {
    fn access_sequence(&self, state: Self::StateIndex) -> Option<Word<SymbolOf<Self>>> {
        AdtHypothesis::access_sequence(self, state).cloned()
    }
}

/// Finds the index at which a counterexample can be decomposed, following Rivest and Schapire.
///
/// For a counterexample `w` of length `n` the effect of position `i` holds if the system,
/// after reading the access sequence of the hypothesis state reached by `w[..i]`, answers
/// `w[i..]` the same way as the hypothesis does. The effect does not hold for `0` and holds for
/// `n`, a binary search finds `i` such that it does not hold for `i` but for `i + 1` and returns
/// `i + 1`. If the query is no counterexample, `None` is returned.
pub fn find_suffix_index<H, M>(
    query: &Query<SymbolOf<H>, H::Output>,
    hypothesis: &H,
    oracle: &mut M,
) -> Result<Option<usize>>
where
    H: AccessSequences,
    M: MembershipOracle<Input = SymbolOf<H>, Output = H::Output>,
{
    if !query.is_counterexample(hypothesis) {
        return Ok(None);
    }
    let input = query.input();
    let expected = hypothesis
        .compute_output(&input)
        .ok_or_else(|| LearningError::illegal("hypothesis has undefined transitions"))?;

    let mut effects = Map::default();
    let mut effect = |index: usize| -> Result<bool> {
        if let Some(known) = effects.get(&index) {
            return Ok(*known);
        }
        let prefix = input.prefix(index);
        let suffix = input.skip(index);
        let access = hypothesis.transform_access_sequence(&prefix).ok_or_else(|| {
            LearningError::illegal(format!("no access sequence for {prefix}"))
        })?;
        let holds = oracle.answer_query(&access, &suffix)? == expected.skip(index);
        trace!("effect of {index} in {input} is {holds}");
        effects.insert(index, holds);
        Ok(holds)
    };

    let (mut low, mut high) = (0, input.len());
    while high - low > 1 {
        let mid = (low + high) / 2;
        if effect(mid)? {
            high = mid;
        } else {
            low = mid;
        }
    }
    Ok(Some(low + 1))
}
