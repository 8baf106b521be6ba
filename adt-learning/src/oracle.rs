use automata_core::prelude::*;

use crate::{query::Query, sul::Sul, Result};

mod cache;
pub use cache::SharedCacheOracle;

mod parallel;
pub use parallel::StaticParallelOracle;

/// An oracle that is queried one symbol at a time. The answer to a query depends on every
/// symbol that was queried since the last call to [`SymbolQueryOracle::reset`].
pub trait SymbolQueryOracle {
    type Input: Symbol;
    type Output: Color;

    /// Brings the oracle back into its initial configuration.
    fn reset(&mut self);

    /// Queries a single input symbol.
    fn query(&mut self, input: Self::Input) -> Result<Self::Output>;

    /// Resets the oracle, reads `prefix` and returns the outputs produced on `suffix`.
    fn answer_suffix(
        &mut self,
        prefix: &Word<Self::Input>,
        suffix: &Word<Self::Input>,
    ) -> Result<Word<Self::Output>> {
        self.reset();
        for &symbol in prefix {
            self.query(symbol)?;
        }
        suffix.iter().map(|&symbol| self.query(symbol)).collect()
    }
}

/// An oracle that answers membership queries, i.e. it returns for a prefix and a suffix the
/// output that the system produces on the suffix after having read the prefix.
pub trait MembershipOracle {
    type Input: Symbol;
    type Output: Color;

    /// Answers a single query, the returned word has the same length as `suffix`.
    fn answer_query(
        &mut self,
        prefix: &Word<Self::Input>,
        suffix: &Word<Self::Input>,
    ) -> Result<Word<Self::Output>>;

    /// Answers a batch of queries in place.
    fn process_queries(&mut self, queries: &mut [Query<Self::Input, Self::Output>]) -> Result<()> {
        for query in queries.iter_mut() {
            let output = self.answer_query(query.prefix(), query.suffix())?;
            query.answer(output);
        }
        Ok(())
    }
}

/// Adapts a [`Sul`] so it can be used as a [`SymbolQueryOracle`] and a [`MembershipOracle`].
#[derive(Debug, Clone)]
pub struct SulOracle<T> {
    sul: T,
}

impl<T: Sul> SulOracle<T> {
    pub fn new(sul: T) -> Self {
        Self { sul }
    }

    pub fn sul(&self) -> &T {
        &self.sul
    }

    pub fn into_inner(self) -> T {
        self.sul
    }
}

impl<T: Sul> SymbolQueryOracle for SulOracle<T> {
    type Input = T::Input;
    type Output = T::Output;

    fn reset(&mut self) {
        self.sul.reset();
    }

    fn query(&mut self, input: Self::Input) -> Result<Self::Output> {
        Ok(self.sul.step(input))
    }
}

impl<T: Sul> MembershipOracle for SulOracle<T> {
    type Input = T::Input;
    type Output = T::Output;

    fn answer_query(
        &mut self,
        prefix: &Word<Self::Input>,
        suffix: &Word<Self::Input>,
    ) -> Result<Word<Self::Output>> {
        self.answer_suffix(prefix, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sul::MealySimulatorSul;

    #[test_log::test]
    fn sul_oracle_answers_suffix() {
        let mm = MealyBuilder::default()
            .with_transitions([(0, 'a', 0, 1), (1, 'a', 1, 0)])
            .into_mealy(0);
        let mut oracle = SulOracle::new(MealySimulatorSul::new(mm, 9));
        let mut queries = [
            Query::new(Word::from("a"), Word::from("aa")),
            Query::new(Word::epsilon(), Word::from("ab")),
        ];
        oracle.process_queries(&mut queries).unwrap();
        assert_eq!(queries[0].output(), Some(&Word::from(vec![1, 0])));
        assert_eq!(queries[1].output(), Some(&Word::from(vec![0, 9])));
    }
}
