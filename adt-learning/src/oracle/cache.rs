use std::sync::{Arc, RwLock};

use automata_core::{math, prelude::*};
use tracing::trace;

use crate::{LearningError, Result};

use super::MembershipOracle;

type Cache<S, O> = Arc<RwLock<math::HashMap<Word<S>, Word<O>>>>;

/// A cache that sits in front of a [`MembershipOracle`]. The cache maps complete input words to
/// the complete output they produce and can be shared between several handles via
/// [`SharedCacheOracle::share_with`]. Lookups only take a read lock, so any number of handles
/// can read concurrently while insertions are exclusive.
///
/// Outputs are prefix closed, so a cached answer for `uv` also answers every query for `u`.
#[derive(Debug)]
pub struct SharedCacheOracle<M: MembershipOracle> {
    cache: Cache<M::Input, M::Output>,
    delegate: M,
}

impl<M: MembershipOracle> SharedCacheOracle<M> {
    pub fn new(delegate: M) -> Self {
        Self {
            cache: Arc::new(RwLock::new(math::HashMap::default())),
            delegate,
        }
    }

    /// Creates a new handle that shares the cache of `self` but uses `delegate` for answering
    /// queries that miss the cache.
    pub fn share_with(&self, delegate: M) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            delegate,
        }
    }

    /// Number of cached words.
    pub fn len(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn delegate(&self) -> &M {
        &self.delegate
    }

    fn lookup(&self, input: &Word<M::Input>) -> Result<Option<Word<M::Output>>> {
        let cache = self
            .cache
            .read()
            .map_err(|_| LearningError::illegal("query cache is poisoned"))?;
        Ok(cache.get(input).cloned())
    }

    fn insert(&self, input: Word<M::Input>, output: Word<M::Output>) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| LearningError::illegal("query cache is poisoned"))?;
        for length in 1..=input.len() {
            let prefix = input.prefix(length);
            let prefix_output = output.prefix(length);
            match cache.get(&prefix) {
                Some(known) if known != &prefix_output => {
                    return Err(LearningError::NonDeterministicSul {
                        input: prefix.show(),
                        expected: format!("{known:?}"),
                        observed: format!("{prefix_output:?}"),
                    })
                }
                Some(_) => {}
                None => {
                    cache.insert(prefix, prefix_output);
                }
            }
        }
        Ok(())
    }
}

impl<M: MembershipOracle> MembershipOracle for SharedCacheOracle<M> {
    type Input = M::Input;
    type Output = M::Output;

    fn answer_query(
        &mut self,
        prefix: &Word<Self::Input>,
        suffix: &Word<Self::Input>,
    ) -> Result<Word<Self::Output>> {
        let input = prefix.concat(suffix);
        let output = match self.lookup(&input)? {
            Some(output) => {
                trace!("cache hit for {}", input.show());
                output
            }
            None => {
                let output = self.delegate.answer_query(&Word::epsilon(), &input)?;
                self.insert(input, output.clone())?;
                output
            }
        };
        Ok(output.suffix(suffix.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        oracle::SulOracle,
        sul::{MealySimulatorSul, SymbolCounterSul},
    };

    #[test_log::test]
    fn cache_is_prefix_closed_and_shared() {
        let mm = MealyBuilder::default()
            .with_transitions([(0, 'a', 0, 1), (1, 'a', 1, 0)])
            .into_mealy(0);
        let mut cache = SharedCacheOracle::new(SulOracle::new(SymbolCounterSul::new(
            MealySimulatorSul::new(mm.clone(), 0),
        )));
        assert_eq!(
            cache.answer_query(&Word::epsilon(), &Word::from("aaa")).unwrap(),
            Word::from(vec![0, 1, 0])
        );
        assert_eq!(
            cache.answer_query(&Word::from("a"), &Word::from("a")).unwrap(),
            Word::singleton(1)
        );
        assert_eq!(cache.delegate().sul().symbols(), 3);
        assert_eq!(cache.len(), 3);

        let mut other = cache.share_with(SulOracle::new(SymbolCounterSul::new(
            MealySimulatorSul::new(mm, 0),
        )));
        assert_eq!(
            other.answer_query(&Word::epsilon(), &Word::from("aa")).unwrap(),
            Word::from(vec![0, 1])
        );
        assert_eq!(other.delegate().sul().symbols(), 0);
    }
}
