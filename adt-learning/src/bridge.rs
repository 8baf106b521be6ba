use automata_core::prelude::*;
use tracing::trace;

use crate::{
    observation_tree::ObservationTree,
    oracle::{MembershipOracle, SymbolQueryOracle},
    sul::Sul,
    Result,
};

/// Sits between the learner and the [`Sul`] and records every observed output in an
/// [`ObservationTree`]. An output that contradicts an earlier observation is reported as
/// [`crate::LearningError::NonDeterministicSul`].
///
/// If the cache is enabled, steps whose outcome is already recorded are answered from the tree
/// without touching the system. The system is only reset and brought to the current position
/// once a step is not known yet.
pub struct ObservationTreeBridge<T: Sul> {
    sul: T,
    tree: ObservationTree<T::Input, T::Output>,
    use_cache: bool,
    current: usize,
    trace: Vec<T::Input>,
    synced: bool,
}

impl<T: Sul> ObservationTreeBridge<T> {
    pub fn new<I>(sul: T, symbols: I, use_cache: bool) -> Self
    where
        I: IntoIterator<Item = T::Input>,
    {
        Self {
            sul,
            tree: ObservationTree::new(symbols),
            use_cache,
            current: 0,
            trace: vec![],
            synced: false,
        }
    }

    /// Moves the bridge back to the root of the tree, the system is reset on the next query
    /// that can not be answered from the tree.
    pub fn initialize(&mut self) {
        self.current = self.tree.root();
        self.trace.clear();
        self.synced = false;
    }

    pub fn tree(&self) -> &ObservationTree<T::Input, T::Output> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ObservationTree<T::Input, T::Output> {
        &mut self.tree
    }

    pub fn sul(&self) -> &T {
        &self.sul
    }

    pub fn sul_mut(&mut self) -> &mut T {
        &mut self.sul
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    fn synchronize(&mut self) -> Result<()> {
        self.sul.reset();
        let mut node = self.tree.root();
        for &symbol in &self.trace {
            let output = self.sul.step(symbol);
            node = self.tree.insert_step(node, symbol, output)?;
        }
        self.synced = true;
        Ok(())
    }
}

impl<T: Sul> SymbolQueryOracle for ObservationTreeBridge<T> {
    type Input = T::Input;
    type Output = T::Output;

    fn reset(&mut self) {
        self.initialize();
        if !self.use_cache {
            self.sul.reset();
            self.synced = true;
        }
    }

    fn query(&mut self, input: Self::Input) -> Result<Self::Output> {
        if self.use_cache {
            if let Some((output, next)) = self.tree.successor(self.current, input) {
                let output = output.clone();
                self.current = next;
                self.trace.push(input);
                self.synced = false;
                return Ok(output);
            }
            if !self.synced {
                trace!("replaying {} symbols", self.trace.len());
                self.synchronize()?;
            }
        }
        let output = self.sul.step(input);
        self.current = self.tree.insert_step(self.current, input, output.clone())?;
        self.trace.push(input);
        Ok(output)
    }
}

impl<T: Sul> MembershipOracle for ObservationTreeBridge<T> {
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
    use crate::{
        sul::{MealySimulatorSul, SymbolCounterSul},
        LearningError,
    };

    fn toggle() -> MealyMachine<CharAlphabet, u8> {
        MealyBuilder::default()
            .with_transitions([(0, 'a', 0, 1), (1, 'a', 1, 0), (0, 'b', 0, 0), (1, 'b', 0, 1)])
            .into_mealy(0)
    }

    #[test_log::test]
    fn cached_steps_do_not_reach_the_system() {
        let sul = SymbolCounterSul::new(MealySimulatorSul::new(toggle(), 9));
        let mut bridge = ObservationTreeBridge::new(sul, ['a', 'b'], true);
        assert_eq!(
            bridge.answer_query(&Word::from("a"), &Word::from("a")).unwrap(),
            Word::singleton(1)
        );
        assert_eq!(bridge.sul().symbols(), 2);

        assert_eq!(
            bridge.answer_query(&Word::epsilon(), &Word::from("aa")).unwrap(),
            Word::from(vec![0, 1])
        );
        assert_eq!(bridge.sul().symbols(), 2);

        assert_eq!(
            bridge.answer_query(&Word::from("aa"), &Word::from("b")).unwrap(),
            Word::singleton(0)
        );
        assert_eq!(bridge.sul().symbols(), 5);
        assert_eq!(bridge.tree().size(), 4);
    }

    #[test_log::test]
    fn uncached_steps_are_checked() {
        let sul = MealySimulatorSul::new(toggle(), 9);
        let mut bridge = ObservationTreeBridge::new(sul, ['a', 'b'], false);
        bridge.tree_mut().initialize(0);
        bridge
            .tree_mut()
            .add_trace(0, &Word::from("a"), &Word::singleton(1))
            .unwrap();
        bridge.reset();
        assert!(matches!(
            bridge.query('a'),
            Err(LearningError::NonDeterministicSul { .. })
        ));
    }
}
