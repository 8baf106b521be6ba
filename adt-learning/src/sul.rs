use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use automata_core::prelude::*;
use tracing::trace;

/// A system under learning. It can be reset to its initial configuration and then be fed with
/// one input symbol at a time, producing exactly one output for each of them.
pub trait Sul {
    type Input: Symbol;
    type Output: Color;

    /// Brings the system back into its initial configuration.
    fn reset(&mut self);

    /// Feeds `input` to the system and returns the output it produces.
    fn step(&mut self, input: Self::Input) -> Self::Output;
}

/// A [`Sul`] that can produce independent copies of itself, which allows to pose queries to
/// several instances in parallel.
pub trait ForkableSul: Sul + Send + Sized {
    /// Creates an independent copy, which starts out in the initial configuration.
    fn fork(&self) -> Self;
}

impl<T: Sul> Sul for &mut T {
    type Input = T::Input;
    type Output = T::Output;

    fn reset(&mut self) {
        T::reset(self)
    }

    fn step(&mut self, input: Self::Input) -> Self::Output {
        T::step(self, input)
    }
}

/// Simulates a [`MealyMachine`]. Once an undefined transition is taken, the simulator is
/// stuck in a sink and answers every further input with the `no_transition` output.
#[derive(Clone)]
pub struct MealySimulatorSul<A: Alphabet, O> {
    machine: Arc<MealyMachine<A, O>>,
    current: Option<DefaultIdType>,
    no_transition: O,
}

impl<A: Alphabet, O: Color> MealySimulatorSul<A, O> {
    /// Creates a simulator for `machine`.
    pub fn new(machine: MealyMachine<A, O>, no_transition: O) -> Self {
        let current = machine.initial();
        Self {
            machine: Arc::new(machine),
            current,
            no_transition,
        }
    }

    /// Gives a reference to the simulated machine.
    pub fn machine(&self) -> &MealyMachine<A, O> {
        &self.machine
    }
}

impl<A: Alphabet, O: Color> Sul for MealySimulatorSul<A, O> {
    type Input = A::Symbol;
    type Output = O;

    fn reset(&mut self) {
        self.current = self.machine.initial();
    }

    fn step(&mut self, input: Self::Input) -> Self::Output {
        match self
            .current
            .and_then(|state| self.machine.transition(state, input))
        {
            Some((target, output)) => {
                self.current = Some(target);
                output
            }
            None => {
                self.current = None;
                self.no_transition.clone()
            }
        }
    }
}

impl<A, O> ForkableSul for MealySimulatorSul<A, O>
where
    A: Alphabet + Send + Sync,
    O: Color + Send + Sync,
    A::Symbol: Send + Sync,
{
    fn fork(&self) -> Self {
        Self {
            machine: Arc::clone(&self.machine),
            current: self.machine.initial(),
            no_transition: self.no_transition.clone(),
        }
    }
}

/// Wraps a [`Sul`] and counts the number of symbols and resets that are posed to it. Forks of
/// a counter share their counts with the original.
#[derive(Debug)]
pub struct SymbolCounterSul<T> {
    sul: T,
    symbols: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
}

impl<T: Sul> SymbolCounterSul<T> {
    pub fn new(sul: T) -> Self {
        Self {
            sul,
            symbols: Arc::new(AtomicUsize::new(0)),
            resets: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of symbols that were fed to the system so far.
    pub fn symbols(&self) -> usize {
        self.symbols.load(Ordering::Relaxed)
    }

    /// Number of resets so far.
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &T {
        &self.sul
    }
}

impl<T: Sul> Sul for SymbolCounterSul<T> {
    type Input = T::Input;
    type Output = T::Output;

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
        self.sul.reset()
    }

    fn step(&mut self, input: Self::Input) -> Self::Output {
        let count = self.symbols.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("posing symbol {} as symbol number {count}", input.show());
        self.sul.step(input)
    }
}

impl<T: ForkableSul> ForkableSul for SymbolCounterSul<T> {
    fn fork(&self) -> Self {
        Self {
            sul: self.sul.fork(),
            symbols: Arc::clone(&self.symbols),
            resets: Arc::clone(&self.resets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn simulator_falls_into_sink() {
        let mm = MealyBuilder::default()
            .with_transitions([(0, 'a', 1, 1), (1, 'b', 2, 0)])
            .into_mealy(0);
        let mut sul = SymbolCounterSul::new(MealySimulatorSul::new(mm, 0));
        assert_eq!(sul.step('a'), 1);
        assert_eq!(sul.step('a'), 0);
        assert_eq!(sul.step('b'), 0);
        sul.reset();
        assert_eq!(sul.step('a'), 1);
        assert_eq!(sul.step('b'), 2);

        let mut fork = sul.fork();
        assert_eq!(fork.step('a'), 1);
        assert_eq!(sul.symbols(), 6);
        assert_eq!(sul.resets(), 1);
    }
}
