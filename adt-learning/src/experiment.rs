use std::time::{Duration, Instant};

use automata_core::prelude::*;
use tracing::{debug, info};

use crate::{
    equivalence::EquivalenceOracle, learner::AdtLearner, sul::Sul, LearningError, Result,
};

/// Drives an [`AdtLearner`] with an [`EquivalenceOracle`] until the oracle accepts the
/// hypothesis. Every posed counterexample counts as one round.
pub struct MealyExperiment<A, T, E>
where
    A: Alphabet,
    T: Sul<Input = A::Symbol>,
{
    learner: AdtLearner<A, T>,
    equivalence: E,
    counterexamples: Vec<usize>,
    hypothesis_sizes: Vec<usize>,
    elapsed: Duration,
}

impl<A, T, E> MealyExperiment<A, T, E>
where
    A: Alphabet,
    T: Sul<Input = A::Symbol>,
    E: EquivalenceOracle<Alphabet = A, Output = T::Output>,
{
    pub fn new(learner: AdtLearner<A, T>, equivalence: E) -> Self {
        Self {
            learner,
            equivalence,
            counterexamples: vec![],
            hypothesis_sizes: vec![],
            elapsed: Duration::ZERO,
        }
    }

    /// Runs the experiment and returns the final hypothesis.
    pub fn run(&mut self) -> Result<MealyMachine<A, T::Output>> {
        let start = Instant::now();
        self.learner.start_learning()?;
        loop {
            self.hypothesis_sizes.push(self.learner.hypothesis().size());
            let Some(counterexample) = self
                .equivalence
                .find_counterexample(self.learner.hypothesis(), self.learner.alphabet())?
            else {
                break;
            };
            debug!(
                "round {}: hypothesis of size {} is refuted by {counterexample:?}",
                self.rounds() + 1,
                self.learner.hypothesis().size()
            );
            if !self.learner.refine_hypothesis(&counterexample)? {
                return Err(LearningError::illegal(format!(
                    "{counterexample:?} does not refute the hypothesis"
                )));
            }
            self.counterexamples.push(counterexample.input().len());
        }
        self.elapsed = start.elapsed();
        info!(
            "learned {} states in {} rounds, took {}",
            self.learner.hypothesis().size(),
            self.rounds(),
            show_duration(self.elapsed)
        );
        Ok(self.learner.get_hypothesis_model())
    }
}

impl<A, T, E> MealyExperiment<A, T, E>
where
    A: Alphabet,
    T: Sul<Input = A::Symbol>,
{
    /// Number of counterexamples that were needed.
    pub fn rounds(&self) -> usize {
        self.counterexamples.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn learner(&self) -> &AdtLearner<A, T> {
        &self.learner
    }

    pub fn into_learner(self) -> AdtLearner<A, T> {
        self.learner
    }

    /// Renders a table with one row per round, listing the size of the hypothesis that was
    /// refuted and the length of the counterexample.
    pub fn statistics(&self) -> String {
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(["Round", "Hypothesis size", "Counterexample length"]);
        for (round, size) in self.hypothesis_sizes.iter().enumerate() {
            let length = self
                .counterexamples
                .get(round)
                .map_or("-".to_string(), |length| length.to_string());
            builder.push_record([round.to_string(), size.to_string(), length]);
        }
        builder
            .build()
            .with(tabled::settings::Style::rounded())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{equivalence::SimulatorEqOracle, sul::MealySimulatorSul};

    #[test_log::test]
    fn experiment_counts_rounds() {
        let toggle = MealyBuilder::default()
            .with_transitions([(0, 'a', 0, 1), (1, 'a', 1, 0)])
            .into_mealy(0);
        let learner = AdtLearner::new(
            toggle.alphabet().clone(),
            MealySimulatorSul::new(toggle.clone(), 9),
        );
        let mut experiment = MealyExperiment::new(learner, SimulatorEqOracle::new(toggle.clone()));
        let model = experiment.run().unwrap();
        assert!(model.bisimilar(&toggle));
        assert_eq!(experiment.rounds(), 1);
        let table = experiment.statistics();
        assert!(table.contains("Counterexample length"));
    }
}
