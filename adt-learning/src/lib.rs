//! Active learning of Mealy machines with adaptive distinguishing trees.
//!
//! The [`AdtLearner`] maintains a hypothesis whose states are identified by the leaves of an
//! adaptive distinguishing tree ([`adt::Adt`]). Transitions are closed by sifting their access
//! sequence through the tree. Counterexamples are decomposed with the technique of Rivest and
//! Schapire, and the learner tries to replace parts of the tree by cheaper adaptive
//! distinguishing sequences in order to save resets of the system under learning.
//!
//! All queries reach the system through an [`bridge::ObservationTreeBridge`], which records
//! every observation and can answer repeated queries without touching the system.
#![deny(rustdoc::broken_intra_doc_links)]

mod error;
pub use error::{LearningError, Result};

/// Queries consisting of a prefix, a suffix and possibly an answer.
pub mod query;

/// Systems under learning and simple wrappers around them.
pub mod sul;

/// Membership and symbol query oracles, including a shared cache and a parallel oracle.
pub mod oracle;

/// The adaptive distinguishing tree.
pub mod adt;

pub mod hypothesis;

/// Records all observations that were made on the system under learning.
pub mod observation_tree;

pub mod bridge;

/// Decomposition of counterexamples.
pub mod counterexample;

pub mod config;

mod learner;
pub use learner::{AdtLearner, AdtLearnerBuilder, AdtLearnerState};

/// Equivalence oracles that search for counterexamples.
pub mod equivalence;

mod experiment;
pub use experiment::MealyExperiment;

/// Includes everything that is needed to set up and run a learning experiment.
pub mod prelude {
    pub use super::{
        config::{
            AdtExtenders, LeafSplitters, SubtreeReplacers, DEFAULT_SPLITTER, EXHAUSTIVE_BEST_EFFORT,
            EXTEND_BEST_EFFORT, EXTEND_PARENT, LEVELED_BEST_EFFORT, NEVER_REPLACE, NOP_EXTENDER,
            SINGLE_BEST_EFFORT,
        },
        equivalence::{EquivalenceOracle, SimulatorEqOracle, WMethodEqOracle},
        oracle::{
            MembershipOracle, SharedCacheOracle, StaticParallelOracle, SulOracle,
            SymbolQueryOracle,
        },
        query::Query,
        sul::{ForkableSul, MealySimulatorSul, Sul, SymbolCounterSul},
        AdtLearner, AdtLearnerBuilder, AdtLearnerState, LearningError, MealyExperiment,
    };
}
