//! The strategies that can be plugged into the [`crate::AdtLearner`]. Each of them is a small
//! closed enum that is passed by value.
use automata_core::prelude::*;

use crate::{
    adt::Adt,
    hypothesis::{AdtHypothesis, StateId},
    Result,
};

mod ads;
pub use ads::{compute_ads, compute_best_effort_ads};

mod splitter;
pub use splitter::LeafSplitters;

mod extender;
pub use extender::{AdtExtenders, ExtensionResult};

mod replacer;
pub use replacer::{ReplacementResult, SubtreeReplacers};

/// Splits leaves by inserting a reset node followed by the splitter.
pub const DEFAULT_SPLITTER: LeafSplitters = LeafSplitters::DefaultSplitter;
/// Splits leaves by extending the ADS of the leaf if possible.
pub const EXTEND_PARENT: LeafSplitters = LeafSplitters::ExtendParent;
/// Never extends the temporary ADS.
pub const NOP_EXTENDER: AdtExtenders = AdtExtenders::Nop;
/// Tries to replace a temporary ADS by one that needs fewer resets.
pub const EXTEND_BEST_EFFORT: AdtExtenders = AdtExtenders::ExtendBestEffort;
/// Never proposes replacements.
pub const NEVER_REPLACE: SubtreeReplacers = SubtreeReplacers::NeverReplace;
/// Proposes replacements level by level, stopping at the first level that yields any.
pub const LEVELED_BEST_EFFORT: SubtreeReplacers = SubtreeReplacers::LeveledBestEffort;
/// Only proposes a replacement for the root.
pub const SINGLE_BEST_EFFORT: SubtreeReplacers = SubtreeReplacers::SingleBestEffort;
/// Proposes replacements for every subtree that is not covered by another proposal.
pub const EXHAUSTIVE_BEST_EFFORT: SubtreeReplacers = SubtreeReplacers::ExhaustiveBestEffort;

/// Gives access to a hypothesis whose transitions may still be open and allows to close them
/// on demand. Closing a transition must not discover a new state, if it does, the analyzer
/// reports [`crate::LearningError::HypothesisModified`].
pub trait PartialTransitionAnalyzer {
    type Alphabet: Alphabet;
    type Output: Color;

    fn hypothesis(&self) -> &AdtHypothesis<Self::Alphabet, Self::Output>;

    fn adt(&self) -> &Adt<<Self::Alphabet as Alphabet>::Symbol, Self::Output>;

    /// Returns `true` if the target of the transition is known.
    fn is_transition_defined(
        &self,
        state: StateId,
        input: <Self::Alphabet as Alphabet>::Symbol,
    ) -> Result<bool>;

    /// Sifts the transition to determine its target.
    fn close_transition(
        &mut self,
        state: StateId,
        input: <Self::Alphabet as Alphabet>::Symbol,
    ) -> Result<()>;
}
