//! Core building blocks for active learning of Mealy machines.
//!
//! The crate provides [`alphabet::Alphabet`]s (which may grow while learning is in progress),
//! immutable finite [`word::Word`]s, the [`mealy::Mealy`] trait that abstracts over everything
//! that behaves like a deterministic Mealy machine and a concrete [`mealy::MealyMachine`]
//! which is used to describe systems under learning as well as learned models.
#![deny(rustdoc::broken_intra_doc_links)]

use std::{fmt::Debug, hash::Hash};

/// Type aliases for the collections used throughout the workspace.
pub mod math;

mod show;
pub use show::{show_duration, Show};

/// Symbols, alphabets and growing alphabets.
pub mod alphabet;
pub use alphabet::Alphabet;

/// Immutable finite words.
pub mod word;
pub use word::Word;

/// Mealy machines, both as a trait and as a concrete data structure.
pub mod mealy;
pub use mealy::{Mealy, MealyMachine};

/// Generation of random Mealy machines, gated behind the `random` feature.
#[cfg(feature = "random")]
pub mod random;

/// The default type used for indexing states.
pub type DefaultIdType = u32;

/// A color is simply a type that can be used as the output of a transition. Outputs are only
/// ever compared by value, so we only require them to be cloneable, comparable and hashable.
pub trait Color: Clone + Eq + Hash + Debug {}

impl<T: Eq + Clone + Hash + Debug> Color for T {}

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use automata_core::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        alphabet,
        alphabet::{Alphabet, CharAlphabet, GrowingAlphabet, SimpleAlphabet, Symbol},
        math,
        mealy::{Mealy, MealyBuilder, MealyMachine, StateIndex, SymbolOf},
        show_duration,
        word::Word,
        Color, DefaultIdType, Show,
    };
}
