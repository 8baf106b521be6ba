use thiserror::Error;

/// Abstracts the types of errors that can occur while learning.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum LearningError {
    /// A caller supplied an argument that can not be processed, for example an empty
    /// counterexample or a symbol that is not part of the alphabet.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The system under learning answered the same input with two different outputs.
    #[error("system under learning is not deterministic: on `{input}` expected `{expected}` but observed `{observed}`")]
    NonDeterministicSul {
        input: String,
        expected: String,
        observed: String,
    },
    /// Closing a transition during partial transition analysis discovered a new state.
    #[error("hypothesis was modified while analyzing partial transitions")]
    HypothesisModified,
    /// An internal invariant does not hold.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

/// Shorthand for results whose error is a [`LearningError`].
pub type Result<T> = std::result::Result<T, LearningError>;

impl LearningError {
    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
