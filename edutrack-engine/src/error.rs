//! Error types for the engine.

use thiserror::Error;

use crate::storage;
use crate::types::LearnerId;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by [`ProgressEngine`](crate::ProgressEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input was rejected before any computation; nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A collaborator read or write failed.
    #[error("dependency unavailable during {operation}: {source}")]
    DependencyUnavailable {
        operation: &'static str,
        #[source]
        source: storage::Error,
    },

    /// The additive ledger delta could not be applied after retrying.
    #[error("ledger update for {learner_id} failed after {attempts} attempts: {source}")]
    PartialLedgerUpdate {
        learner_id: LearnerId,
        attempts: u32,
        #[source]
        source: storage::Error,
    },
}

impl EngineError {
    pub(crate) fn dependency(operation: &'static str) -> impl FnOnce(storage::Error) -> Self {
        move |source| Self::DependencyUnavailable { operation, source }
    }

    /// Whether the caller may retry the whole operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::DependencyUnavailable { .. } | Self::PartialLedgerUpdate { .. } => true,
        }
    }
}

/// A violated input constraint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("learner id is missing")]
    MissingLearnerId,

    #[error("assessment has zero questions")]
    ZeroQuestions,

    #[error("allowed duration must be positive")]
    NonPositiveDuration,

    #[error("{answered} answers submitted for {total} questions")]
    TooManyAnswers { answered: usize, total: u32 },

    #[error("question index {index} is out of range for {total} questions")]
    QuestionIndexOutOfRange { index: u32, total: u32 },

    #[error("question index {0} answered more than once")]
    DuplicateQuestionIndex(u32),

    #[error("watch fraction {0} is outside 0.0..=1.0")]
    FractionOutOfRange(f64),

    #[error("video id is missing")]
    MissingVideoId,
}
