//! Engine error taxonomy.
//!
//! Every failure is scoped to the operation that raised it and carries a
//! reason suitable for showing to the member or admin directly.

use crate::model::TransitionError;
use crate::storage::StorageError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed or missing input, rejected before any state is read.
    #[error("{0}")]
    Validation(String),

    /// Operation attempted outside its allowed state.
    #[error("{0}")]
    Rejected(String),

    /// Eligibility gate failed; every failing check is listed.
    #[error("Not eligible: {}", .0.join("; "))]
    Ineligible(Vec<String>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    pub fn validation(reason: impl Into<String>) -> Self {
        EngineError::Validation(reason.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        EngineError::Rejected(reason.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Reasons to display, one per failing check.
    pub fn reasons(&self) -> Vec<String> {
        match self {
            EngineError::Ineligible(reasons) => reasons.clone(),
            other => vec![other.to_string()],
        }
    }

    /// True for validation and precondition failures, false for storage faults.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, EngineError::Storage(_))
    }
}

impl From<TransitionError> for EngineError {
    fn from(err: TransitionError) -> Self {
        EngineError::Rejected(err.to_string())
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Storage(StorageError::Database(err))
    }
}
