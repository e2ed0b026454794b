//! Error taxonomy for every operation in the reconciliation core.
//!
//! Exactly one variant is reported per failed operation, and a failed
//! operation has no side effect.

use std::fmt::Display;

use crate::EntityKind;

pub type FinanceResult<T> = Result<T, FinanceError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FinanceError {
    /// Caller-correctable input problem. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    /// Illegal lifecycle move.
    #[error("{entity} cannot move from '{from}' to '{to}'")]
    InvalidStateTransition {
        entity: EntityKind,
        from: String,
        to: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    /// Commit-time recheck saw a concurrent mutation.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// Persistence, storage or identity provider failed or timed out.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// The acting principal lacks the role for this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl FinanceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FinanceError::Validation(msg.into())
    }

    pub fn not_found(entity: EntityKind, id: impl Display) -> Self {
        FinanceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn transition(entity: EntityKind, from: impl Display, to: impl Display) -> Self {
        FinanceError::InvalidStateTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        FinanceError::CollaboratorUnavailable(msg.into())
    }

    /// Stable machine-readable code for API bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            FinanceError::Validation(_) => "VALIDATION",
            FinanceError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            FinanceError::NotFound { .. } => "NOT_FOUND",
            FinanceError::Conflict(_) => "CONFLICT",
            FinanceError::CollaboratorUnavailable(_) => "COLLABORATOR_UNAVAILABLE",
            FinanceError::Forbidden(_) => "FORBIDDEN",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, FinanceError::Conflict(_))
    }
}
