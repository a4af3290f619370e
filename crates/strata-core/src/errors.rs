//! Cross-cutting error types for Strata.
//!
//! Each crate layers its own error enum on top (`DatabaseError`, `StorageError`,
//! `ImportError`); `anyhow` only appears at the binary edge.

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Lookup by identifier found nothing.
    #[error("{entity_type} #{id} not found")]
    NotFound { entity_type: &'static str, id: String },

    /// Status change rejected by the import state machine.
    #[error("cannot move {entity_type} #{id} from {from} to {to}")]
    InvalidTransition {
        entity_type: &'static str,
        id: String,
        from: String,
        to: String,
    },

    /// A single record field broke a constraint.
    #[error("{field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Free-form validation failure (unknown enum spelling, bad payload).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    pub fn not_found(entity_type: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
