//! Schema validation error types.

use strata_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// Requested schema name was not found in the registry.
    #[error("Schema not found: {0}")]
    NotFound(String),

    /// JSON value did not pass schema validation.
    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },

    /// The value matched the schema but could not be decoded into its type.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Decoded record broke a length or range rule.
    #[error(transparent)]
    Constraint(#[from] CoreError),

    /// Schema generation or compilation error.
    #[error("Schema generation error: {0}")]
    Generation(String),
}
