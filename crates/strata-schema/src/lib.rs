//! # strata-schema
//!
//! JSON Schema generation and validation for Strata.
//!
//! Types are defined in `strata-core` with `#[derive(JsonSchema)]`. The
//! [`SchemaRegistry`] compiles their schemas once and validates decoded import
//! items before they are turned into candidate records.

mod error;
mod registry;

pub use error::SchemaError;
pub use registry::{CANDIDATE_RECORD, SchemaRegistry};
