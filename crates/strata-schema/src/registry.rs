//! Registry of compiled JSON Schemas for Strata types.
//!
//! Schemas are generated from strata-core types with [`schemars::schema_for!`]
//! and compiled with `jsonschema` once, at construction. Import parsing
//! validates every decoded item, so recompiling per call is not an option.

use std::collections::HashMap;

use jsonschema::Validator;
use schemars::schema_for;
use serde_json::Value;
use strata_core::records::CandidateRecord;

use crate::error::SchemaError;

/// Name of the schema every import item is checked against.
pub const CANDIDATE_RECORD: &str = "candidate_record";

struct Entry {
    validator: Validator,
}

pub struct SchemaRegistry {
    entries: HashMap<&'static str, Entry>,
}

macro_rules! register {
    ($map:expr, $name:expr, $ty:ty) => {
        let schema = Value::from(schema_for!($ty));
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| SchemaError::Generation(format!("{}: {e}", $name)))?;
        $map.insert($name, Entry { validator });
    };
}

impl SchemaRegistry {
    /// Build and compile every schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Generation`] if a generated schema fails to compile.
    pub fn new() -> Result<Self, SchemaError> {
        let mut entries = HashMap::new();

        register!(entries, CANDIDATE_RECORD, CandidateRecord);

        Ok(Self { entries })
    }

    /// Validate a JSON value against a named schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::NotFound` if the schema name is unknown, or
    /// `SchemaError::ValidationFailed` if validation produces errors.
    fn validate(&self, name: &str, instance: &Value) -> Result<(), SchemaError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| SchemaError::NotFound(name.to_string()))?;

        let errors: Vec<String> = entry
            .validator
            .iter_errors(instance)
            .map(|e| format!("{e}"))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::ValidationFailed { errors })
        }
    }

    /// Full per-item check for import files: schema, decode, then field rules.
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`] means the item must be dropped.
    pub fn candidate(&self, item: Value) -> Result<CandidateRecord, SchemaError> {
        self.validate(CANDIDATE_RECORD, &item)?;
        let record: CandidateRecord = serde_json::from_value(item)?;
        record.validate()?;
        Ok(record)
    }
}
