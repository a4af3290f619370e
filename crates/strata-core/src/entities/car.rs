use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::records::check_text;

/// Secondary entity referenced by at most one human being per row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Car {
    pub id: i64,
    pub name: String,
    pub cool: Option<bool>,
}

/// A car definition embedded in an import record or passed to `create`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct NewCar {
    pub name: String,
    #[serde(default)]
    pub cool: Option<bool>,
}

impl NewCar {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidField`] when the name is empty or too long.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_text("car.name", &self.name)
    }
}
