//! Candidate records decoded from import files.
//!
//! Field names follow the camelCase spelling of the file format. Structural
//! checks (types, required keys, enum spellings) come from the JSON Schema
//! generated off these types; [`CandidateRecord::validate`] adds the length and
//! range rules a schema derive cannot express.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{Coordinates, NewCar};
use crate::enums::{Mood, WeaponType};
use crate::errors::CoreError;

/// Longest accepted value for text fields, in characters.
pub const MAX_TEXT_LEN: usize = 255;

/// Reference from a candidate to its car: an existing id or a definition to create.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum CarRef {
    Id(i64),
    Definition(NewCar),
}

/// One item of an import file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    pub coordinates: Coordinates,
    pub real_hero: bool,
    #[serde(default)]
    pub has_toothpick: Option<bool>,
    #[serde(default)]
    pub car: Option<CarRef>,
    pub mood: Mood,
    #[serde(default)]
    pub impact_speed: Option<i32>,
    pub soundtrack_name: String,
    #[serde(default)]
    pub minutes_of_waiting: Option<i32>,
    pub weapon_type: WeaponType,
}

impl CandidateRecord {
    /// Check the constraints not covered by the record schema.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_text("name", &self.name)?;
        check_text("soundtrackName", &self.soundtrack_name)?;
        if !self.coordinates.x.is_finite() {
            return Err(CoreError::invalid_field(
                "coordinates.x",
                "must be a finite number",
            ));
        }
        match &self.car {
            Some(CarRef::Id(id)) if *id <= 0 => {
                Err(CoreError::invalid_field("car", "id must be positive"))
            }
            Some(CarRef::Definition(car)) => car.validate(),
            _ => Ok(()),
        }
    }
}

/// Non-empty and at most [`MAX_TEXT_LEN`] characters.
///
/// # Errors
///
/// Returns [`CoreError::InvalidField`] naming `field`.
pub fn check_text(field: &'static str, value: &str) -> Result<(), CoreError> {
    if value.is_empty() {
        return Err(CoreError::invalid_field(field, "must not be empty"));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(CoreError::invalid_field(
            field,
            format!("must be at most {MAX_TEXT_LEN} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CandidateRecord {
        serde_json::from_value(value).unwrap()
    }

    fn base() -> serde_json::Value {
        json!({
            "name": "Alice",
            "coordinates": {"x": 1.5, "y": 2},
            "realHero": true,
            "mood": "CALM",
            "soundtrackName": "Theme",
            "weaponType": "HAMMER"
        })
    }

    #[test]
    fn optional_fields_default_to_none() {
        let rec = record(base());
        assert_eq!(rec.car, None);
        assert_eq!(rec.has_toothpick, None);
        assert_eq!(rec.impact_speed, None);
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn car_reference_is_id_or_definition() {
        let mut value = base();
        value["car"] = json!(7);
        assert_eq!(record(value.clone()).car, Some(CarRef::Id(7)));

        value["car"] = json!({"name": "Lada", "cool": true});
        assert_eq!(
            record(value).car,
            Some(CarRef::Definition(NewCar {
                name: "Lada".into(),
                cool: Some(true),
            }))
        );
    }

    #[test]
    fn car_definition_rejects_unknown_keys() {
        let mut value = base();
        value["car"] = json!({"name": "Lada", "id": 3});
        assert!(serde_json::from_value::<CandidateRecord>(value).is_err());
    }

    #[test]
    fn validate_rejects_empty_and_long_names() {
        let mut rec = record(base());
        rec.name = String::new();
        assert!(matches!(
            rec.validate(),
            Err(CoreError::InvalidField { field: "name", .. })
        ));

        rec.name = "a".repeat(MAX_TEXT_LEN + 1);
        assert!(rec.validate().is_err());

        rec.name = "ä".repeat(MAX_TEXT_LEN);
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_car_id() {
        let mut rec = record(base());
        rec.car = Some(CarRef::Id(0));
        assert!(rec.validate().is_err());

        rec.car = Some(CarRef::Definition(NewCar {
            name: String::new(),
            cool: None,
        }));
        assert!(matches!(
            rec.validate(),
            Err(CoreError::InvalidField {
                field: "car.name",
                ..
            })
        ));
    }
}
