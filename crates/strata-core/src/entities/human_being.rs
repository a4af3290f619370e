use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{Mood, WeaponType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Coordinates {
    pub x: f64,
    pub y: i32,
}

/// The versioned entity. `name` is the natural key, unique among rows whose
/// `next_version_id` is null.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct HumanBeing {
    pub id: i64,
    pub name: String,
    pub coordinates: Coordinates,
    pub creation_date: DateTime<Utc>,
    pub real_hero: bool,
    pub has_toothpick: Option<bool>,
    pub car_id: Option<i64>,
    pub mood: Mood,
    pub impact_speed: Option<i32>,
    pub soundtrack_name: String,
    pub minutes_of_waiting: Option<i32>,
    pub weapon_type: WeaponType,
    pub version: u32,
    pub next_version_id: Option<i64>,
    pub version_root_id: Option<i64>,
}

impl HumanBeing {
    /// Identifier of the first node of this entity's chain.
    #[must_use]
    pub fn chain_root(&self) -> i64 {
        self.version_root_id.unwrap_or(self.id)
    }

    #[must_use]
    pub const fn is_current(&self) -> bool {
        self.next_version_id.is_none()
    }
}
