//! Status and domain enums for Strata.
//!
//! `ImportStatus` uses `snake_case` serialization and is stored as such in SQL.
//! The domain enums carried inside import files (`Mood`, `WeaponType`) keep the
//! upper-case spelling used by the file format.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// ImportStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one import attempt.
///
/// ```text
/// pending → in_progress → success
///         ↘             ↘ failed
///           failed
/// ```
///
/// `success` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl ImportStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Failed],
            Self::InProgress => &[Self::Success, Self::Failed],
            Self::Success | Self::Failed => &[],
        }
    }

    /// Check whether transitioning to `next` is valid.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Return the string representation used in SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!("unknown import status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Mood
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mood {
    Sadness,
    Sorrow,
    Longing,
    Apathy,
    Calm,
}

impl Mood {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sadness => "SADNESS",
            Self::Sorrow => "SORROW",
            Self::Longing => "LONGING",
            Self::Apathy => "APATHY",
            Self::Calm => "CALM",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SADNESS" => Ok(Self::Sadness),
            "SORROW" => Ok(Self::Sorrow),
            "LONGING" => Ok(Self::Longing),
            "APATHY" => Ok(Self::Apathy),
            "CALM" => Ok(Self::Calm),
            other => Err(CoreError::Validation(format!("unknown mood: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// WeaponType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeaponType {
    Hammer,
    Shotgun,
    Rifle,
}

impl WeaponType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hammer => "HAMMER",
            Self::Shotgun => "SHOTGUN",
            Self::Rifle => "RIFLE",
        }
    }
}

impl fmt::Display for WeaponType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeaponType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HAMMER" => Ok(Self::Hammer),
            "SHOTGUN" => Ok(Self::Shotgun),
            "RIFLE" => Ok(Self::Rifle),
            other => Err(CoreError::Validation(format!("unknown weapon type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ImportStatus::Pending, ImportStatus::InProgress, true)]
    #[case(ImportStatus::Pending, ImportStatus::Failed, true)]
    #[case(ImportStatus::Pending, ImportStatus::Success, false)]
    #[case(ImportStatus::InProgress, ImportStatus::Success, true)]
    #[case(ImportStatus::InProgress, ImportStatus::Failed, true)]
    #[case(ImportStatus::InProgress, ImportStatus::Pending, false)]
    #[case(ImportStatus::Success, ImportStatus::Failed, false)]
    #[case(ImportStatus::Failed, ImportStatus::InProgress, false)]
    fn import_status_transitions(
        #[case] from: ImportStatus,
        #[case] to: ImportStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for status in [ImportStatus::Success, ImportStatus::Failed] {
            assert!(status.is_terminal());
            assert!(status.allowed_next_states().is_empty());
        }
        assert!(!ImportStatus::Pending.is_terminal());
    }

    #[test]
    fn import_status_serializes_like_sql() {
        let json = serde_json::to_string(&ImportStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(
            "in_progress".parse::<ImportStatus>().unwrap(),
            ImportStatus::InProgress
        );
        assert!("IN_PROGRESS".parse::<ImportStatus>().is_err());
    }

    #[test]
    fn domain_enums_use_file_spelling() {
        let mood: Mood = serde_json::from_str("\"LONGING\"").unwrap();
        assert_eq!(mood, Mood::Longing);
        assert_eq!(mood.as_str().parse::<Mood>().unwrap(), Mood::Longing);
        assert!(serde_json::from_str::<WeaponType>("\"rifle\"").is_err());
        assert_eq!(WeaponType::Shotgun.to_string(), "SHOTGUN");
    }
}
