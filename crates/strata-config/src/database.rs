//! Local libSQL database settings.

use serde::{Deserialize, Serialize};

fn default_path() -> String {
    String::from(".strata/strata.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database file, or `:memory:` for a throwaway in-process database.
    #[serde(default = "default_path")]
    pub path: String,

    /// How long a connection waits on a held write lock before reporting busy.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_correct() {
        let config = DatabaseConfig::default();
        assert_eq!(config.path, ".strata/strata.db");
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(!config.is_in_memory());
    }
}
