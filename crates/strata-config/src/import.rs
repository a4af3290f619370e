//! Import pipeline limits.

use serde::{Deserialize, Serialize};

/// 100 MiB.
const fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

const fn default_chunk_size() -> usize {
    1000
}

const fn default_parse_workers() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Largest accepted upload, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Rows written per statement batch during a merge.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Parse jobs allowed to run at the same time.
    #[serde(default = "default_parse_workers")]
    pub parse_workers: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            chunk_size: default_chunk_size(),
            parse_workers: default_parse_workers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_correct() {
        let config = ImportConfig::default();
        assert_eq!(config.max_file_size, 104_857_600);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.parse_workers, 2);
    }
}
