//! Object storage settings for uploaded import files.

use serde::{Deserialize, Serialize};

/// Where uploaded files are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit. Tests and dry runs.
    Memory,
    #[default]
    Local,
    /// Any S3-compatible service (AWS, `MinIO`, R2).
    S3,
}

fn default_local_root() -> String {
    String::from(".strata/objects")
}

fn default_prefix() -> String {
    String::from("imports")
}

const fn default_download_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the `local` backend.
    #[serde(default = "default_local_root")]
    pub local_root: String,

    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub region: String,

    /// Custom endpoint URL for S3-compatible services. Empty means AWS.
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub secret_access_key: String,

    /// Permit plain `http://` endpoints (local `MinIO`).
    #[serde(default)]
    pub allow_http: bool,

    /// Key prefix under which uploaded files are stored.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Lifetime of signed download URLs.
    #[serde(default = "default_download_ttl_secs")]
    pub download_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: default_local_root(),
            bucket: String::new(),
            region: String::new(),
            endpoint: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            allow_http: false,
            prefix: default_prefix(),
            download_ttl_secs: default_download_ttl_secs(),
        }
    }
}

impl StorageConfig {
    /// Check if the S3 settings have the minimum required fields.
    #[must_use]
    pub fn is_s3_configured(&self) -> bool {
        !self.bucket.is_empty()
    }

    /// Region to sign requests for. S3-compatible services often ignore it.
    #[must_use]
    pub fn region_or_default(&self) -> &str {
        if self.region.is_empty() {
            "us-east-1"
        } else {
            &self.region
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_is_local_with_imports_prefix() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, StorageBackend::Local);
        assert_eq!(config.prefix, "imports");
        assert_eq!(config.download_ttl_secs, 3600);
        assert!(!config.is_s3_configured());
    }

    #[test]
    fn region_falls_back_to_us_east_1() {
        let mut config = StorageConfig::default();
        assert_eq!(config.region_or_default(), "us-east-1");
        config.region = "eu-central-1".into();
        assert_eq!(config.region_or_default(), "eu-central-1");
    }
}
