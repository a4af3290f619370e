use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::ImportStatus;

/// Durable record of one upload attempt. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ImportOperation {
    pub id: String,
    /// Generated, collision-resistant object name of the uploaded file.
    pub file_name: String,
    /// Hex SHA-256 of the uploaded bytes.
    pub file_hash: String,
    pub status: ImportStatus,
    pub entry_count: Option<u64>,
    pub ok_count: Option<u64>,
    pub duplicate_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}
