//! Sparse import progress payload broadcast to live subscribers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::ImportOperation;
use crate::enums::ImportStatus;

/// A partial [`ImportOperation`] keyed by id. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportOperationUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ImportStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ImportOperationUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Every field of `op`, used when a record is first created.
    #[must_use]
    pub fn snapshot(op: &ImportOperation) -> Self {
        Self {
            id: op.id.clone(),
            status: Some(op.status),
            created_at: Some(op.created_at),
            started_at: op.started_at,
            finished_at: op.finished_at,
            ok_count: op.ok_count,
            duplicate_count: op.duplicate_count,
            entry_count: op.entry_count,
            error_message: op.error_message.clone(),
        }
    }

    /// Merge into a cached copy of the operation. Updates for another id are ignored.
    pub fn apply_to(&self, op: &mut ImportOperation) {
        if op.id != self.id {
            return;
        }
        if let Some(status) = self.status {
            op.status = status;
        }
        if let Some(at) = self.created_at {
            op.created_at = at;
        }
        if self.started_at.is_some() {
            op.started_at = self.started_at;
        }
        if self.finished_at.is_some() {
            op.finished_at = self.finished_at;
        }
        if self.ok_count.is_some() {
            op.ok_count = self.ok_count;
        }
        if self.duplicate_count.is_some() {
            op.duplicate_count = self.duplicate_count;
        }
        if self.entry_count.is_some() {
            op.entry_count = self.entry_count;
        }
        if self.error_message.is_some() {
            op.error_message.clone_from(&self.error_message);
        }
    }
}
