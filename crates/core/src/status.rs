//! The status record shared between the front-end and the worker.
//!
//! The record is a JSON object with exactly two fields:
//!
//! ```json
//! {"done": false, "resultPath": ""}
//! ```
//!
//! The front-end writes the pending form once during staging; the worker
//! overwrites it with `{"done": true, "resultPath": "<path>"}` when the
//! reconstruction is finished. Both fields are required: a missing field
//! is a decode failure, as is a completed record with an empty path.

use serde::{Deserialize, Serialize};

/// Default name of the status file inside the staging directory.
pub const STATUS_FILE_NAME: &str = "status.json";

/// Extension the watcher filters change notifications by.
pub const STATUS_FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub done: bool,
    pub result_path: String,
}

/// Why a status file's contents could not be decoded.
///
/// These are expected while the worker is mid-write and are never
/// surfaced to the caller as job failures.
#[derive(Debug, thiserror::Error)]
pub enum StatusDecodeError {
    #[error("malformed status record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("status record is done but has an empty resultPath")]
    EmptyResultPath,
}

impl StatusRecord {
    /// The record written before the worker starts.
    pub fn pending() -> Self {
        Self {
            done: false,
            result_path: String::new(),
        }
    }

    /// The record a worker writes on success.
    pub fn completed(result_path: impl Into<String>) -> Self {
        Self {
            done: true,
            result_path: result_path.into(),
        }
    }

    /// Decode a status file's raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, StatusDecodeError> {
        let record: StatusRecord = serde_json::from_slice(bytes)?;
        if record.done && record.result_path.is_empty() {
            return Err(StatusDecodeError::EmptyResultPath);
        }
        Ok(record)
    }

    pub fn encode(&self) -> Vec<u8> {
        // A struct of a bool and a String always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
