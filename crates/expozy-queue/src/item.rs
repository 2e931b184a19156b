//! The payload carried by every queue item: a job reference plus the
//! attempt number the Worker is about to open.

use expozy_core::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueItem {
    pub job_id: JobId,
    pub attempt_no: i32,
}

impl QueueItem {
    #[must_use]
    pub fn new(job_id: JobId, attempt_no: i32) -> Self {
        Self { job_id, attempt_no }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
