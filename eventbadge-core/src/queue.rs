//! Offline Queue - local durable store for undelivered registrations
//!
//! Layout mirrors a key-value store: each key is one JSON file in the
//! queue directory. `pendingRegistrations` holds the append-only list,
//! `pendingRegistration` the most recent unsent payload.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::QueueError;
use crate::hashing::payload_fingerprint;
use crate::record::SubmissionPayload;

pub const PENDING_LIST_KEY: &str = "pendingRegistrations";
pub const PENDING_SLOT_KEY: &str = "pendingRegistration";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    pub id: Uuid,
    #[serde(flatten)]
    pub payload: SubmissionPayload,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fingerprint: String,
}

impl PendingSubmission {
    pub fn new(payload: SubmissionPayload, error: Option<String>) -> Result<Self, QueueError> {
        Ok(Self {
            id: Uuid::new_v4(),
            fingerprint: payload_fingerprint(&payload)?,
            payload,
            timestamp: Utc::now(),
            error,
        })
    }
}

pub struct OfflineQueue {
    dir: PathBuf,
}

impl OfflineQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one entry. Existing entries are rewritten unchanged.
    pub fn append(&self, entry: &PendingSubmission) -> Result<(), QueueError> {
        let mut entries: Vec<PendingSubmission> = self.read_key(PENDING_LIST_KEY)?.unwrap_or_default();
        entries.push(entry.clone());
        self.write_key(PENDING_LIST_KEY, &entries)?;
        debug!(id = %entry.id, len = entries.len(), "pending submission appended");
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<PendingSubmission>, QueueError> {
        Ok(self.read_key(PENDING_LIST_KEY)?.unwrap_or_default())
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    /// Replace the single-slot copy of the latest unsent payload.
    pub fn set_latest(&self, payload: &SubmissionPayload) -> Result<(), QueueError> {
        self.write_key(PENDING_SLOT_KEY, payload)
    }

    pub fn latest(&self) -> Result<Option<SubmissionPayload>, QueueError> {
        self.read_key(PENDING_SLOT_KEY)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn read_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, QueueError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write through a temp file so a crash never leaves a half-written key.
    fn write_key<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), QueueError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.key_path(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
