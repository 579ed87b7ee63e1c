//! Versioned persistence schema
//!
//! The snapshot is an explicit set of DTOs, decoupled from the in-memory
//! types, so internal refactors cannot silently break persisted data. The
//! `version` field is checked on decode; unknown versions are rejected and
//! the caller falls back to the config-declared schedule.

use crate::{Error, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// One scheduled slot, absolute times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub dj: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub room: String,
    #[serde(default)]
    pub tags: Vec<(String, String)>,
}

/// One proposed schedule entry, relative to the schedule start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub room: String,
    pub dj: String,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub duration: u32,
}

/// A user's private draft: its materialized slots plus the raw entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecord {
    pub user_id: i64,
    pub slots: Vec<SlotRecord>,
    pub changes: Vec<EntryRecord>,
}

/// A pending merge request in the moderation queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequestRecord {
    pub id: u64,
    pub changes: Vec<EntryRecord>,
    pub requester_id: i64,
    pub requester_label: String,
    pub created_at: DateTime<Local>,
    pub schedule_start: DateTime<Local>,
    pub diff_preview: String,
}

/// Per-user registry state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub notifications: bool,
    pub deleted: bool,
    pub new_user: bool,
}

/// Full process snapshot: canonical timetable, drafts, merge queue, users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub canonical: Vec<SlotRecord>,
    pub drafts: Vec<DraftRecord>,
    pub merge_requests: Vec<MergeRequestRecord>,
    pub users: Vec<UserRecord>,
    pub next_merge_id: u64,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            canonical: Vec::new(),
            drafts: Vec::new(),
            merge_requests: Vec::new(),
            users: Vec::new(),
            next_merge_id: 0,
        }
    }

    /// Serialize to the storage blob format.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Snapshot(e.to_string()))
    }

    /// Decode a storage blob, rejecting unknown schema versions.
    pub fn decode(blob: &str) -> Result<Snapshot> {
        let snapshot: Snapshot =
            serde_json::from_str(blob).map_err(|e| Error::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// True when neither the canonical timetable nor any draft holds a slot.
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty() && self.drafts.iter().all(|d| d.slots.is_empty())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}
