//! Merge requests and the moderation queue
//!
//! A draft becomes a merge request carrying the raw entries that produced
//! it. Moderators review requests in FIFO order: the preview is computed by
//! applying the entries to a disposable clone of the canonical timetable and
//! diffing the two, room by room. Accepting applies the same entries to the
//! canonical timetable for real.

use crate::inputs::ProposedEntry;
use crate::timetable::Timetable;
use chrono::{DateTime, Local};
use lineup_common::snapshot::{EntryRecord, MergeRequestRecord};
use lineup_common::{Error, Result};
use similar::{ChangeTag, TextDiff};
use std::collections::VecDeque;
use tracing::debug;

/// One pending merge request
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub id: u64,
    pub changes: Vec<ProposedEntry>,
    pub requester_id: i64,
    pub requester_label: String,
    pub created_at: DateTime<Local>,
    pub schedule_start: DateTime<Local>,
    /// Diff shown to the requester at submit time
    pub diff_preview: String,
}

fn entry_to_record(entry: &ProposedEntry) -> EntryRecord {
    EntryRecord {
        room: entry.room.clone(),
        dj: entry.dj.clone(),
        day: entry.day,
        hour: entry.hour,
        minute: entry.minute,
        duration: entry.duration,
    }
}

pub fn entry_from_record(record: EntryRecord) -> ProposedEntry {
    ProposedEntry {
        room: record.room,
        dj: record.dj,
        day: record.day,
        hour: record.hour,
        minute: record.minute,
        duration: record.duration,
    }
}

impl From<&MergeRequest> for MergeRequestRecord {
    fn from(mr: &MergeRequest) -> MergeRequestRecord {
        MergeRequestRecord {
            id: mr.id,
            changes: mr.changes.iter().map(entry_to_record).collect(),
            requester_id: mr.requester_id,
            requester_label: mr.requester_label.clone(),
            created_at: mr.created_at,
            schedule_start: mr.schedule_start,
            diff_preview: mr.diff_preview.clone(),
        }
    }
}

impl From<MergeRequestRecord> for MergeRequest {
    fn from(record: MergeRequestRecord) -> MergeRequest {
        MergeRequest {
            id: record.id,
            changes: record.changes.into_iter().map(entry_from_record).collect(),
            requester_id: record.requester_id,
            requester_label: record.requester_label,
            created_at: record.created_at,
            schedule_start: record.schedule_start,
            diff_preview: record.diff_preview,
        }
    }
}

/// Room-by-room line diff between two timetables.
///
/// Rooms rendering identically are skipped; if every room matches the
/// result is [`Error::NothingToMerge`].
pub fn diff_timetables(base: &Timetable, draft: &Timetable) -> Result<String> {
    let mut res = String::new();
    let mut changed = false;
    for room in base.rooms() {
        let before = base.render_for_diff(room);
        let after = draft.render_for_diff(room);
        if before == after {
            continue;
        }
        changed = true;
        let diff = TextDiff::from_lines(&before, &after);
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "- ",
                ChangeTag::Insert => "+ ",
                ChangeTag::Equal => "",
            };
            res.push_str(sign);
            res.push_str(change.value());
        }
    }
    if !changed {
        return Err(Error::NothingToMerge);
    }
    Ok(res)
}

/// Preview a merge request against the canonical timetable.
///
/// Applies the request's entries to a disposable clone and returns the
/// rendered review text together with the rebased timetable, ready to
/// replace the canonical one if the moderator accepts.
pub fn preview(
    base: &Timetable,
    request: &MergeRequest,
    now: DateTime<Local>,
) -> Result<(String, Timetable)> {
    let mut rebased = base.clone();
    let mut answer = format!(
        "Merge request {} from {} (submitted {})\n\n",
        request.id,
        request.requester_label,
        request.created_at.format("%a %H:%M")
    );
    for entry in &request.changes {
        let evictions = rebased.apply_entry(entry, now)?;
        if !evictions.is_empty() {
            debug!("{}", evictions.trim_end());
        }
    }
    answer.push_str(&diff_timetables(base, &rebased)?);
    Ok((answer, rebased))
}

/// FIFO moderation queue
#[derive(Debug, Default)]
pub struct MergeQueue {
    pending: VecDeque<MergeRequest>,
    next_id: u64,
}

impl MergeQueue {
    pub fn new() -> MergeQueue {
        MergeQueue::default()
    }

    /// Queue a new request, rejecting one whose entries are positionally
    /// identical to an already pending request. Returns the assigned id.
    pub fn submit(
        &mut self,
        changes: Vec<ProposedEntry>,
        requester_id: i64,
        requester_label: String,
        diff_preview: String,
        schedule_start: DateTime<Local>,
        created_at: DateTime<Local>,
    ) -> Result<u64> {
        if self.pending.iter().any(|mr| mr.changes == changes) {
            return Err(Error::DuplicateMergeRequest);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push_back(MergeRequest {
            id,
            changes,
            requester_id,
            requester_label,
            created_at,
            schedule_start,
            diff_preview,
        });
        Ok(id)
    }

    /// Oldest pending request, the only one moderators can act on.
    pub fn head(&self) -> Option<&MergeRequest> {
        self.pending.front()
    }

    pub fn pop_head(&mut self) -> Option<MergeRequest> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergeRequest> {
        self.pending.iter()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Restore queue contents from persisted records.
    pub fn restore(records: Vec<MergeRequestRecord>, next_id: u64) -> MergeQueue {
        let pending: VecDeque<MergeRequest> =
            records.into_iter().map(MergeRequest::from).collect();
        let highest = pending.iter().map(|mr| mr.id + 1).max().unwrap_or(0);
        MergeQueue {
            pending,
            next_id: next_id.max(highest),
        }
    }
}
