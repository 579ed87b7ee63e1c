//! Command dispatcher
//!
//! All bot state lives behind one mutex: the canonical timetable, per-user
//! sessions (dialog state plus optional draft), the moderation queue, the
//! user registry and the rolling log. A command locks, mutates, builds the
//! replies, then releases the lock; snapshot persistence happens in a
//! spawned task after the lock is gone. Side messages (moderator pings,
//! requester notifications, log streaming) go through the outbound channel.

use crate::inputs::{
    DialogEvent, DialogMachine, DialogState, ProposedEntry, INPUT_COMMAND, LOG_COMMAND,
    MERGE_COMMAND, REBASE_COMMAND,
};
use crate::merge::{self, MergeQueue};
use crate::timetable::Timetable;
use crate::fuzzy;
use crate::users::UserRegistry;
use chrono::{DateTime, Local};
use lineup_common::config::Config;
use lineup_common::snapshot::{DraftRecord, MergeRequestRecord, SlotRecord, Snapshot};
use lineup_common::storage::Storage;
use lineup_common::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Telegram-imposed ceiling on a single message, in bytes
pub const MAX_MESSAGE_SIZE: usize = 4096;

const NOTHING_TO_MERGE_MESSAGE: &str =
    "You have nothing to merge, please use the /input command first";
const MODIFIED_LINEUP_MESSAGE: &str = "\n\n⚠️ You are viewing a modified version of the lineup, \
please use the /merge command to share your changes with others or /input to add more changes ⚠️\n";
const NO_PENDING_REBASE_MESSAGE: &str = "No merge requests to rebase.";
const STOP_NOTIFICATIONS_BUTTON: &str = "🔴";
const START_NOTIFICATIONS_BUTTON: &str = "🟢";
const STOPPED_NOTIFICATIONS_MESSAGE: &str = "You stopped DJ changes notifications";
const STARTED_NOTIFICATIONS_MESSAGE: &str = "You enabled DJ changes notifications";
const NO_MOTD_MESSAGE: &str = "No help available";

/// One message headed for a chat surface
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub user_id: i64,
    pub text: String,
    /// `None` leaves the user's keyboard alone
    pub buttons: Option<Vec<String>>,
    pub is_html: bool,
}

/// Whether applying entries spawned a fresh draft or grew an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftOutcome {
    Created,
    Mutated,
}

/// Everything the bot knows about one user
#[derive(Debug, Default)]
struct UserSession {
    dialog: DialogState,
    draft: Option<Timetable>,
}

struct BotState {
    canonical: Timetable,
    sessions: HashMap<i64, UserSession>,
    queue: MergeQueue,
    users: UserRegistry,
    logs: String,
    max_live_users: usize,
}

pub struct Dispatcher {
    config: Config,
    machine: DialogMachine,
    state: Mutex<BotState>,
    outbound: UnboundedSender<OutboundMessage>,
    storage: Arc<dyn Storage>,
}

impl Dispatcher {
    /// Build the dispatcher, restoring a snapshot from storage when the
    /// config allows it and one exists for this schedule.
    pub async fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        outbound: UnboundedSender<OutboundMessage>,
        now: DateTime<Local>,
    ) -> Result<Dispatcher> {
        let canonical = Timetable::from_config(&config, now);
        let machine = DialogMachine::new(
            canonical.day_labels(config.nb_days_for_input),
            config.lineup.rooms.clone(),
        );
        let mut state = BotState {
            canonical,
            sessions: HashMap::new(),
            queue: MergeQueue::new(),
            users: UserRegistry::new(),
            logs: String::new(),
            max_live_users: 0,
        };

        let mut restored = false;
        if config.restore_from_storage {
            match storage.load_snapshot(config.schedule_id()).await {
                Ok(Some(blob)) => match Snapshot::decode(&blob) {
                    Ok(snapshot) if !snapshot.is_empty() => {
                        restore_state(&mut state, snapshot, now);
                        restored = true;
                        info!("restored snapshot from storage");
                    }
                    Ok(_) => warn!("snapshot holds no slots, using config"),
                    Err(e) => warn!("cannot decode snapshot, using config: {e}"),
                },
                Ok(None) => info!("no snapshot in storage, using config"),
                Err(e) => warn!("cannot load snapshot, using config: {e}"),
            }
        }
        match storage.load_log().await {
            Ok(Some(logs)) => state.logs = logs,
            Ok(None) => {}
            Err(e) => warn!("cannot load log: {e}"),
        }

        let dispatcher = Dispatcher {
            config,
            machine,
            state: Mutex::new(state),
            outbound,
            storage,
        };
        if !restored {
            // Best effort, like every other save: in-memory state stays
            // authoritative even when storage is down at startup.
            let state = dispatcher.state.lock().await;
            match snapshot_of(&state).encode() {
                Ok(blob) => {
                    if let Err(e) = dispatcher
                        .storage
                        .save_snapshot(dispatcher.config.schedule_id(), &blob)
                        .await
                    {
                        error!("initial snapshot save failed: {e}");
                    }
                }
                Err(e) => error!("snapshot encode failed: {e}"),
            }
        }
        Ok(dispatcher)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.config.admins.contains(&user_id)
    }

    pub fn is_moderator(&self, user_id: i64) -> bool {
        self.config.moderators.contains(&user_id)
    }

    /// Process one inbound message and return the direct replies.
    pub async fn process_command(
        &self,
        user_id: i64,
        text: &str,
        label: &str,
    ) -> Vec<OutboundMessage> {
        let now = Local::now();
        self.process_command_at(user_id, text, label, now).await
    }

    /// Same as [`Dispatcher::process_command`] with an explicit clock.
    pub async fn process_command_at(
        &self,
        user_id: i64,
        text: &str,
        label: &str,
        now: DateTime<Local>,
    ) -> Vec<OutboundMessage> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mut messages = Vec::new();

        if state.users.ensure_exists(user_id) {
            info!("new user {user_id}");
            if !self.config.motd.is_empty() {
                messages.push(OutboundMessage {
                    user_id,
                    text: self.config.motd.clone(),
                    buttons: None,
                    is_html: true,
                });
            }
        }
        self.log_inbound(state, user_id, text, label, now);

        let (command, arg) = parse_command(state, user_id, text);
        debug!("{label} sent <{text}> command <{command}> arg <{arg}>");

        let mut answer = String::new();
        let mut buttons: Option<Vec<String>> = None;
        let mut html = false;
        let mut dirty = false;

        match command.as_str() {
            "start" => {
                state.users.set_new(user_id, true);
                dirty = true;
                answer = view_of(state, user_id).render_current(now);
            }
            "help" => {
                if self.config.motd.is_empty() {
                    answer = NO_MOTD_MESSAGE.to_string();
                } else {
                    answer = format!("{}\n\n", self.config.motd);
                    html = true;
                }
            }
            "stop" | STOP_NOTIFICATIONS_BUTTON => {
                state.users.set_notifications(user_id, false);
                dirty = true;
                answer = STOPPED_NOTIFICATIONS_MESSAGE.to_string();
            }
            START_NOTIFICATIONS_BUTTON => {
                state.users.set_notifications(user_id, true);
                dirty = true;
                answer = STARTED_NOTIFICATIONS_MESSAGE.to_string();
            }
            "p" | "all" => {
                answer = view_of(state, user_id).render_full(
                    &self.config.meta.you_are_here,
                    None,
                    now,
                );
            }
            "now" => answer = view_of(state, user_id).render_current(now),
            "t" => {
                let arg = arg.trim();
                answer = if arg.is_empty() {
                    view_of(state, user_id).render_current(now)
                } else {
                    view_of(state, user_id).render_current_at(Some(arg), now)
                };
            }
            "events" if self.is_admin(user_id) => {
                answer = view_of(state, user_id).dump_events();
            }
            "print" if self.is_admin(user_id) => {
                answer = print_all_rooms(&state.canonical);
            }
            "dump" if self.is_admin(user_id) => {
                answer = view_of(state, user_id).dump();
            }
            "hole" if self.is_admin(user_id) => {
                answer = view_of(state, user_id).holes();
            }
            REBASE_COMMAND if self.is_moderator(user_id) => {
                dirty = self.rebase_command(
                    state, user_id, text, label, now, &mut answer, &mut buttons, &mut html,
                );
            }
            MERGE_COMMAND if self.config.allow_input || self.is_admin(user_id) => {
                self.merge_command(
                    state, user_id, text, label, now, &mut answer, &mut buttons, &mut html,
                );
                dirty = true;
            }
            INPUT_COMMAND if self.config.allow_input || self.is_admin(user_id) => {
                self.input_command(state, user_id, text, now, &mut answer, &mut buttons);
                dirty = true;
            }
            LOG_COMMAND if self.is_admin(user_id) => {
                let mut session = state.sessions.remove(&user_id).unwrap_or_default();
                let active = session.dialog.is_active();
                if !active {
                    answer.push_str(&state.logs);
                }
                let reply = self
                    .machine
                    .handle(&mut session.dialog, if active { text } else { LOG_COMMAND });
                answer.push_str(&reply.message);
                buttons = reply.buttons;
                let (new, total, deleted, notifications) = state.users.stats();
                answer.push_str(&format!(
                    "\nTotalUsers: {total} new:{new} deleted:{deleted} notifs:{notifications}"
                ));
                state.sessions.insert(user_id, session);
            }
            _ => answer = self.default_command(state, user_id, text, now),
        }

        if buttons.is_none() {
            buttons = Some(self.buttons_for(state, user_id));
        }
        let session = state.sessions.get(&user_id);
        let in_dialog = session.map(|s| s.dialog.is_active()).unwrap_or(false);
        let has_draft = session.map(|s| s.draft.is_some()).unwrap_or(false);
        if has_draft && !in_dialog {
            answer.push_str(MODIFIED_LINEUP_MESSAGE);
        }

        if answer.is_empty() || answer == "\n" {
            warn!("skipped empty reply to {user_id}");
        } else {
            messages.push(OutboundMessage {
                user_id,
                text: answer,
                buttons,
                is_html: html,
            });
        }

        if dirty {
            self.spawn_save(state);
        }
        drop(guard);
        split_outbound(messages)
    }

    fn input_command(
        &self,
        state: &mut BotState,
        user_id: i64,
        text: &str,
        now: DateTime<Local>,
        answer: &mut String,
        buttons: &mut Option<Vec<String>>,
    ) {
        let mut session = state.sessions.remove(&user_id).unwrap_or_default();
        let input = if session.dialog.is_active() { text } else { INPUT_COMMAND };
        let reply = self.machine.handle(&mut session.dialog, input);
        *answer = reply.message.clone();
        *buttons = reply.buttons.clone();
        if !reply.entries.is_empty() {
            let (report, outcome) =
                apply_entries(&state.canonical, &mut session, &reply.entries, now);
            if outcome == DraftOutcome::Created {
                debug!("created draft lineup for user {user_id}");
            }
            if !report.is_empty() {
                self.broadcast_admins_locked(state, report.trim_end());
            }
        }
        state.sessions.insert(user_id, session);
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_command(
        &self,
        state: &mut BotState,
        user_id: i64,
        text: &str,
        label: &str,
        now: DateTime<Local>,
        answer: &mut String,
        buttons: &mut Option<Vec<String>>,
        html: &mut bool,
    ) {
        let mut session = state.sessions.remove(&user_id).unwrap_or_default();
        if !session.dialog.is_active() {
            match &session.draft {
                Some(draft) => {
                    match merge::diff_timetables(&state.canonical, draft) {
                        Ok(diff) => {
                            *html = true;
                            answer.push_str(&diff);
                        }
                        Err(e) => debug!("merge preview: {e}"),
                    }
                    let reply = self.machine.handle(&mut session.dialog, MERGE_COMMAND);
                    answer.push_str(&reply.message);
                    *buttons = reply.buttons;
                }
                None => *answer = NOTHING_TO_MERGE_MESSAGE.to_string(),
            }
            state.sessions.insert(user_id, session);
            return;
        }

        let reply = self.machine.handle(&mut session.dialog, text);
        *answer = reply.message.clone();
        *buttons = reply.buttons.clone();
        match reply.event {
            Some(DialogEvent::Submitted) => match session.draft.take() {
                Some(draft) => match self.submit_draft(state, user_id, label, &draft, now) {
                    Ok(id) => answer.push_str(&format!(" (#{id})")),
                    Err(e) => {
                        // Draft survives a rejected submission.
                        session.draft = Some(draft);
                        *answer = e.to_string();
                    }
                },
                None => *answer = NOTHING_TO_MERGE_MESSAGE.to_string(),
            },
            Some(DialogEvent::DraftDeleted) => session.draft = None,
            _ => {}
        }
        state.sessions.insert(user_id, session);
    }

    fn submit_draft(
        &self,
        state: &mut BotState,
        user_id: i64,
        label: &str,
        draft: &Timetable,
        now: DateTime<Local>,
    ) -> Result<u64> {
        let diff = merge::diff_timetables(&state.canonical, draft)?;
        let id = state.queue.submit(
            draft.changes.clone(),
            user_id,
            label.to_string(),
            diff.clone(),
            state.canonical.schedule_start(),
            now,
        )?;
        self.broadcast_moderators_locked(
            state,
            &format!("new merge request #{id} from {label}, use /rebase command to merge\n{diff}"),
        );
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn rebase_command(
        &self,
        state: &mut BotState,
        user_id: i64,
        text: &str,
        label: &str,
        now: DateTime<Local>,
        answer: &mut String,
        buttons: &mut Option<Vec<String>>,
        html: &mut bool,
    ) -> bool {
        if state.queue.is_empty() {
            // Another moderator may have drained the queue while this one
            // was still reviewing; drop the stale dialog.
            if let Some(session) = state.sessions.get_mut(&user_id) {
                session.dialog = DialogState::default();
            }
            *answer = NO_PENDING_REBASE_MESSAGE.to_string();
            return false;
        }
        let mut session = state.sessions.remove(&user_id).unwrap_or_default();
        let mut dirty = false;
        if !session.dialog.is_active() {
            if let Some(head) = state.queue.head() {
                match merge::preview(&state.canonical, head, now) {
                    Ok((preview, _)) => {
                        *html = true;
                        answer.push_str(&preview);
                    }
                    Err(e) => {
                        error!("merge request preview: {e}");
                        answer.push_str(&e.to_string());
                    }
                }
            }
            let reply = self.machine.handle(&mut session.dialog, REBASE_COMMAND);
            answer.push_str(&reply.message);
            *buttons = reply.buttons;
        } else {
            let reply = self.machine.handle(&mut session.dialog, text);
            *answer = reply.message.clone();
            *buttons = reply.buttons.clone();
            match reply.event {
                Some(DialogEvent::RebaseAccepted) => {
                    if let Some(request) = state.queue.pop_head() {
                        let report = apply_to_canonical(&mut state.canonical, &request.changes, now);
                        if !report.is_empty() {
                            self.broadcast_admins_locked(state, report.trim_end());
                        }
                        self.send(
                            state,
                            request.requester_id,
                            format!(
                                "✅ Your merge request #{} has been accepted by {label}, thanks!",
                                request.id
                            ),
                        );
                    }
                    dirty = true;
                }
                Some(DialogEvent::RebaseRefused) => {
                    if let Some(request) = state.queue.pop_head() {
                        self.send(
                            state,
                            request.requester_id,
                            format!(
                                "💔 Your merge request #{} has been refused by {label}.",
                                request.id
                            ),
                        );
                    }
                    dirty = true;
                }
                _ => {}
            }
            if dirty {
                if state.queue.is_empty() {
                    answer.push_str(" (No more merge request pending)");
                } else {
                    answer.push_str(&format!(
                        " (Remaining merge requests: {})",
                        state.queue.len()
                    ));
                }
            }
        }
        state.sessions.insert(user_id, session);
        dirty
    }

    /// Free-text fallback: fuzzy room lookup first, then DJ search.
    fn default_command(
        &self,
        state: &mut BotState,
        user_id: i64,
        text: &str,
        now: DateTime<Local>,
    ) -> String {
        if text.is_empty() {
            warn!("empty free-text message from {user_id}");
            return String::new();
        }
        let distance = if text.starts_with('/') {
            fuzzy::ROOM_DISTANCE_MAX_SLASH
        } else {
            fuzzy::ROOM_DISTANCE_MAX
        };
        let view = view_of(state, user_id);
        match view.find_room(text, distance) {
            Some((_, room)) => {
                let room = room.to_string();
                view.render_full(&self.config.meta.you_are_here, Some(&room), now)
            }
            None => view.find_dj(text, now),
        }
    }

    fn buttons_for(&self, state: &BotState, user_id: i64) -> Vec<String> {
        if let Some(session) = state.sessions.get(&user_id) {
            if session.dialog.is_active() {
                return Vec::new();
            }
        }
        let mut buttons = self.config.buttons.clone();
        if state.users.has_notifications(user_id) {
            buttons.push(STOP_NOTIFICATIONS_BUTTON.to_string());
        } else {
            buttons.push(START_NOTIFICATIONS_BUTTON.to_string());
        }
        if state
            .sessions
            .get(&user_id)
            .map(|s| s.draft.is_some())
            .unwrap_or(false)
        {
            buttons.push(MERGE_COMMAND.to_string());
        }
        if self.is_moderator(user_id) && !state.queue.is_empty() {
            buttons.push(REBASE_COMMAND.to_string());
        }
        if self.is_admin(user_id) {
            buttons.push(LOG_COMMAND.to_string());
        }
        buttons
    }

    /// Append an inbound command to the rolling log, persist it and stream
    /// it to admins who are watching. Admin traffic is not logged.
    fn log_inbound(
        &self,
        state: &mut BotState,
        user_id: i64,
        text: &str,
        label: &str,
        now: DateTime<Local>,
    ) {
        if self.is_admin(user_id) {
            return;
        }
        let line = format!("{} {label} <{text}>\n", now.format("%a %H:%M"));
        state.logs = trim_log(&format!("{}{line}", state.logs));
        let storage = Arc::clone(&self.storage);
        let logs = state.logs.clone();
        tokio::spawn(async move {
            if let Err(e) = storage.save_log(&logs).await {
                error!("log save failed: {e}");
            }
        });
        for admin in &self.config.admins {
            let watching = state
                .sessions
                .get(admin)
                .map(|s| s.dialog.is_streaming_logs())
                .unwrap_or(false);
            if watching {
                self.send(state, *admin, line.clone());
            }
        }
    }

    fn send(&self, state: &BotState, user_id: i64, text: String) {
        let message = OutboundMessage {
            user_id,
            buttons: Some(self.buttons_for(state, user_id)),
            text,
            is_html: false,
        };
        for part in split_outbound(vec![message]) {
            if self.outbound.send(part).is_err() {
                warn!("outbound channel closed");
            }
        }
    }

    fn broadcast_admins_locked(&self, state: &BotState, text: &str) {
        let message = format!("#admin {text}");
        info!("{message}");
        for admin in &self.config.admins {
            self.send(state, *admin, message.clone());
        }
    }

    fn broadcast_moderators_locked(&self, state: &BotState, text: &str) {
        let message = format!("#modo {text}");
        info!("{message}");
        for moderator in &self.config.moderators {
            self.send(state, *moderator, message.clone());
        }
    }

    /// Announce set starts that are due and track the active-user high
    /// water mark. Runs from the periodic sweep task.
    pub async fn sweep(&self, now: DateTime<Local>) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let (new_users, total, _, _) = state.users.stats();
        if total > state.max_live_users {
            state.max_live_users = total;
            self.broadcast_admins_locked(
                state,
                &format!("New max active users: {total} new users: {new_users}"),
            );
        }

        let announcements = state.canonical.advance_event_clock(now);
        if announcements.is_empty() {
            return;
        }
        let targets = state.users.with_notifications();
        info!("sending events to {} users", targets.len());
        for target in targets {
            // Negative ids are group chats, which never get notifications.
            if target > 0 {
                self.send(state, target, announcements.clone());
            }
        }
    }

    /// Mark a user gone after the chat surface reported a failed delivery.
    pub async fn mark_user_gone(&self, user_id: i64) {
        let mut guard = self.state.lock().await;
        guard.users.mark_deleted(user_id);
        self.spawn_save(&guard);
    }

    /// Canonical slots for the read API.
    pub async fn canonical_slots(&self) -> Vec<SlotRecord> {
        let guard = self.state.lock().await;
        guard.canonical.slots().iter().map(SlotRecord::from).collect()
    }

    /// Turn a lineup posted on the write API into a merge request, exactly
    /// like a conversational submission. Returns the assigned id.
    pub async fn submit_api_lineup(
        &self,
        lineup: lineup_common::config::LineupConfig,
        client: &str,
    ) -> Result<u64> {
        let now = Local::now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let changes: Vec<ProposedEntry> = lineup
            .sets
            .iter()
            .flat_map(|(room, sets)| {
                sets.iter().map(move |set| ProposedEntry {
                    room: room.clone(),
                    dj: set.dj.clone(),
                    day: set.day,
                    hour: set.hour,
                    minute: set.minute,
                    duration: set.duration,
                })
            })
            .collect();
        // Validate against a disposable clone before queueing.
        let mut rebased = state.canonical.clone();
        for entry in &changes {
            rebased.apply_entry(entry, now)?;
        }
        let diff = merge::diff_timetables(&state.canonical, &rebased)?;
        let id = state.queue.submit(
            changes,
            0,
            format!("api ({client})"),
            diff.clone(),
            state.canonical.schedule_start(),
            now,
        )?;
        self.broadcast_moderators_locked(
            state,
            &format!("new merge request #{id} from api, use /rebase command to merge\n{diff}"),
        );
        self.spawn_save(state);
        Ok(id)
    }

    /// Stream an anonymous API hit to admins who are watching the log.
    pub async fn log_api_hit(&self, user_agent: &str, client: &str) {
        let guard = self.state.lock().await;
        let line = format!("{} {client} <{user_agent}>\n", Local::now().format("%a %H:%M"));
        for admin in &self.config.admins {
            let watching = guard
                .sessions
                .get(admin)
                .map(|s| s.dialog.is_streaming_logs())
                .unwrap_or(false);
            if watching {
                self.send(&guard, *admin, line.clone());
            }
        }
    }

    /// Admin broadcast from the message API.
    pub async fn broadcast_message(&self, text: &str) {
        let guard = self.state.lock().await;
        self.broadcast_admins_locked(&guard, text);
    }

    /// Per-room lineup text used by `--check` runs and the admin `print`
    /// command.
    pub async fn lineup_report(&self) -> String {
        let guard = self.state.lock().await;
        print_all_rooms(&guard.canonical)
    }

    fn spawn_save(&self, state: &BotState) {
        let blob = match snapshot_of(state).encode() {
            Ok(blob) => blob,
            Err(e) => {
                error!("snapshot encode failed: {e}");
                return;
            }
        };
        let storage = Arc::clone(&self.storage);
        let schedule_id = self.config.schedule_id();
        tokio::spawn(async move {
            if let Err(e) = storage.save_snapshot(schedule_id, &blob).await {
                error!("snapshot save failed: {e}");
            }
        });
    }
}

fn view_of<'a>(state: &'a BotState, user_id: i64) -> &'a Timetable {
    state
        .sessions
        .get(&user_id)
        .and_then(|s| s.draft.as_ref())
        .unwrap_or(&state.canonical)
}

fn print_all_rooms(canonical: &Timetable) -> String {
    let mut res = "\n\nLineup in each room:\n".to_string();
    for room in canonical.rooms() {
        res.push_str(&canonical.render_for_diff(room));
    }
    res
}

fn apply_entries(
    canonical: &Timetable,
    session: &mut UserSession,
    entries: &[ProposedEntry],
    now: DateTime<Local>,
) -> (String, DraftOutcome) {
    let (mut draft, outcome) = match session.draft.take() {
        Some(draft) => (draft, DraftOutcome::Mutated),
        None => (canonical.clone(), DraftOutcome::Created),
    };
    let mut report = String::new();
    for entry in entries {
        let slot = draft.slot_from_entry(entry);
        let line = draft.print_slot(&slot);
        match draft.apply_entry(entry, now) {
            Ok(evictions) => {
                report.push_str(&format!("added {line}\n"));
                report.push_str(&evictions);
            }
            Err(e) => error!("applying entry to draft: {e}"),
        }
    }
    session.draft = Some(draft);
    (report, outcome)
}

fn apply_to_canonical(
    canonical: &mut Timetable,
    entries: &[ProposedEntry],
    now: DateTime<Local>,
) -> String {
    let mut report = String::new();
    for entry in entries {
        let slot = canonical.slot_from_entry(entry);
        let line = canonical.print_slot(&slot);
        match canonical.insert_slot(slot, now) {
            Ok(evictions) => {
                report.push_str(&format!("added {line}\n"));
                report.push_str(&evictions);
            }
            Err(e) => error!("applying merge request entry: {e}"),
        }
    }
    report
}

fn restore_state(state: &mut BotState, snapshot: Snapshot, now: DateTime<Local>) {
    state.canonical = state.canonical.with_slots(snapshot.canonical, now);
    for draft in snapshot.drafts {
        let mut timetable = state.canonical.with_slots(draft.slots, now);
        timetable.changes = draft
            .changes
            .into_iter()
            .map(merge::entry_from_record)
            .collect();
        state.sessions.insert(
            draft.user_id,
            UserSession {
                dialog: DialogState::default(),
                draft: Some(timetable),
            },
        );
    }
    state.queue = MergeQueue::restore(snapshot.merge_requests, snapshot.next_merge_id);
    state.users = UserRegistry::from_records(snapshot.users);
}

fn snapshot_of(state: &BotState) -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.canonical = state.canonical.slots().iter().map(SlotRecord::from).collect();
    for (user_id, session) in &state.sessions {
        if let Some(draft) = &session.draft {
            snapshot.drafts.push(DraftRecord {
                user_id: *user_id,
                slots: draft.slots().iter().map(SlotRecord::from).collect(),
                changes: draft
                    .changes
                    .iter()
                    .map(|entry| lineup_common::snapshot::EntryRecord {
                        room: entry.room.clone(),
                        dj: entry.dj.clone(),
                        day: entry.day,
                        hour: entry.hour,
                        minute: entry.minute,
                        duration: entry.duration,
                    })
                    .collect(),
            });
        }
    }
    snapshot.merge_requests = state.queue.iter().map(MergeRequestRecord::from).collect();
    snapshot.users = state.users.to_records();
    snapshot.next_merge_id = state.queue.next_id();
    snapshot
}

/// Strip everything but ascii alphanumerics and spaces, lowercased.
fn strip_command(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .to_lowercase()
}

/// Split an inbound text into (command, argument).
///
/// A user mid-dialog keeps routing to the command that opened the dialog,
/// with the raw text as argument. Texts that strip down to nothing (emoji
/// buttons) stay as-is so they can match button commands.
fn parse_command(state: &BotState, user_id: i64, text: &str) -> (String, String) {
    if let Some(session) = state.sessions.get(&user_id) {
        if let (true, Some(kind)) = (session.dialog.is_active(), session.dialog.kind) {
            return (kind.command().to_string(), text.to_string());
        }
    }
    let (mut command, arg) = match text.find(' ') {
        Some(i) => (text[..i].to_string(), text[i..].to_string()),
        None => (text.to_string(), strip_command(text)),
    };
    command = strip_command(&command);
    if command.is_empty() {
        command = text.to_string();
    }
    (command, arg)
}

/// Keep the newest whole lines fitting in one message.
fn trim_log(text: &str) -> String {
    if text.len() <= MAX_MESSAGE_SIZE {
        return text.to_string();
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let mut total = 0;
    let mut keep_from = 0;
    for (i, line) in lines.iter().enumerate().rev() {
        total += line.len() + 1;
        if total > MAX_MESSAGE_SIZE {
            keep_from = i + 1;
            break;
        }
    }
    let mut res = String::new();
    for line in &lines[keep_from..] {
        if line.is_empty() {
            continue;
        }
        res.push_str(line);
        res.push('\n');
    }
    res
}

/// Split a long text into chunks within `max` bytes, cutting at the last
/// newline inside the window when there is one.
fn split_text(text: &str, max: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + max).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end < text.len() {
            if let Some(pos) = text[start..end].rfind('\n') {
                end = start + pos + 1;
            }
        }
        if end == start {
            break;
        }
        parts.push(text[start..end].to_string());
        start = end;
    }
    parts
}

fn split_outbound(messages: Vec<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut result = Vec::with_capacity(messages.len());
    for message in messages {
        if message.text.len() <= MAX_MESSAGE_SIZE {
            result.push(message);
            continue;
        }
        for part in split_text(&message.text, MAX_MESSAGE_SIZE) {
            result.push(OutboundMessage {
                user_id: message.user_id,
                text: part,
                buttons: message.buttons.clone(),
                is_html: message.is_html,
            });
        }
    }
    result
}
