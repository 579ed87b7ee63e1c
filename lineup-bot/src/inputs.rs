//! Conversational input state machine
//!
//! Collects one proposed schedule entry per pass through
//! room → day → hour → DJ → duration, then offers validate / continue /
//! edit / cancel. The machine is pure: it never touches a timetable, it
//! only returns a reply (message, optional button set, emitted entries)
//! and leaves it to the dispatcher to apply what it emits.

use serde::{Deserialize, Serialize};
use tracing::error;

pub const CANCEL_BUTTON: &str = "🔴";

pub const INPUT_COMMAND: &str = "input";
pub const LOG_COMMAND: &str = "log";
pub const MERGE_COMMAND: &str = "merge";
pub const REBASE_COMMAND: &str = "rebase";

pub const VALIDATE_COMMAND: &str = "validate";
pub const CONTINUE_COMMAND: &str = "continue";
pub const EDIT_COMMAND: &str = "edit";
pub const MERGE_SUBMIT_COMMAND: &str = "Submit";
pub const MERGE_DELETE_COMMAND: &str = "delete";
pub const REBASE_ACCEPT_COMMAND: &str = "accept";
pub const REBASE_REFUSE_COMMAND: &str = "refuse";

/// Hard ceiling on a single set's duration, in minutes
pub const DURATION_MAX_MINUTES: u32 = 600;

const WHICH_ROOM_MESSAGE: &str = "Which room?";
const INVALID_ROOM_MESSAGE: &str = "Invalid input, please click a button to choose the room";
const WHICH_DAY_MESSAGE: &str = "Which day?";
const INVALID_DAY_MESSAGE: &str = "Invalid input, please click a button to choose the day";
const WHICH_HOUR_MESSAGE: &str = "Which hour? i.e \"21\" or \"21 30\"";
const INVALID_HOUR_MESSAGE: &str = "Invalid input, please enter something like \"11\" or \"11 30\"";
const WHICH_DJ_MESSAGE: &str = "Enter the DJ name";
const INVALID_DJ_MESSAGE: &str = "Invalid input, please enter the DJ name";
const WHICH_DURATION_MESSAGE: &str =
    "Which duration for this set? (click button or input duration in minutes)";
const INVALID_DURATION_MESSAGE: &str = "Invalid input, please enter the duration in minutes";
pub const VALIDATED_MESSAGE: &str = "Validated, thanks";
pub const CANCELLED_MESSAGE: &str = "Cancelled, no changes were made to the lineup";
const VALIDATE_ERROR_MESSAGE: &str = "Invalid input";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";
const MERGE_MESSAGE: &str = "\nClick Submit to send your changes to moderation\n\
edit to make more changes\n\
delete to delete all your changes";
pub const MERGE_SUBMIT_MESSAGE: &str = "Merge request sent to moderation, thanks!";
pub const MERGE_DELETE_MESSAGE: &str = "Cancelled merge request and deleted all your changes";
pub const MERGE_EDIT_MESSAGE: &str = "Cancelled merge request, you can keep editing your changes";
const LOG_START_MESSAGE: &str = "Starting log streaming.";
const LOG_STOP_MESSAGE: &str = "Stopped log streaming.";
pub const REBASE_MESSAGE: &str = "\nAccept or refuse this merge request";
pub const REBASE_ACCEPT_MESSAGE: &str = "Merge request rebased on master";
pub const REBASE_REFUSE_MESSAGE: &str = "Merge request refused";
const VALIDATION_INSTRUCTIONS: &str = "\n\nClick validate to confirm\n\
continue to enter an extra set right after this one\n\
edit to change the last entered set\n\
🔴 to cancel";

const DURATION_PRESETS: [(&str, u32); 7] = [
    ("1h", 60),
    ("1h30", 90),
    ("2h", 120),
    ("2h30", 150),
    ("3h", 180),
    ("3h30", 210),
    ("4h", 240),
];

/// One proposed schedule entry, relative to the schedule start day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedEntry {
    pub room: String,
    pub dj: String,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    /// Minutes
    pub duration: u32,
}

/// Which stateful command a user's dialog belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogKind {
    Input,
    Merge,
    Rebase,
    Log,
}

impl DialogKind {
    pub fn command(&self) -> &'static str {
        match self {
            DialogKind::Input => INPUT_COMMAND,
            DialogKind::Merge => MERGE_COMMAND,
            DialogKind::Rebase => REBASE_COMMAND,
            DialogKind::Log => LOG_COMMAND,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Idle,
    ChoosingRoom,
    ChoosingDay,
    ChoosingHour,
    EnteringDj,
    EnteringDuration,
    Validating,
    MergeReview,
    RebaseReview,
    LogStreaming,
}

/// Semantic outcome of a dialog turn, for the dispatcher to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogEvent {
    Cancelled,
    Validated,
    Submitted,
    DraftDeleted,
    DraftKeptEditing,
    RebaseAccepted,
    RebaseRefused,
    LogStopped,
}

/// Per-user dialog state; lives inside the user's session
#[derive(Debug, Clone, Default)]
pub struct DialogState {
    pub step: Step,
    pub kind: Option<DialogKind>,
    room: String,
    day: u32,
    hour: Option<u32>,
    minute: Option<u32>,
    dj: String,
    duration: u32,
}

impl DialogState {
    /// True while a stateful command owns this user's raw input.
    pub fn is_active(&self) -> bool {
        self.kind.is_some()
    }

    pub fn is_streaming_logs(&self) -> bool {
        self.kind == Some(DialogKind::Log)
    }

    fn reset(&mut self) {
        *self = DialogState::default();
    }
}

/// Reply from one dialog turn
#[derive(Debug, Clone)]
pub struct DialogReply {
    pub message: String,
    /// `None` keeps the user's current keyboard, `Some` replaces it
    pub buttons: Option<Vec<String>>,
    /// Entries emitted for the dispatcher to fold into a draft
    pub entries: Vec<ProposedEntry>,
    pub event: Option<DialogEvent>,
}

impl DialogReply {
    fn prompt(message: impl Into<String>, buttons: Vec<String>) -> DialogReply {
        DialogReply {
            message: message.into(),
            buttons: Some(buttons),
            entries: Vec::new(),
            event: None,
        }
    }

    fn terminal(message: impl Into<String>, event: DialogEvent) -> DialogReply {
        DialogReply {
            message: message.into(),
            buttons: None,
            entries: Vec::new(),
            event: Some(event),
        }
    }
}

/// The step graph itself; immutable, shared by all user sessions
#[derive(Debug, Clone)]
pub struct DialogMachine {
    days: Vec<String>,
    rooms: Vec<String>,
    room_buttons: Vec<String>,
    day_buttons: Vec<String>,
}

impl DialogMachine {
    pub fn new(days: Vec<String>, rooms: Vec<String>) -> DialogMachine {
        let mut room_buttons = rooms.clone();
        room_buttons.push(CANCEL_BUTTON.to_string());
        let mut day_buttons = days.clone();
        day_buttons.push(CANCEL_BUTTON.to_string());
        DialogMachine {
            days,
            rooms,
            room_buttons,
            day_buttons,
        }
    }

    pub fn day_label(&self, day: u32) -> &str {
        &self.days[day as usize % self.days.len()]
    }

    /// Process one raw input for one user's dialog state.
    pub fn handle(&self, state: &mut DialogState, input: &str) -> DialogReply {
        match state.step {
            Step::Idle => self.start_dialog(state, input),
            Step::ChoosingRoom => self.choose_room(state, input),
            Step::ChoosingDay => self.choose_day(state, input),
            Step::ChoosingHour => self.choose_hour(state, input),
            Step::EnteringDj => self.enter_dj(state, input),
            Step::EnteringDuration => self.enter_duration(state, input),
            Step::Validating => self.validate(state, input),
            Step::MergeReview => self.merge_review(state, input),
            Step::RebaseReview => self.rebase_review(state, input),
            Step::LogStreaming => {
                state.reset();
                DialogReply::terminal(LOG_STOP_MESSAGE, DialogEvent::LogStopped)
            }
        }
    }

    fn start_dialog(&self, state: &mut DialogState, input: &str) -> DialogReply {
        match input {
            INPUT_COMMAND => {
                state.reset();
                state.kind = Some(DialogKind::Input);
                state.step = Step::ChoosingRoom;
                DialogReply::prompt(WHICH_ROOM_MESSAGE, self.room_buttons.clone())
            }
            MERGE_COMMAND => {
                state.reset();
                state.kind = Some(DialogKind::Merge);
                state.step = Step::MergeReview;
                DialogReply::prompt(MERGE_MESSAGE, merge_buttons())
            }
            REBASE_COMMAND => {
                state.reset();
                state.kind = Some(DialogKind::Rebase);
                state.step = Step::RebaseReview;
                DialogReply::prompt(REBASE_MESSAGE, rebase_buttons())
            }
            LOG_COMMAND => {
                state.reset();
                state.kind = Some(DialogKind::Log);
                state.step = Step::LogStreaming;
                DialogReply::prompt(LOG_START_MESSAGE, vec![CANCEL_BUTTON.to_string()])
            }
            other => {
                error!("dialog started with unknown command <{other}>");
                state.reset();
                DialogReply {
                    message: INTERNAL_ERROR_MESSAGE.to_string(),
                    buttons: None,
                    entries: Vec::new(),
                    event: None,
                }
            }
        }
    }

    fn cancel(&self, state: &mut DialogState) -> DialogReply {
        state.reset();
        DialogReply::terminal(CANCELLED_MESSAGE, DialogEvent::Cancelled)
    }

    fn choose_room(&self, state: &mut DialogState, input: &str) -> DialogReply {
        if input == CANCEL_BUTTON {
            return self.cancel(state);
        }
        if !self.rooms.iter().any(|r| r == input) {
            return DialogReply::prompt(INVALID_ROOM_MESSAGE, self.room_buttons.clone());
        }
        state.room = input.to_string();
        state.step = Step::ChoosingDay;
        DialogReply::prompt(WHICH_DAY_MESSAGE, self.day_buttons.clone())
    }

    fn hour_buttons(&self, state: &DialogState) -> Vec<String> {
        match (state.hour, state.minute) {
            (Some(h), Some(m)) => {
                vec![format!("{h:02}:{m:02}"), CANCEL_BUTTON.to_string()]
            }
            _ => vec![CANCEL_BUTTON.to_string()],
        }
    }

    fn choose_day(&self, state: &mut DialogState, input: &str) -> DialogReply {
        if input == CANCEL_BUTTON {
            return self.cancel(state);
        }
        let Some(index) = self.days.iter().position(|d| d == input) else {
            return DialogReply::prompt(INVALID_DAY_MESSAGE, self.day_buttons.clone());
        };
        state.day = index as u32;
        state.step = Step::ChoosingHour;
        DialogReply::prompt(WHICH_HOUR_MESSAGE, self.hour_buttons(state))
    }

    fn dj_buttons(&self, state: &DialogState) -> Vec<String> {
        let mut buttons = vec![CANCEL_BUTTON.to_string()];
        if !state.dj.is_empty() {
            buttons.push(state.dj.clone());
        }
        buttons
    }

    fn choose_hour(&self, state: &mut DialogState, input: &str) -> DialogReply {
        if input == CANCEL_BUTTON {
            return self.cancel(state);
        }
        let Some((hour, minute)) = parse_hour_minute(input) else {
            return DialogReply::prompt(INVALID_HOUR_MESSAGE, self.hour_buttons(state));
        };
        state.hour = Some(hour);
        state.minute = Some(minute);
        state.step = Step::EnteringDj;
        DialogReply::prompt(WHICH_DJ_MESSAGE, self.dj_buttons(state))
    }

    fn enter_dj(&self, state: &mut DialogState, input: &str) -> DialogReply {
        if input == CANCEL_BUTTON {
            return self.cancel(state);
        }
        if input.trim().is_empty() {
            return DialogReply::prompt(INVALID_DJ_MESSAGE, self.dj_buttons(state));
        }
        state.dj = input.to_string();
        state.step = Step::EnteringDuration;
        DialogReply::prompt(WHICH_DURATION_MESSAGE, duration_buttons())
    }

    fn enter_duration(&self, state: &mut DialogState, input: &str) -> DialogReply {
        if input == CANCEL_BUTTON {
            return self.cancel(state);
        }
        let duration = DURATION_PRESETS
            .iter()
            .find(|(label, _)| *label == input)
            .map(|(_, minutes)| *minutes)
            .or_else(|| input.trim().parse::<u32>().ok());

        let duration = match duration {
            Some(d) if d > DURATION_MAX_MINUTES => {
                let message = format!(
                    "You entered {d} but max duration is {DURATION_MAX_MINUTES} minutes, \
                     please try again"
                );
                return DialogReply::prompt(message, duration_buttons());
            }
            Some(d) if d > 0 => d,
            _ => return DialogReply::prompt(INVALID_DURATION_MESSAGE, duration_buttons()),
        };

        state.duration = duration;
        state.step = Step::Validating;
        let message = format!(
            "{}{VALIDATION_INSTRUCTIONS}",
            self.describe_entry(state)
        );
        DialogReply::prompt(message, validation_buttons())
    }

    fn describe_entry(&self, state: &DialogState) -> String {
        let hour = state.hour.unwrap_or(0);
        let minute = state.minute.unwrap_or(0);
        let total = minute + state.duration % 60;
        let end_hour = (hour + state.duration / 60 + total / 60) % 24;
        let end_minute = total % 60;
        format!(
            "{} {} {hour:02}:{minute:02} to {end_hour:02}:{end_minute:02} {}",
            state.room,
            self.day_label(state.day),
            state.dj
        )
    }

    fn current_entry(&self, state: &DialogState) -> ProposedEntry {
        ProposedEntry {
            room: state.room.clone(),
            dj: state.dj.clone(),
            day: state.day,
            hour: state.hour.unwrap_or(0),
            minute: state.minute.unwrap_or(0),
            duration: state.duration,
        }
    }

    fn validate(&self, state: &mut DialogState, input: &str) -> DialogReply {
        match input {
            VALIDATE_COMMAND => {
                let entry = self.current_entry(state);
                state.reset();
                DialogReply {
                    message: VALIDATED_MESSAGE.to_string(),
                    buttons: None,
                    entries: vec![entry],
                    event: Some(DialogEvent::Validated),
                }
            }
            CANCEL_BUTTON => self.cancel(state),
            EDIT_COMMAND => {
                state.step = Step::ChoosingRoom;
                DialogReply::prompt(WHICH_ROOM_MESSAGE, self.room_buttons.clone())
            }
            CONTINUE_COMMAND => {
                let entry = self.current_entry(state);
                // Next set starts exactly where this one ends, rolling over
                // hour and day boundaries.
                let mut minute = state.minute.unwrap_or(0) + state.duration % 60;
                let mut hour = state.hour.unwrap_or(0) + state.duration / 60;
                if minute > 59 {
                    hour += 1;
                    minute -= 60;
                }
                if hour > 23 {
                    hour -= 24;
                    state.day += 1;
                }
                state.hour = Some(hour);
                state.minute = Some(minute);
                state.dj.clear();
                state.step = Step::EnteringDj;
                DialogReply {
                    message: WHICH_DJ_MESSAGE.to_string(),
                    buttons: Some(vec![CANCEL_BUTTON.to_string()]),
                    entries: vec![entry],
                    event: None,
                }
            }
            _ => DialogReply::prompt(VALIDATE_ERROR_MESSAGE, validation_buttons()),
        }
    }

    fn merge_review(&self, state: &mut DialogState, input: &str) -> DialogReply {
        match input {
            MERGE_SUBMIT_COMMAND => {
                state.reset();
                DialogReply::terminal(MERGE_SUBMIT_MESSAGE, DialogEvent::Submitted)
            }
            MERGE_DELETE_COMMAND => {
                state.reset();
                DialogReply::terminal(MERGE_DELETE_MESSAGE, DialogEvent::DraftDeleted)
            }
            EDIT_COMMAND => {
                state.reset();
                DialogReply::terminal(MERGE_EDIT_MESSAGE, DialogEvent::DraftKeptEditing)
            }
            _ => DialogReply::prompt(MERGE_MESSAGE, merge_buttons()),
        }
    }

    fn rebase_review(&self, state: &mut DialogState, input: &str) -> DialogReply {
        match input {
            REBASE_ACCEPT_COMMAND => {
                state.reset();
                DialogReply::terminal(REBASE_ACCEPT_MESSAGE, DialogEvent::RebaseAccepted)
            }
            REBASE_REFUSE_COMMAND => {
                state.reset();
                DialogReply::terminal(REBASE_REFUSE_MESSAGE, DialogEvent::RebaseRefused)
            }
            _ => DialogReply::prompt(REBASE_MESSAGE, rebase_buttons()),
        }
    }
}

fn merge_buttons() -> Vec<String> {
    vec![
        MERGE_SUBMIT_COMMAND.to_string(),
        EDIT_COMMAND.to_string(),
        MERGE_DELETE_COMMAND.to_string(),
    ]
}

fn rebase_buttons() -> Vec<String> {
    vec![
        REBASE_ACCEPT_COMMAND.to_string(),
        REBASE_REFUSE_COMMAND.to_string(),
    ]
}

fn validation_buttons() -> Vec<String> {
    vec![
        VALIDATE_COMMAND.to_string(),
        CONTINUE_COMMAND.to_string(),
        EDIT_COMMAND.to_string(),
        CANCEL_BUTTON.to_string(),
    ]
}

fn duration_buttons() -> Vec<String> {
    let mut buttons: Vec<String> = DURATION_PRESETS
        .iter()
        .map(|(label, _)| label.to_string())
        .collect();
    buttons.push(CANCEL_BUTTON.to_string());
    buttons
}

/// Accepts `"H"`, `"H M"` or `"H:M"`; hour must be <= 23, minute <= 59.
fn parse_hour_minute(input: &str) -> Option<(u32, u32)> {
    let cleaned = input.replace(':', " ");
    let mut parts = cleaned.split_whitespace();
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> DialogMachine {
        DialogMachine::new(
            vec!["Fri".to_string(), "Sat".to_string(), "Sun".to_string()],
            vec!["🌞 Beach".to_string(), "🌴 Grove".to_string()],
        )
    }

    fn walk_to_validation(machine: &DialogMachine, state: &mut DialogState) {
        machine.handle(state, INPUT_COMMAND);
        machine.handle(state, "🌴 Grove");
        machine.handle(state, "Sat");
        machine.handle(state, "12:00");
        machine.handle(state, "DJ");
        machine.handle(state, "120");
    }

    #[test]
    fn full_walk_emits_entry() {
        let machine = machine();
        let mut state = DialogState::default();

        let reply = machine.handle(&mut state, INPUT_COMMAND);
        assert_eq!(reply.message, WHICH_ROOM_MESSAGE);
        assert!(reply.buttons.unwrap().contains(&"🌴 Grove".to_string()));

        machine.handle(&mut state, "🌴 Grove");
        machine.handle(&mut state, "Sat");
        machine.handle(&mut state, "12:00");
        machine.handle(&mut state, "DJ");
        let reply = machine.handle(&mut state, "120");
        assert!(reply.message.starts_with("🌴 Grove Sat 12:00 to 14:00 DJ"));

        let reply = machine.handle(&mut state, VALIDATE_COMMAND);
        assert_eq!(reply.event, Some(DialogEvent::Validated));
        assert_eq!(
            reply.entries,
            vec![ProposedEntry {
                room: "🌴 Grove".to_string(),
                dj: "DJ".to_string(),
                day: 1,
                hour: 12,
                minute: 0,
                duration: 120,
            }]
        );
        assert!(!state.is_active());
    }

    #[test]
    fn continue_rolls_over_midnight() {
        let machine = machine();
        let mut state = DialogState::default();
        machine.handle(&mut state, INPUT_COMMAND);
        machine.handle(&mut state, "🌞 Beach");
        machine.handle(&mut state, "Fri");
        machine.handle(&mut state, "23");
        machine.handle(&mut state, "Night DJ");
        let reply = machine.handle(&mut state, "90");
        assert!(reply.message.starts_with("🌞 Beach Fri 23:00 to 00:30 Night DJ"));

        let reply = machine.handle(&mut state, CONTINUE_COMMAND);
        assert_eq!(reply.entries.len(), 1);
        assert_eq!(reply.entries[0].hour, 23);

        // The follow-up entry starts at 00:30 on the next day.
        machine.handle(&mut state, "Morning DJ");
        machine.handle(&mut state, "1h");
        let reply = machine.handle(&mut state, VALIDATE_COMMAND);
        let entry = &reply.entries[0];
        assert_eq!((entry.day, entry.hour, entry.minute), (1, 0, 30));
        assert_eq!(entry.duration, 60);
    }

    #[test]
    fn cancel_resets_everything() {
        let machine = machine();
        let mut state = DialogState::default();
        walk_to_validation(&machine, &mut state);
        let reply = machine.handle(&mut state, CANCEL_BUTTON);
        assert_eq!(reply.message, CANCELLED_MESSAGE);
        assert_eq!(reply.event, Some(DialogEvent::Cancelled));
        assert_eq!(state.step, Step::Idle);
    }

    #[test]
    fn invalid_hour_reprompts_same_state() {
        let machine = machine();
        let mut state = DialogState::default();
        machine.handle(&mut state, INPUT_COMMAND);
        machine.handle(&mut state, "🌞 Beach");
        machine.handle(&mut state, "Fri");
        for bad in ["25", "noon", "12 75", "1 2 3"] {
            let reply = machine.handle(&mut state, bad);
            assert_eq!(reply.message, INVALID_HOUR_MESSAGE, "input {bad}");
            assert_eq!(state.step, Step::ChoosingHour);
        }
        let reply = machine.handle(&mut state, "21 30");
        assert_eq!(reply.message, WHICH_DJ_MESSAGE);
    }

    #[test]
    fn over_ceiling_duration_gets_distinct_message() {
        let machine = machine();
        let mut state = DialogState::default();
        machine.handle(&mut state, INPUT_COMMAND);
        machine.handle(&mut state, "🌞 Beach");
        machine.handle(&mut state, "Fri");
        machine.handle(&mut state, "21");
        machine.handle(&mut state, "DJ");
        let reply = machine.handle(&mut state, "601");
        assert!(reply.message.contains("max duration is 600"));
        let reply = machine.handle(&mut state, "0");
        assert_eq!(reply.message, INVALID_DURATION_MESSAGE);
        let reply = machine.handle(&mut state, "-5");
        assert_eq!(reply.message, INVALID_DURATION_MESSAGE);
    }

    #[test]
    fn edit_rewinds_to_room_and_keeps_hour_quick_button() {
        let machine = machine();
        let mut state = DialogState::default();
        walk_to_validation(&machine, &mut state);
        let reply = machine.handle(&mut state, EDIT_COMMAND);
        assert_eq!(reply.message, WHICH_ROOM_MESSAGE);
        machine.handle(&mut state, "🌞 Beach");
        let reply = machine.handle(&mut state, "Sun");
        assert!(reply.buttons.unwrap().contains(&"12:00".to_string()));
    }

    #[test]
    fn merge_review_events() {
        let machine = machine();
        let mut state = DialogState::default();
        machine.handle(&mut state, MERGE_COMMAND);
        let reply = machine.handle(&mut state, "nonsense");
        assert_eq!(reply.message, MERGE_MESSAGE);
        let reply = machine.handle(&mut state, MERGE_SUBMIT_COMMAND);
        assert_eq!(reply.event, Some(DialogEvent::Submitted));
    }

    #[test]
    fn rebase_review_events() {
        let machine = machine();
        let mut state = DialogState::default();
        machine.handle(&mut state, REBASE_COMMAND);
        let reply = machine.handle(&mut state, REBASE_REFUSE_COMMAND);
        assert_eq!(reply.event, Some(DialogEvent::RebaseRefused));
        assert_eq!(reply.message, REBASE_REFUSE_MESSAGE);
    }

    #[test]
    fn log_streaming_exits_on_any_input() {
        let machine = machine();
        let mut state = DialogState::default();
        machine.handle(&mut state, LOG_COMMAND);
        assert!(state.is_streaming_logs());
        let reply = machine.handle(&mut state, "whatever");
        assert_eq!(reply.event, Some(DialogEvent::LogStopped));
        assert!(!state.is_streaming_logs());
    }

    #[test]
    fn preset_duration_buttons_map_to_minutes() {
        let machine = machine();
        let mut state = DialogState::default();
        machine.handle(&mut state, INPUT_COMMAND);
        machine.handle(&mut state, "🌞 Beach");
        machine.handle(&mut state, "Fri");
        machine.handle(&mut state, "10");
        machine.handle(&mut state, "DJ");
        machine.handle(&mut state, "3h30");
        let reply = machine.handle(&mut state, VALIDATE_COMMAND);
        assert_eq!(reply.entries[0].duration, 210);
    }
}
