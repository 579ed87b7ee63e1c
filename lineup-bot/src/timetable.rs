//! In-memory timetable
//!
//! Slots are kept sorted by room priority (position in the configured room
//! list) then start time. Inserting a slot evicts every same-room slot it
//! overlaps with, half-open: a set ending at 23:00 does not collide with one
//! starting at 23:00. Every mutation recomputes the pending announcement
//! events; the sweep loop drains them with [`Timetable::advance_event_clock`].

use crate::fuzzy;
use crate::inputs::ProposedEntry;
use chrono::{DateTime, Datelike, Days, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone};
use chrono_english::{parse_date_string, Dialect};
use lineup_common::config::Config;
use lineup_common::snapshot::SlotRecord;
use lineup_common::{Error, Result};
use tracing::{debug, warn};

/// Placeholder DJ name for slots that only mark a room as open
pub const UNKNOWN_DJ: &str = "?";

const CLOSED: &str = "🚫 closed";
const NO_DATA_ROOM: &str = "⚠️ no data";
const OPEN_FLOOR: &str = "✅";
const NO_DATA: &str = "⚠️ No data available yet ⚠️";
const MISSING_DATA: &str = "\n\n⚠️ Some data is missing ⚠️";
const HERE_SUFFIX: &str = " <- you are here";
const SEARCHED_MESSAGE: &str = "Searched in DJ sets:\n";
const MIN_DJ_QUERY_MESSAGE: &str = "Enter more than 2 characters for searching a DJ.\n";

fn print_time(t: DateTime<Local>) -> String {
    t.format("%H:%M").to_string()
}

fn print_time_with_day(t: DateTime<Local>) -> String {
    t.format("%a %H:%M").to_string()
}

/// One scheduled set, absolute times
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub dj: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub room: String,
    pub tags: Vec<(String, String)>,
}

impl From<&Slot> for SlotRecord {
    fn from(slot: &Slot) -> SlotRecord {
        SlotRecord {
            dj: slot.dj.clone(),
            start: slot.start,
            end: slot.end,
            room: slot.room.clone(),
            tags: slot.tags.clone(),
        }
    }
}

impl From<SlotRecord> for Slot {
    fn from(record: SlotRecord) -> Slot {
        Slot {
            dj: record.dj,
            start: record.start,
            end: record.end,
            room: record.room,
            tags: record.tags,
        }
    }
}

/// A not-yet-announced set start
#[derive(Debug, Clone)]
struct FutureEvent {
    start: DateTime<Local>,
    dj: String,
    room: String,
    room_index: usize,
}

/// The timetable for one schedule, canonical or draft
#[derive(Debug, Clone)]
pub struct Timetable {
    slots: Vec<Slot>,
    events: Vec<FutureEvent>,
    schedule_start: DateTime<Local>,
    rooms: Vec<String>,
    /// Raw entries applied on top of the canonical lineup, in input order
    pub changes: Vec<ProposedEntry>,
    skip_closed: bool,
    old_lineup_message: String,
}

fn local_time(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Local> {
    let naive = match date.and_hms_opt(hour, minute, 0) {
        Some(n) => n,
        None => date.and_time(NaiveTime::MIN),
    };
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t,
        LocalResult::None => Local.from_utc_datetime(&naive),
    }
}

impl Timetable {
    /// Build the canonical timetable from the config-declared lineup.
    pub fn from_config(config: &Config, now: DateTime<Local>) -> Timetable {
        let mut timetable = Timetable {
            slots: Vec::new(),
            events: Vec::new(),
            schedule_start: config.schedule_start,
            rooms: config.lineup.rooms.clone(),
            changes: Vec::new(),
            skip_closed: config.skip_closed_rooms,
            old_lineup_message: config.old_lineup_message.clone(),
        };
        for room in &config.lineup.rooms {
            let Some(sets) = config.lineup.sets.get(room) else {
                warn!("no sets declared for room <{room}>");
                continue;
            };
            for set in sets {
                let mut slot = timetable.slot_at(&set.dj, room, set.day, set.hour, set.minute, set.duration);
                slot.tags = set.tags.clone();
                match timetable.insert_slot(slot, now) {
                    Ok(evictions) if !evictions.is_empty() => warn!("{}", evictions.trim_end()),
                    Ok(_) => {}
                    Err(e) => warn!("dropping configured slot: {e}"),
                }
            }
        }
        timetable
    }

    /// Rebuild from persisted slot records, keeping config-derived settings.
    pub fn with_slots(&self, records: Vec<SlotRecord>, now: DateTime<Local>) -> Timetable {
        let mut timetable = Timetable {
            slots: records.into_iter().map(Slot::from).collect(),
            events: Vec::new(),
            schedule_start: self.schedule_start,
            rooms: self.rooms.clone(),
            changes: Vec::new(),
            skip_closed: self.skip_closed,
            old_lineup_message: self.old_lineup_message.clone(),
        };
        timetable.sort_slots();
        timetable.compute_events(now);
        timetable
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    pub fn schedule_start(&self) -> DateTime<Local> {
        self.schedule_start
    }

    /// Weekday button labels for the input dialog, one per schedule day.
    pub fn day_labels(&self, nb_days: u32) -> Vec<String> {
        (0..nb_days)
            .map(|i| {
                (self.schedule_start + Duration::hours(24 * i64::from(i)))
                    .format("%a")
                    .to_string()
            })
            .collect()
    }

    fn room_index(&self, room: &str) -> Option<usize> {
        self.rooms.iter().position(|r| r == room)
    }

    /// Materialize a slot from schedule-relative coordinates.
    pub fn slot_at(
        &self,
        dj: &str,
        room: &str,
        day: u32,
        hour: u32,
        minute: u32,
        duration: u32,
    ) -> Slot {
        let date = self
            .schedule_start
            .date_naive()
            .checked_add_days(Days::new(u64::from(day)))
            .unwrap_or_else(|| self.schedule_start.date_naive());
        let start = local_time(date, hour, minute);
        Slot {
            dj: dj.to_string(),
            start,
            end: start + Duration::minutes(i64::from(duration)),
            room: room.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn slot_from_entry(&self, entry: &ProposedEntry) -> Slot {
        self.slot_at(
            &entry.dj,
            &entry.room,
            entry.day,
            entry.hour,
            entry.minute,
            entry.duration,
        )
    }

    fn sort_slots(&mut self) {
        let rooms = self.rooms.clone();
        self.slots.sort_by(|a, b| {
            let pa = rooms.iter().position(|r| r == &a.room).unwrap_or(usize::MAX);
            let pb = rooms.iter().position(|r| r == &b.room).unwrap_or(usize::MAX);
            pa.cmp(&pb).then(a.start.cmp(&b.start))
        });
    }

    /// Insert a slot, evicting every same-room slot it overlaps with.
    ///
    /// Returns a human-readable line per eviction, empty when nothing
    /// collided. Slots for rooms not in the configured list are rejected.
    pub fn insert_slot(&mut self, slot: Slot, now: DateTime<Local>) -> Result<String> {
        if self.room_index(&slot.room).is_none() {
            return Err(Error::InvalidInput(format!("unknown room <{}>", slot.room)));
        }
        let mut evictions = String::new();
        let mut kept = Vec::with_capacity(self.slots.len() + 1);
        for existing in self.slots.drain(..) {
            let collides = existing.room == slot.room
                && existing.end > slot.start
                && existing.start < slot.end;
            if collides {
                evictions.push_str(&format!(
                    "{} deleted <{}> because it collided with <{}>\n",
                    existing.room,
                    print_slot(self.schedule_start, &existing),
                    print_slot(self.schedule_start, &slot),
                ));
            } else {
                kept.push(existing);
            }
        }
        kept.push(slot);
        self.slots = kept;
        self.sort_slots();
        self.compute_events(now);
        Ok(evictions)
    }

    /// Apply one proposed entry; convenience wrapper around
    /// [`Timetable::insert_slot`] that also records the raw change.
    pub fn apply_entry(&mut self, entry: &ProposedEntry, now: DateTime<Local>) -> Result<String> {
        let slot = self.slot_from_entry(entry);
        let evictions = self.insert_slot(slot, now)?;
        self.changes.push(entry.clone());
        Ok(evictions)
    }

    fn compute_events(&mut self, now: DateTime<Local>) {
        self.events = self
            .slots
            .iter()
            .filter(|s| s.start > now)
            .filter_map(|s| {
                self.room_index(&s.room).map(|room_index| FutureEvent {
                    start: s.start,
                    dj: s.dj.clone(),
                    room: s.room.clone(),
                    room_index,
                })
            })
            .collect();
        self.events
            .sort_by(|a, b| a.room_index.cmp(&b.room_index).then(a.start.cmp(&b.start)));
    }

    /// Drain every event whose start has passed and render the announcement.
    ///
    /// Each event is announced exactly once; re-running with the same clock
    /// returns an empty string.
    pub fn advance_event_clock(&mut self, now: DateTime<Local>) -> String {
        let mut announcement = String::new();
        let mut pending = Vec::with_capacity(self.events.len());
        for event in self.events.drain(..) {
            if event.start <= now {
                if announcement.is_empty() {
                    announcement.push_str(&format!("{} started in {}\n", event.dj, event.room));
                } else {
                    announcement.push_str(&format!("{} in {}\n", event.dj, event.room));
                }
            } else {
                pending.push(event);
            }
        }
        self.events = pending;
        announcement
    }

    /// Debug view of the pending announcement queue, grouped by start time.
    pub fn dump_events(&self) -> String {
        let mut events = self.events.clone();
        events.sort_by_key(|e| e.start);
        let mut res = String::new();
        let mut last: Option<DateTime<Local>> = None;
        for event in &events {
            if last != Some(event.start) {
                res.push_str(&format!(
                    "\n{}\n{} started in {}\n",
                    event.start.format("%Y-%m-%d %H:%M"),
                    event.dj,
                    event.room
                ));
            } else {
                res.push_str(&format!("{} in {}\n", event.dj, event.room));
            }
            last = Some(event.start);
        }
        res
    }

    /// Schedule-relative day number of an absolute time.
    pub fn day_number(&self, t: DateTime<Local>) -> u32 {
        let days = (t.date_naive() - self.schedule_start.date_naive()).num_days();
        if days < 0 {
            debug!("day_number for a time before the schedule start");
            0
        } else {
            days as u32
        }
    }

    /// Fuzzy room lookup, bounded by `max_distance`.
    pub fn find_room(&self, query: &str, max_distance: usize) -> Option<(usize, &str)> {
        fuzzy::best_room(&self.rooms, query, max_distance)
    }

    /// Fuzzy DJ search across all slots.
    ///
    /// Query words are matched against DJ-name words with a prefix-truncated
    /// edit distance, widening the allowed distance until something matches.
    /// Currently-playing and upcoming sets are listed before past ones.
    pub fn find_dj(&self, query: &str, when: DateTime<Local>) -> String {
        if query.chars().count() <= fuzzy::MIN_QUERY_LEN {
            return MIN_DJ_QUERY_MESSAGE.to_string();
        }

        let mut playing_lines = String::new();
        let mut past_lines = String::new();
        let mut seen: Vec<String> = Vec::new();
        let mut found = false;

        for threshold in 1..=3 {
            for token in query.split_whitespace() {
                for slot in &self.slots {
                    if slot.dj == UNKNOWN_DJ {
                        continue;
                    }
                    let matched = slot
                        .dj
                        .split_whitespace()
                        .filter(|word| word.chars().count() >= fuzzy::MIN_QUERY_LEN)
                        .any(|word| fuzzy::prefix_distance(word, token) < threshold);
                    if !matched {
                        continue;
                    }
                    found = true;
                    let playing = slot.end > when;
                    let line = format!(
                        "{} {} {} playing {} at {} in {}\n",
                        if playing { "✅" } else { "🚫" },
                        slot.dj,
                        if playing { "is" } else { "was" },
                        slot.start.format("%A"),
                        print_time(slot.start),
                        slot.room
                    );
                    if seen.contains(&line) {
                        continue;
                    }
                    if playing {
                        playing_lines.push_str(&line);
                    } else {
                        past_lines.push_str(&line);
                    }
                    seen.push(line);
                }
            }
            if found {
                break;
            }
        }

        if !found {
            return format!("{SEARCHED_MESSAGE}Not found. 😔\n");
        }
        format!("{SEARCHED_MESSAGE}{playing_lines}{past_lines}")
    }

    fn calculate_pause(&self, closing: DateTime<Local>, room: &str) -> Option<Duration> {
        self.slots
            .iter()
            .find(|s| s.room == room && s.start > closing)
            .map(|s| s.start - closing)
    }

    /// Per-room now view at the current time.
    pub fn render_current(&self, now: DateTime<Local>) -> String {
        self.render_current_at(None, now)
    }

    /// Per-room now view, optionally teleported to a free-text time.
    pub fn render_current_at(&self, when: Option<&str>, now: DateTime<Local>) -> String {
        let mut res = String::new();
        let mut current = now;

        if let Some(text) = when {
            match parse_date_string(text, now, Dialect::Uk) {
                Ok(t) => {
                    current = t;
                    res.push_str(&format!("teleporting to {current}\n"));
                }
                Err(e) => {
                    debug!("{e} parsing <{text}>");
                    res.push_str("teleporting command failed, I couldnt parse your input.\n");
                }
            }
        }

        let mut room = "";
        let mut found_current = false;
        let mut next_found = false;
        let mut current_closing = current;
        let mut rooms_found = 0usize;
        let mut seen_rooms: Vec<&str> = Vec::new();

        for (i, slot) in self.slots.iter().enumerate() {
            if slot.room != room {
                seen_rooms.push(&slot.room);
                rooms_found += 1;
                let mut silently_closed = false;
                if !next_found && i != 0 {
                    if found_current {
                        res.push_str(&format!(" (closing at {})", print_time(current_closing)));
                    } else if !self.skip_closed {
                        res.push_str(&format!("{room} {CLOSED}"));
                    } else {
                        silently_closed = true;
                    }
                }
                if !silently_closed {
                    res.push('\n');
                }
                room = &slot.room;
                found_current = false;
                next_found = false;
            }

            if slot.start <= current && slot.end > current {
                res.push_str(&format!("{room} {OPEN_FLOOR} {}", slot.dj));
                found_current = true;
                current_closing = slot.end;
                continue;
            }

            if slot.start > current && !next_found {
                if !found_current {
                    // Room is closed; annotate with who reopens it and when.
                    res.push_str(&format!("{room} {CLOSED}"));
                    if slot.dj == UNKNOWN_DJ {
                        res.push_str(&format!(
                            " until {} at {}",
                            slot.start.format("%a"),
                            print_time(slot.start)
                        ));
                    } else {
                        res.push_str(&format!(" ({}", slot.dj));
                        if current.day() != slot.start.day() {
                            res.push_str(&format!(", {}", slot.start.format("%a")));
                        }
                        res.push_str(&format!(" at {})", print_time(slot.start)));
                    }
                } else if current_closing != slot.start {
                    match self.calculate_pause(current_closing, room) {
                        Some(pause) if pause <= Duration::hours(2) => {
                            res.push_str(&format!(
                                " ({} at {} after {}min pause)",
                                slot.dj,
                                print_time(slot.start),
                                pause.num_minutes()
                            ));
                        }
                        _ => {
                            res.push_str(&format!(
                                " (closing at {})",
                                print_time(current_closing)
                            ));
                        }
                    }
                } else {
                    res.push_str(&format!(" ({} at {})", slot.dj, print_time(slot.start)));
                }
                next_found = true;
            }
        }

        if !next_found {
            if found_current {
                res.push_str(&format!(" (closing at {})", print_time(current_closing)));
            } else if !self.skip_closed && !room.is_empty() {
                res.push_str(&format!("{room} {CLOSED}"));
            }
        }

        for configured in &self.rooms {
            if !seen_rooms.iter().any(|r| r == configured) {
                res.push_str(&format!("\n{configured} {NO_DATA_ROOM}"));
            }
        }

        if res.is_empty() || res == "\n" {
            warn!("now view is empty, no data");
            return NO_DATA.to_string();
        }
        if rooms_found != self.rooms.len() {
            res.push_str(MISSING_DATA);
        }
        res
    }

    /// Full schedule view, grouped by day, with a position marker.
    pub fn render_full(
        &self,
        you_are_here: &str,
        filter_room: Option<&str>,
        now: DateTime<Local>,
    ) -> String {
        let mut old_data = true;
        let mut old_lineup_message = self.old_lineup_message.as_str();
        let mut selected: Vec<&Slot> = Vec::new();
        for slot in &self.slots {
            if slot.end > now {
                old_lineup_message = "";
                old_data = false;
            }
            if let Some(room) = filter_room {
                if slot.room != room {
                    continue;
                }
            }
            selected.push(slot);
        }

        let mut res = String::new();
        if let Some(room) = filter_room {
            res.push_str(&format!("Lineup in {room}\n\n"));
        }
        if selected.is_empty() {
            warn!("full view is empty, no data");
            res.push_str(NO_DATA);
            return res;
        }

        selected.sort_by_key(|s| s.start);

        let mut body = String::new();
        let marker = format!("{you_are_here}{HERE_SUFFIX}\n");
        let mut printed_marker = old_data;
        let mut current_day: Option<u32> = None;
        let mut closing = selected[0].end;

        let mut found_data = false;
        for slot in &selected {
            if slot.dj != UNKNOWN_DJ {
                found_data = true;
            }
            if slot.end > closing {
                closing = slot.end;
            }
        }
        if !found_data {
            res.push_str(NO_DATA);
            return res;
        }

        for slot in &selected {
            if slot.dj == UNKNOWN_DJ {
                continue;
            }
            if current_day != Some(slot.start.day()) {
                if !printed_marker && current_day.is_some() && current_day == Some(now.day()) {
                    body.push_str(&marker);
                    printed_marker = true;
                }
                if current_day.is_some() {
                    body.push('\n');
                }
                if slot.start.date_naive() == now.date_naive() {
                    body.push_str("Today:\n");
                } else {
                    body.push_str(&format!("{}:\n", slot.start.format("%A")));
                }
                current_day = Some(slot.start.day());
            }
            if slot.start > now && !printed_marker {
                body.push_str(&marker);
                printed_marker = true;
            }
            body.push_str(&print_time(slot.start));
            body.push(' ');
            body.push_str(&slot.dj);
            if filter_room.is_none() {
                body.push(' ');
                body.push_str(&slot.room);
            }
            body.push('\n');
        }

        if closing > now {
            if !printed_marker {
                body.push_str(&marker);
            }
            body.push_str(&format!("{} closing\n", print_time(closing)));
        } else {
            body.push_str(&format!("{} closed\n", print_time(closing)));
        }
        body.push_str(old_lineup_message);

        res.push_str(&body);
        res
    }

    /// Stable per-room rendering used to diff two timetables.
    pub fn render_for_diff(&self, room: &str) -> String {
        let mut slots: Vec<&Slot> = self
            .slots
            .iter()
            .filter(|s| s.room == room && s.dj != UNKNOWN_DJ)
            .collect();
        if slots.is_empty() {
            return String::new();
        }
        slots.sort_by_key(|s| s.start);
        let mut res = format!("\n{room}:\n\n");
        for slot in slots {
            res.push_str(&format!(
                "{} to {} {}\n",
                print_time_with_day(slot.start),
                print_time(slot.end),
                slot.dj
            ));
        }
        res
    }

    /// Admin debug dump of every slot, with hole and overlap annotations.
    pub fn dump(&self) -> String {
        if self.slots.is_empty() {
            return "No data".to_string();
        }
        let mut res = String::new();
        let mut room = "";
        let mut last_closing: Option<DateTime<Local>> = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.room != room {
                room = &slot.room;
                if i != 0 {
                    res.push('\n');
                }
                res.push_str(&format!("{room}:\n"));
                last_closing = None;
            } else if i != 0 {
                res.push('\n');
            }
            if let Some(closing) = last_closing {
                if slot.start != closing {
                    res.push_str(&format!(
                        "# hole: {} to {}\n",
                        print_time(closing),
                        print_time(slot.start)
                    ));
                }
                if slot.start < closing {
                    res.push_str(&format!("# wrong data? {closing} to {}\n", slot.start));
                }
            }
            last_closing = Some(slot.end);
            res.push_str(&print_slot(self.schedule_start, slot));
        }
        res.push('\n');
        res
    }

    /// Gaps between consecutive same-room slots.
    pub fn holes(&self) -> String {
        if self.slots.is_empty() {
            return "No data".to_string();
        }
        let mut res = String::new();
        let mut room = "";
        let mut last_closing: Option<DateTime<Local>> = None;
        let mut last_dj = "";
        for slot in &self.slots {
            if slot.room != room {
                room = &slot.room;
                last_closing = None;
            }
            if let Some(closing) = last_closing {
                if slot.start != closing {
                    res.push_str(&format!(
                        "{room} gap: {} to {} ({last_dj} -> {})\n",
                        print_time_with_day(closing),
                        print_time_with_day(slot.start),
                        slot.dj
                    ));
                }
                if slot.start < closing {
                    res.push_str(&format!("# wrong data? {closing} to {}\n", slot.start));
                }
            }
            last_closing = Some(slot.end);
            last_dj = &slot.dj;
        }
        res.push('\n');
        res
    }

    pub fn print_slot(&self, slot: &Slot) -> String {
        print_slot(self.schedule_start, slot)
    }
}

fn print_slot(schedule_start: DateTime<Local>, slot: &Slot) -> String {
    let days = (slot.start.date_naive() - schedule_start.date_naive())
        .num_days()
        .max(0);
    format!(
        "- '{days} {} {} {}'",
        print_time(slot.start),
        (slot.end - slot.start).num_minutes(),
        slot.dj
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineup_common::config::Config;

    const CONFIG: &str = r#"
port = 8080
allow_input = true
nb_days_for_input = 3
beginning_schedule = "2026-08-21 16:00"

[meta]
title = "Test Festival"
prefix = "testfest"
mobile_app_name = "Test Festival"
you_are_here = "🐰"

[lineup]
rooms = ["🌞 Beach", "🌴 Grove"]

[[lineup.sets."🌞 Beach"]]
day = 0
hour = 23
minute = 0
duration = 120
dj = "MADmoiselle"

[[lineup.sets."🌴 Grove"]]
day = 1
hour = 12
minute = 0
duration = 60
dj = "Sanka"
"#;

    fn timetable() -> (Timetable, DateTime<Local>) {
        let config = Config::parse(CONFIG).unwrap();
        let now = config.schedule_start;
        (Timetable::from_config(&config, now), now)
    }

    #[test]
    fn config_slots_are_loaded_in_priority_order() {
        let (timetable, _) = timetable();
        let slots = timetable.slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].room, "🌞 Beach");
        assert_eq!(slots[1].room, "🌴 Grove");
        assert_eq!(slots[0].start.format("%H:%M").to_string(), "23:00");
    }

    #[test]
    fn overlapping_same_room_slot_is_evicted() {
        let (mut timetable, now) = timetable();
        let slot = timetable.slot_at("Taker", "🌞 Beach", 0, 23, 30, 60);
        let evictions = timetable.insert_slot(slot, now).unwrap();
        assert!(evictions.contains("MADmoiselle"), "{evictions}");
        assert!(evictions.contains("Taker"), "{evictions}");
        assert!(evictions.contains("deleted"), "{evictions}");
        let beach: Vec<_> = timetable
            .slots()
            .iter()
            .filter(|s| s.room == "🌞 Beach")
            .collect();
        assert_eq!(beach.len(), 1);
        assert_eq!(beach[0].dj, "Taker");
    }

    #[test]
    fn back_to_back_slots_do_not_collide() {
        let (mut timetable, now) = timetable();
        let slot = timetable.slot_at("Follow", "🌞 Beach", 1, 1, 0, 60);
        let evictions = timetable.insert_slot(slot, now).unwrap();
        assert!(evictions.is_empty(), "{evictions}");
        assert_eq!(
            timetable
                .slots()
                .iter()
                .filter(|s| s.room == "🌞 Beach")
                .count(),
            2
        );
    }

    #[test]
    fn one_insert_can_evict_several_slots() {
        let (mut timetable, now) = timetable();
        let extra = timetable.slot_at("Second", "🌞 Beach", 1, 1, 0, 60);
        timetable.insert_slot(extra, now).unwrap();
        let wide = timetable.slot_at("Wide", "🌞 Beach", 0, 22, 0, 300);
        let evictions = timetable.insert_slot(wide, now).unwrap();
        assert_eq!(evictions.lines().count(), 2, "{evictions}");
    }

    #[test]
    fn unknown_room_is_rejected() {
        let (mut timetable, now) = timetable();
        let slot = timetable.slot_at("DJ", "🏰 Castle", 0, 12, 0, 60);
        assert!(timetable.insert_slot(slot, now).is_err());
    }

    #[test]
    fn events_drain_exactly_once() {
        let (mut timetable, now) = timetable();
        let later = now + Duration::days(2);
        let first = timetable.advance_event_clock(later);
        assert!(first.contains("MADmoiselle started in 🌞 Beach"), "{first}");
        assert!(first.contains("Sanka in 🌴 Grove"), "{first}");
        assert!(timetable.advance_event_clock(later).is_empty());
    }

    #[test]
    fn events_not_yet_due_stay_queued() {
        let (mut timetable, now) = timetable();
        let first_only = now + Duration::hours(8);
        let announced = timetable.advance_event_clock(first_only);
        assert!(announced.contains("MADmoiselle started"), "{announced}");
        assert!(!announced.contains("Sanka"), "{announced}");
        let rest = timetable.advance_event_clock(now + Duration::days(2));
        assert!(rest.contains("Sanka started in 🌴 Grove"), "{rest}");
    }

    #[test]
    fn dump_uses_relative_day_format() {
        let (timetable, _) = timetable();
        let dump = timetable.dump();
        assert!(dump.contains("🌞 Beach:\n"), "{dump}");
        assert!(dump.contains("- '0 23:00 120 MADmoiselle'"), "{dump}");
        assert!(dump.contains("- '1 12:00 60 Sanka'"), "{dump}");
    }

    #[test]
    fn diff_rendering_is_stable_and_skips_placeholders() {
        let (mut timetable, now) = timetable();
        let placeholder = timetable.slot_at(UNKNOWN_DJ, "🌞 Beach", 2, 12, 0, 60);
        timetable.insert_slot(placeholder, now).unwrap();
        let rendered = timetable.render_for_diff("🌞 Beach");
        assert!(rendered.starts_with("\n🌞 Beach:\n\n"), "{rendered}");
        assert!(rendered.contains("Fri 23:00 to 01:00 MADmoiselle\n"), "{rendered}");
        assert!(!rendered.contains(UNKNOWN_DJ), "{rendered}");
        assert!(timetable.render_for_diff("🏰 Castle").is_empty());
    }

    #[test]
    fn now_view_shows_open_and_closed_rooms() {
        let (timetable, now) = timetable();
        let during_first = now + Duration::hours(7) + Duration::minutes(30);
        let view = timetable.render_current(during_first);
        assert!(view.contains("🌞 Beach ✅ MADmoiselle"), "{view}");
        assert!(view.contains("🌴 Grove 🚫 closed (Sanka, Sat at 12:00)"), "{view}");
    }

    #[test]
    fn now_view_flags_rooms_without_any_slot() {
        let config = Config::parse(&CONFIG.replace(
            "rooms = [\"🌞 Beach\", \"🌴 Grove\"]",
            "rooms = [\"🌞 Beach\", \"🌴 Grove\", \"🏜️ Dune\"]",
        ))
        .unwrap();
        let now = config.schedule_start;
        let timetable = Timetable::from_config(&config, now);
        let view = timetable.render_current(now + Duration::hours(7) + Duration::minutes(30));
        assert!(view.contains("🏜️ Dune ⚠️ no data"), "{view}");
        assert!(view.ends_with(MISSING_DATA), "{view}");
    }

    #[test]
    fn full_view_groups_by_day_with_marker() {
        let (timetable, now) = timetable();
        let during_first = now + Duration::hours(7) + Duration::minutes(30);
        let view = timetable.render_full("🐰", None, during_first);
        assert!(view.contains("Today:\n23:00 MADmoiselle 🌞 Beach"), "{view}");
        assert!(view.contains("Saturday:\n"), "{view}");
        assert!(view.contains("🐰 <- you are here\n"), "{view}");
        assert!(view.contains("13:00 closing\n"), "{view}");
    }

    #[test]
    fn full_view_after_the_end_appends_old_lineup_message() {
        let config = Config::parse(&CONFIG.replace(
            "nb_days_for_input = 3",
            "nb_days_for_input = 3\nold_lineup_message = \"See you next year!\"",
        ))
        .unwrap();
        let now = config.schedule_start;
        let timetable = Timetable::from_config(&config, now);
        let view = timetable.render_full("🐰", None, now + Duration::days(30));
        assert!(view.contains("13:00 closed\n"), "{view}");
        assert!(view.ends_with("See you next year!"), "{view}");
    }

    #[test]
    fn dj_search_requires_three_characters() {
        let (timetable, now) = timetable();
        assert_eq!(timetable.find_dj("ma", now), MIN_DJ_QUERY_MESSAGE);
    }

    #[test]
    fn dj_search_finds_prefix_matches() {
        let (timetable, now) = timetable();
        let result = timetable.find_dj("madmoiselle", now);
        assert!(result.contains("✅ MADmoiselle is playing Friday at 23:00 in 🌞 Beach"), "{result}");
        let result = timetable.find_dj("sank", now + Duration::days(3));
        assert!(result.contains("🚫 Sanka was playing"), "{result}");
    }

    #[test]
    fn dj_search_lists_playing_before_past() {
        let (timetable, now) = timetable();
        // Between the two sets: MADmoiselle is over, Sanka still to come.
        let between = now + Duration::hours(10);
        let result = timetable.find_dj("madmoiselle sanka", between);
        let playing = result.find("✅ Sanka").expect(&result);
        let past = result.find("🚫 MADmoiselle").expect(&result);
        assert!(playing < past, "{result}");
    }

    #[test]
    fn dj_search_reports_misses() {
        let (timetable, now) = timetable();
        let result = timetable.find_dj("zzzzzz", now);
        assert!(result.contains("Not found"), "{result}");
    }

    #[test]
    fn day_number_counts_calendar_days() {
        let (timetable, now) = timetable();
        assert_eq!(timetable.day_number(now), 0);
        // 16:00 + 9h lands on the next calendar day
        assert_eq!(timetable.day_number(now + Duration::hours(9)), 1);
        assert_eq!(timetable.day_number(now - Duration::days(1)), 0);
    }

    #[test]
    fn day_labels_follow_the_schedule_start() {
        let (timetable, _) = timetable();
        assert_eq!(timetable.day_labels(3), vec!["Fri", "Sat", "Sun"]);
    }
}
