//! TOML configuration loading and validation
//!
//! Startup-time validation is aggregating: every missing or malformed field
//! is collected and reported in one multi-line `Error::Config`, so a broken
//! deployment shows all its problems at once instead of one per restart.

use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Static metadata served to the web frontend alongside the schedule
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Meta {
    pub title: String,
    /// Icon/asset filename prefix for the PWA manifest
    pub prefix: String,
    pub mobile_app_name: String,
    /// Marker rendered at the current-time boundary in full-schedule views
    pub you_are_here: String,
    pub bot_url: String,
}

/// One initial slot declared in the config, relative to the schedule start
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SlotConfig {
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    /// Duration in minutes
    pub duration: u32,
    pub dj: String,
    /// Ordered (key, value) tag metadata
    pub tags: Vec<(String, String)>,
}

/// Room list and per-room initial slots
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LineupConfig {
    /// Ordered room names; position defines priority and display order
    pub rooms: Vec<String>,
    pub sets: BTreeMap<String, Vec<SlotConfig>>,
}

/// Raw on-disk shape, before validation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    port: u16,
    allow_input: bool,
    nb_days_for_input: u32,
    restore_from_storage: bool,
    skip_closed_rooms: bool,
    motd: String,
    old_lineup_message: String,
    buttons: Vec<String>,
    beginning_schedule: String,
    database_path: String,
    admins: Vec<i64>,
    moderators: Vec<i64>,
    server_token: String,
    meta: Meta,
    lineup: LineupConfig,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Whether non-admin users may start the input dialog
    pub allow_input: bool,
    /// Number of day buttons the input dialog offers
    pub nb_days_for_input: u32,
    pub restore_from_storage: bool,
    /// Suppress "closed" lines in the now view
    pub skip_closed_rooms: bool,
    pub motd: String,
    /// Suffix appended when rendering a schedule that is entirely in the past
    pub old_lineup_message: String,
    pub buttons: Vec<String>,
    pub database_path: String,
    pub admins: Vec<i64>,
    pub moderators: Vec<i64>,
    pub server_token: String,
    pub meta: Meta,
    pub lineup: LineupConfig,
    /// Day-0 of the schedule; all slot day offsets count from here
    pub schedule_start: DateTime<Local>,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(text: &str) -> Result<Config> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;

        let mut problems = Vec::new();

        if file.lineup.rooms.is_empty() {
            problems.push("missing lineup.rooms".to_string());
        }
        if file.nb_days_for_input == 0 {
            problems.push("missing nb_days_for_input".to_string());
        }
        if file.meta.title.is_empty() {
            problems.push("missing meta.title".to_string());
        }
        if file.meta.prefix.is_empty() {
            problems.push("missing meta.prefix".to_string());
        }
        if file.meta.you_are_here.is_empty() {
            problems.push("missing meta.you_are_here".to_string());
        }

        let schedule_start = if file.beginning_schedule.is_empty() {
            problems.push("missing beginning_schedule".to_string());
            None
        } else {
            match parse_schedule_start(&file.beginning_schedule) {
                Some(t) => Some(t),
                None => {
                    problems.push(format!(
                        "cannot parse beginning_schedule <{}>",
                        file.beginning_schedule
                    ));
                    None
                }
            }
        };

        for room in file.lineup.sets.keys() {
            if !file.lineup.rooms.contains(room) {
                problems.push(format!("sets declared for unknown room <{room}>"));
            }
        }

        if !problems.is_empty() {
            return Err(Error::Config(problems.join("\n")));
        }

        let schedule_start = schedule_start
            .ok_or_else(|| Error::Config("missing beginning_schedule".to_string()))?;

        Ok(Config {
            port: file.port,
            allow_input: file.allow_input,
            nb_days_for_input: file.nb_days_for_input,
            restore_from_storage: file.restore_from_storage,
            skip_closed_rooms: file.skip_closed_rooms,
            motd: file.motd,
            old_lineup_message: file.old_lineup_message,
            buttons: file.buttons,
            database_path: if file.database_path.is_empty() {
                "lineup.db".to_string()
            } else {
                file.database_path
            },
            admins: file.admins,
            moderators: file.moderators,
            server_token: file.server_token,
            meta: file.meta,
            lineup: file.lineup,
            schedule_start,
        })
    }

    /// Key under which snapshots for this schedule are stored.
    pub fn schedule_id(&self) -> i64 {
        self.schedule_start.timestamp()
    }
}

/// Accepts RFC 3339 or a naive local `YYYY-MM-DD HH:MM` / `YYYY-MM-DDTHH:MM:SS`.
fn parse_schedule_start(text: &str) -> Option<DateTime<Local>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Local));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return match Local.from_local_datetime(&naive) {
                chrono::LocalResult::Single(t) => Some(t),
                chrono::LocalResult::Ambiguous(t, _) => Some(t),
                chrono::LocalResult::None => None,
            };
        }
    }
    None
}
