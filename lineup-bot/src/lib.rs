//! # Lineup Bot Library (lineup-bot)
//!
//! Chat-driven festival lineup manager.
//!
//! **Purpose:** Keep one canonical timetable per schedule, let users view it
//! in several renderings, collect proposed changes through a guided dialog,
//! and route those changes through a moderated merge-request workflow. A
//! small REST API serves the schedule to the web frontend.
//!
//! **Architecture:** One mutex around all bot state; a command dispatcher
//! in front of it; pure helpers (timetable, dialog machine, fuzzy matching,
//! merge diffing) underneath.

pub mod dispatcher;
pub mod fuzzy;
pub mod inputs;
pub mod merge;
pub mod server;
pub mod timetable;
pub mod users;

pub use dispatcher::{Dispatcher, OutboundMessage};
pub use timetable::Timetable;
