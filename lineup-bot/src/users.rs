//! User registry
//!
//! Tracks every chat id the bot has seen, whether the user wants set-start
//! notifications, and whether they blocked the bot (kept as deleted rather
//! than removed, so returning users keep their id). Lives inside the bot
//! state and is persisted with the snapshot.

use lineup_common::snapshot::UserRecord;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct User {
    notifications: bool,
    deleted: bool,
    new_user: bool,
}

#[derive(Debug, Default)]
pub struct UserRegistry {
    users: BTreeMap<i64, User>,
}

impl UserRegistry {
    pub fn new() -> UserRegistry {
        UserRegistry::default()
    }

    pub fn exists(&self, user_id: i64) -> bool {
        self.users.contains_key(&user_id)
    }

    /// Register a user on first contact. Notifications default to on.
    /// Returns true when the user was not known before.
    pub fn ensure_exists(&mut self, user_id: i64) -> bool {
        if let Some(user) = self.users.get_mut(&user_id) {
            if user.deleted {
                user.deleted = false;
            }
            return false;
        }
        self.users.insert(
            user_id,
            User {
                notifications: true,
                deleted: false,
                new_user: true,
            },
        );
        true
    }

    pub fn set_new(&mut self, user_id: i64, new_user: bool) {
        if let Some(user) = self.users.get_mut(&user_id) {
            user.new_user = new_user;
        }
    }

    pub fn set_notifications(&mut self, user_id: i64, enabled: bool) {
        if let Some(user) = self.users.get_mut(&user_id) {
            user.notifications = enabled;
        }
    }

    pub fn has_notifications(&self, user_id: i64) -> bool {
        self.users
            .get(&user_id)
            .map(|u| u.notifications && !u.deleted)
            .unwrap_or(false)
    }

    /// Mark a user as gone after a failed delivery.
    pub fn mark_deleted(&mut self, user_id: i64) {
        if let Some(user) = self.users.get_mut(&user_id) {
            user.deleted = true;
        }
    }

    /// Ids of every live user with notifications enabled.
    pub fn with_notifications(&self) -> Vec<i64> {
        self.users
            .iter()
            .filter(|(_, u)| u.notifications && !u.deleted)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Count of users who never blocked the bot.
    pub fn live_count(&self) -> usize {
        self.users.values().filter(|u| !u.deleted).count()
    }

    /// (new, total live, deleted, notifications on), for the admin log view.
    pub fn stats(&self) -> (usize, usize, usize, usize) {
        let new = self.users.values().filter(|u| u.new_user && !u.deleted).count();
        let total = self.live_count();
        let deleted = self.users.values().filter(|u| u.deleted).count();
        let notifications = self.with_notifications().len();
        (new, total, deleted, notifications)
    }

    pub fn to_records(&self) -> Vec<UserRecord> {
        self.users
            .iter()
            .map(|(id, u)| UserRecord {
                user_id: *id,
                notifications: u.notifications,
                deleted: u.deleted,
                new_user: u.new_user,
            })
            .collect()
    }

    pub fn from_records(records: Vec<UserRecord>) -> UserRegistry {
        let users = records
            .into_iter()
            .map(|r| {
                (
                    r.user_id,
                    User {
                        notifications: r.notifications,
                        deleted: r.deleted,
                        new_user: r.new_user,
                    },
                )
            })
            .collect();
        UserRegistry { users }
    }
}
