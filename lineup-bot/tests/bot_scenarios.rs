//! End-to-end dispatcher scenarios: guided input, merge requests,
//! moderation and the draft/canonical split.

use chrono::{DateTime, Duration, Local};
use lineup_bot::dispatcher::{Dispatcher, OutboundMessage};
use lineup_common::config::Config;
use lineup_common::storage::{MemoryStorage, Storage};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

const CONFIG: &str = r#"
port = 8080
allow_input = true
nb_days_for_input = 3
beginning_schedule = "2026-08-21 16:00"
admins = [1]
moderators = [2]
buttons = ["now", "Help"]

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
"#;

const ALICE: i64 = 10;
const BYSTANDER: i64 = 11;
const MODO: i64 = 2;

struct Harness {
    dispatcher: Arc<Dispatcher>,
    outbound: UnboundedReceiver<OutboundMessage>,
    now: DateTime<Local>,
}

impl Harness {
    async fn new() -> Harness {
        Harness::with_config(CONFIG).await
    }

    async fn with_config(text: &str) -> Harness {
        let config = Config::parse(text).unwrap();
        let now = config.schedule_start;
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(config, Arc::new(MemoryStorage::new()), tx, now)
            .await
            .unwrap();
        Harness {
            dispatcher: Arc::new(dispatcher),
            outbound: rx,
            now,
        }
    }

    async fn send(&self, user_id: i64, text: &str) -> String {
        let replies = self
            .dispatcher
            .process_command_at(user_id, text, &format!("user{user_id}"), self.now)
            .await;
        replies
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Everything sent through the side channel so far.
    fn drain_outbound(&mut self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.outbound.try_recv() {
            messages.push(message);
        }
        messages
    }

    async fn enter_draft_set(&self, user_id: i64) {
        self.send(user_id, "input").await;
        self.send(user_id, "🌴 Grove").await;
        self.send(user_id, "Sat").await;
        self.send(user_id, "12:00").await;
        self.send(user_id, "DJ").await;
        self.send(user_id, "120").await;
        let reply = self.send(user_id, "validate").await;
        assert!(reply.contains("Validated"), "{reply}");
    }
}

#[tokio::test]
async fn guided_input_builds_a_private_draft() {
    let mut harness = Harness::new().await;
    harness.enter_draft_set(ALICE).await;

    let full = harness.send(ALICE, "p").await;
    assert!(full.contains("12:00 DJ 🌴 Grove"), "{full}");
    assert!(full.contains("modified version of the lineup"), "{full}");

    // Another user still sees the canonical lineup.
    let other = harness.send(BYSTANDER, "p").await;
    assert!(!other.contains("DJ 🌴 Grove"), "{other}");
    assert!(!other.contains("modified version"), "{other}");

    // Admins were told about the applied entry.
    let admin_messages = harness.drain_outbound();
    assert!(
        admin_messages
            .iter()
            .any(|m| m.user_id == 1 && m.text.contains("#admin added")),
        "{admin_messages:?}"
    );
}

#[tokio::test]
async fn submitting_a_merge_request_notifies_moderators() {
    let mut harness = Harness::new().await;
    harness.enter_draft_set(ALICE).await;
    harness.drain_outbound();

    let reply = harness.send(ALICE, "merge").await;
    assert!(reply.contains("+ Sat 12:00 to 14:00 DJ"), "{reply}");
    assert!(reply.contains("Submit"), "{reply}");

    let reply = harness.send(ALICE, "Submit").await;
    assert!(reply.contains("sent to moderation"), "{reply}");
    assert!(reply.contains("(#0)"), "{reply}");

    // Draft is gone: the user views the canonical lineup again.
    let full = harness.send(ALICE, "p").await;
    assert!(!full.contains("modified version"), "{full}");

    let side = harness.drain_outbound();
    assert!(
        side.iter()
            .any(|m| m.user_id == MODO && m.text.contains("new merge request #0")),
        "{side:?}"
    );
}

#[tokio::test]
async fn merge_without_a_draft_is_refused() {
    let harness = Harness::new().await;
    let reply = harness.send(ALICE, "merge").await;
    assert!(reply.contains("nothing to merge"), "{reply}");
}

#[tokio::test]
async fn accepting_a_rebase_updates_the_canonical_lineup() {
    let mut harness = Harness::new().await;
    harness.enter_draft_set(ALICE).await;
    harness.send(ALICE, "merge").await;
    harness.send(ALICE, "Submit").await;
    harness.drain_outbound();

    let preview = harness.send(MODO, "rebase").await;
    assert!(preview.contains("Merge request 0 from user10"), "{preview}");
    assert!(preview.contains("+ Sat 12:00 to 14:00 DJ"), "{preview}");

    let reply = harness.send(MODO, "accept").await;
    assert!(reply.contains("rebased on master"), "{reply}");
    assert!(reply.contains("No more merge request pending"), "{reply}");

    // Everyone now sees the merged slot, with no draft banner.
    let full = harness.send(BYSTANDER, "p").await;
    assert!(full.contains("12:00 DJ 🌴 Grove"), "{full}");
    assert!(!full.contains("modified version"), "{full}");

    let side = harness.drain_outbound();
    assert!(
        side.iter().any(|m| m.user_id == ALICE
            && m.text.contains("merge request #0 has been accepted by user2")),
        "{side:?}"
    );
}

#[tokio::test]
async fn refusing_a_rebase_drops_the_request_and_tells_the_requester() {
    let mut harness = Harness::new().await;
    harness.enter_draft_set(ALICE).await;
    harness.send(ALICE, "merge").await;
    harness.send(ALICE, "Submit").await;
    harness.drain_outbound();

    harness.send(MODO, "rebase").await;
    let reply = harness.send(MODO, "refuse").await;
    assert!(reply.contains("refused"), "{reply}");
    assert!(reply.contains("No more merge request pending"), "{reply}");

    let full = harness.send(BYSTANDER, "p").await;
    assert!(!full.contains("DJ 🌴 Grove"), "{full}");

    let side = harness.drain_outbound();
    assert!(
        side.iter()
            .any(|m| m.user_id == ALICE && m.text.contains("has been refused")),
        "{side:?}"
    );
}

#[tokio::test]
async fn duplicate_merge_request_is_rejected() {
    let mut harness = Harness::new().await;
    harness.enter_draft_set(ALICE).await;
    harness.send(ALICE, "merge").await;
    harness.send(ALICE, "Submit").await;

    harness.enter_draft_set(BYSTANDER).await;
    harness.send(BYSTANDER, "merge").await;
    let reply = harness.send(BYSTANDER, "Submit").await;
    assert!(reply.contains("Similar merge request already pending"), "{reply}");

    // The rejected draft survives for further editing.
    let full = harness.send(BYSTANDER, "p").await;
    assert!(full.contains("modified version"), "{full}");
    harness.drain_outbound();
}

#[tokio::test]
async fn rebase_for_non_moderator_falls_through_to_lookup() {
    let harness = Harness::new().await;
    let reply = harness.send(ALICE, "rebase").await;
    assert!(!reply.contains("Accept or refuse"), "{reply}");
}

#[tokio::test]
async fn rebase_with_empty_queue_says_so() {
    let harness = Harness::new().await;
    let reply = harness.send(MODO, "rebase").await;
    assert!(reply.contains("No merge requests to rebase."), "{reply}");
}

#[tokio::test]
async fn free_text_finds_rooms_and_djs() {
    let harness = Harness::new().await;
    let reply = harness.send(ALICE, "beach").await;
    assert!(reply.contains("Lineup in 🌞 Beach"), "{reply}");

    let reply = harness.send(ALICE, "madmoiselle").await;
    assert!(reply.contains("MADmoiselle is playing"), "{reply}");

    let reply = harness.send(ALICE, "ab").await;
    assert!(reply.contains("more than 2 characters"), "{reply}");
}

#[tokio::test]
async fn notification_toggle_changes_buttons() {
    let harness = Harness::new().await;
    let replies = harness
        .dispatcher
        .process_command_at(ALICE, "🔴", "user10", harness.now)
        .await;
    assert!(replies[0].text.contains("stopped"), "{replies:?}");
    let buttons = replies[0].buttons.clone().unwrap();
    assert!(buttons.contains(&"🟢".to_string()), "{buttons:?}");

    let replies = harness
        .dispatcher
        .process_command_at(ALICE, "🟢", "user10", harness.now)
        .await;
    assert!(replies[0].text.contains("enabled"), "{replies:?}");
    let buttons = replies[0].buttons.clone().unwrap();
    assert!(buttons.contains(&"🔴".to_string()), "{buttons:?}");
}

#[tokio::test]
async fn sweep_announces_set_starts_to_subscribers() {
    let mut harness = Harness::new().await;
    harness.send(ALICE, "start").await;
    harness.drain_outbound();

    harness
        .dispatcher
        .sweep(harness.now + Duration::hours(8))
        .await;
    let side = harness.drain_outbound();
    assert!(
        side.iter()
            .any(|m| m.user_id == ALICE && m.text.contains("MADmoiselle started in 🌞 Beach")),
        "{side:?}"
    );

    // Draining again announces nothing new.
    harness
        .dispatcher
        .sweep(harness.now + Duration::hours(8))
        .await;
    let side = harness.drain_outbound();
    assert!(
        !side.iter().any(|m| m.text.contains("MADmoiselle started")),
        "{side:?}"
    );
}

#[tokio::test]
async fn cancelled_dialog_leaves_no_draft() {
    let harness = Harness::new().await;
    harness.send(ALICE, "input").await;
    harness.send(ALICE, "🌴 Grove").await;
    let reply = harness.send(ALICE, "🔴").await;
    assert!(reply.contains("Cancelled"), "{reply}");
    let full = harness.send(ALICE, "p").await;
    assert!(!full.contains("modified version"), "{full}");
}

/// Storage where every operation fails, as when the database file is gone.
struct BrokenStorage;

#[async_trait::async_trait]
impl Storage for BrokenStorage {
    async fn save_snapshot(&self, _schedule_id: i64, _blob: &str) -> lineup_common::Result<()> {
        Err(std::io::Error::other("disk full").into())
    }

    async fn load_snapshot(&self, _schedule_id: i64) -> lineup_common::Result<Option<String>> {
        Err(std::io::Error::other("disk full").into())
    }

    async fn save_log(&self, _text: &str) -> lineup_common::Result<()> {
        Err(std::io::Error::other("disk full").into())
    }

    async fn load_log(&self) -> lineup_common::Result<Option<String>> {
        Err(std::io::Error::other("disk full").into())
    }
}

#[tokio::test]
async fn startup_survives_a_failing_snapshot_save() {
    let config = Config::parse(CONFIG).unwrap();
    let now = config.schedule_start;
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(config, Arc::new(BrokenStorage), tx, now)
        .await
        .unwrap();

    // In-memory state is authoritative: the bot still answers.
    let replies = dispatcher
        .process_command_at(ALICE, "now", "user10", now)
        .await;
    assert!(replies[0].text.contains("🌞 Beach"), "{replies:?}");
}

#[tokio::test]
async fn stale_rebase_review_resets_when_queue_empties() {
    let second_modo = 3;
    let mut harness =
        Harness::with_config(&CONFIG.replace("moderators = [2]", "moderators = [2, 3]")).await;
    harness.enter_draft_set(ALICE).await;
    harness.send(ALICE, "merge").await;
    harness.send(ALICE, "Submit").await;

    // Both moderators open the review, the second one drains the queue.
    harness.send(MODO, "rebase").await;
    harness.send(second_modo, "rebase").await;
    harness.send(second_modo, "accept").await;
    harness.drain_outbound();

    // The first moderator's next input routes to the stale dialog once,
    // then the dialog is gone and commands work again.
    let reply = harness.send(MODO, "now").await;
    assert!(reply.contains("No merge requests to rebase."), "{reply}");
    let reply = harness.send(MODO, "now").await;
    assert!(reply.contains("🌞 Beach"), "{reply}");
}

#[tokio::test]
async fn snapshot_restores_canonical_and_queue_across_restart() {
    let storage = Arc::new(MemoryStorage::new());
    let mut config = Config::parse(CONFIG).unwrap();
    config.restore_from_storage = true;
    let now = config.schedule_start;

    {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(config.clone(), Arc::clone(&storage) as _, tx, now)
            .await
            .unwrap();
        let dispatcher = Arc::new(dispatcher);
        for step in ["input", "🌴 Grove", "Sat", "12:00", "DJ", "120", "validate", "merge", "Submit"] {
            dispatcher.process_command_at(ALICE, step, "alice", now).await;
        }
        // Snapshot saves are spawned; let them land.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let restarted = Dispatcher::new(config, Arc::clone(&storage) as _, tx, now)
        .await
        .unwrap();
    let reply = restarted
        .process_command_at(MODO, "rebase", "modo", now)
        .await;
    assert!(
        reply[0].text.contains("Merge request 0 from alice"),
        "{reply:?}"
    );
}
