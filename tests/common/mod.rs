//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

pub mod storage;
pub mod transport;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use fleetbot::config::Config;
use fleetbot::telegram::{ConversationId, MessageId, Outgoing, Sender, Update, UpdateKind};
use fleetbot::{Engine, FlowState};

pub use storage::{vehicle, MockStorage};
pub use transport::{Delivery, MockTransport};

pub const ADMIN: i64 = 100;
pub const DRIVER: i64 = 200;

pub fn date(d: u32, m: u32, y: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// English messages, so assertions can match on text.
pub fn test_config() -> Config {
    Config {
        language: "en".to_string(),
        ..Config::default()
    }
}

pub fn sender(user_id: i64) -> Sender {
    Sender {
        id: user_id,
        username: Some(format!("user{}", user_id)),
        full_name: format!("User {}", user_id),
    }
}

/// Private chats: the conversation id is the user id.
pub fn update(id: i64, user_id: i64, kind: UpdateKind) -> Update {
    Update {
        id,
        conversation: ConversationId(user_id),
        sender: sender(user_id),
        kind,
    }
}

pub fn text_update(id: i64, user_id: i64, text: &str) -> Update {
    update(id, user_id, UpdateKind::from_text(text))
}

pub fn press_update(id: i64, user_id: i64, data: &str) -> Update {
    update(
        id,
        user_id,
        UpdateKind::Callback {
            query_id: format!("q{}", id),
            data: data.to_string(),
            message_id: Some(MessageId(77)),
        },
    )
}

/// Engine over a [`MockStorage`] seeded with one admin and one driver.
pub struct Harness {
    pub engine: Engine,
    pub storage: Arc<MockStorage>,
    next_update: AtomicI64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let storage = Arc::new(MockStorage::new());
        storage.insert_user(ADMIN, "Anna Admin", true);
        storage.insert_user(DRIVER, "Dmitry Driver", false);
        let engine = Engine::new(storage.clone(), &config);
        Self {
            engine,
            storage,
            next_update: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_update.fetch_add(1, Ordering::SeqCst)
    }

    /// Sends a text message (or command) as `user_id`.
    pub async fn say(&self, user_id: i64, text: &str) -> Vec<Outgoing> {
        self.engine.handle(&text_update(self.next_id(), user_id, text)).await
    }

    /// Presses a button carrying `data` as `user_id`.
    pub async fn press(&self, user_id: i64, data: &str) -> Vec<Outgoing> {
        self.engine.handle(&press_update(self.next_id(), user_id, data)).await
    }

    pub fn state(&self, user_id: i64) -> FlowState {
        self.engine.state(ConversationId(user_id))
    }
}

/// All reply texts joined, for substring assertions.
pub fn texts(replies: &[Outgoing]) -> String {
    replies.iter().map(Outgoing::text).collect::<Vec<_>>().join("\n---\n")
}

/// Callback data of every button in every reply.
pub fn callbacks(replies: &[Outgoing]) -> Vec<String> {
    replies
        .iter()
        .filter_map(Outgoing::keyboard)
        .flat_map(|k| k.callbacks().map(str::to_string).collect::<Vec<_>>())
        .collect()
}
