//! Scripted transport: polls replay a fixed script, deliveries are recorded.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fleetbot::telegram::{ConversationId, Keyboard, MessageId, Transport, TransportError, Update};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Send {
        conversation: ConversationId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        conversation: ConversationId,
        message_id: MessageId,
        text: String,
    },
    Answer {
        query_id: String,
        text: Option<String>,
        alert: bool,
    },
}

impl Delivery {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Send { text, .. } | Self::Edit { text, .. } => Some(text),
            Self::Answer { text, .. } => text.as_deref(),
        }
    }
}

/// Replays `script` one batch per poll; once it runs dry the shutdown token
/// is cancelled and polling blocks.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<Vec<Update>, TransportError>>>,
    offsets: Mutex<Vec<i64>>,
    deliveries: Mutex<Vec<Delivery>>,
    next_message: AtomicI32,
    fail_edits: AtomicBool,
    shutdown: CancellationToken,
}

impl MockTransport {
    pub fn new(script: Vec<Result<Vec<Update>, TransportError>>, shutdown: CancellationToken) -> Self {
        Self {
            script: Mutex::new(script.into()),
            offsets: Mutex::new(Vec::new()),
            deliveries: Mutex::new(Vec::new()),
            next_message: AtomicI32::new(1),
            fail_edits: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    /// Offsets passed to each poll.
    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| matches!(d, Delivery::Answer { .. }))
            .collect()
    }

    fn push(&self, delivery: Delivery) {
        self.deliveries.lock().unwrap().push(delivery);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn poll(&self, offset: i64, _timeout: Duration) -> Result<Vec<Update>, TransportError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                self.shutdown.cancel();
                std::future::pending().await
            }
        }
    }

    async fn send(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        self.push(Delivery::Send {
            conversation,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(MessageId(self.next_message.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_message(
        &self,
        conversation: ConversationId,
        message_id: MessageId,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(TransportError::Api("message to edit not found".into()));
        }
        self.push(Delivery::Edit {
            conversation,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>, alert: bool) -> Result<(), TransportError> {
        self.push(Delivery::Answer {
            query_id: query_id.to_string(),
            text: text.map(str::to_string),
            alert,
        });
        Ok(())
    }

    async fn reset_pending(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn set_commands(&self, _commands: &[(String, String)]) -> Result<(), TransportError> {
        Ok(())
    }
}
