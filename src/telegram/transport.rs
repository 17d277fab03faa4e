//! Chat transport abstraction.
//!
//! The engine only sees these types; [`super::bot::TelegramTransport`] maps
//! them onto the Bot API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Stable id of a chat; all updates of one conversation share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    /// `/name args`; the name is lowercase without the leading slash or `@bot` suffix.
    Command { name: String, args: String },
    Text(String),
    Callback {
        query_id: String,
        data: String,
        /// Message the pressed button belongs to, if it is still accessible.
        message_id: Option<MessageId>,
    },
    /// Anything else (stickers, edits, media); only advances the offset.
    Unsupported,
}

/// One inbound chat event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Monotonic, transport-assigned.
    pub id: i64,
    pub conversation: ConversationId,
    pub sender: Sender,
    pub kind: UpdateKind,
}

impl UpdateKind {
    /// Parses message text, splitting off commands.
    pub fn from_text(text: &str) -> Self {
        let Some(command) = text.strip_prefix('/') else {
            return Self::Text(text.to_string());
        };
        let (head, args) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        Self::Command {
            name,
            args: args.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// Inline keyboard: rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn button(self, button: Button) -> Self {
        self.row(vec![button])
    }

    /// Callback data of every button, row by row.
    pub fn callbacks(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().filter_map(|b| match &b.action {
            ButtonAction::Callback(data) => Some(data.as_str()),
            ButtonAction::Url(_) => None,
        })
    }
}

/// A reply produced by the engine for the update being handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// New message in the conversation.
    Send { text: String, keyboard: Option<Keyboard> },
    /// Replace the message the pressed button belongs to; sent as a new
    /// message when there is none.
    Edit { text: String, keyboard: Option<Keyboard> },
    /// Toast (or alert) acknowledging a button press.
    Notice { text: String, alert: bool },
}

impl Outgoing {
    pub fn send(text: impl Into<String>, keyboard: Option<Keyboard>) -> Self {
        Self::Send {
            text: text.into(),
            keyboard,
        }
    }

    pub fn edit(text: impl Into<String>, keyboard: Option<Keyboard>) -> Self {
        Self::Edit {
            text: text.into(),
            keyboard,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Send { text, .. } | Self::Edit { text, .. } | Self::Notice { text, .. } => text,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Self::Send { keyboard, .. } | Self::Edit { keyboard, .. } => keyboard.as_ref(),
            Self::Notice { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("API error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Chat transport used by the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Long-polls for updates with `id >= offset`, waiting up to `timeout`.
    async fn poll(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, TransportError>;

    async fn send(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    /// Edits a message; an unchanged message is not an error.
    async fn edit_message(
        &self,
        conversation: ConversationId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    async fn answer_callback(&self, query_id: &str, text: Option<&str>, alert: bool) -> Result<(), TransportError>;

    /// Drops the webhook and any backlog accumulated while the bot was down.
    async fn reset_pending(&self) -> Result<(), TransportError>;

    /// Registers the command menu shown by the client.
    async fn set_commands(&self, commands: &[(String, String)]) -> Result<(), TransportError>;
}
