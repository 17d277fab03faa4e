//! Telegram Bot API transport
//!
//! This module contains:
//! - Bot instance creation (custom API server, HTTP timeout)
//! - Conversion of teloxide updates into transport updates
//! - Rendering of keyboards into inline markup

use std::time::Duration;

use async_trait::async_trait;
use reqwest::ClientBuilder;
use secrecy::{ExposeSecret, SecretString};
use teloxide::payloads::{
    AnswerCallbackQuerySetters, DeleteWebhookSetters, EditMessageTextSetters, GetUpdatesSetters, SendMessageSetters,
};
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, BotCommand, CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId as TgMessageId,
    UpdateKind as TgUpdateKind,
};
use teloxide::{ApiError, RequestError};

use super::transport::{
    ButtonAction, ConversationId, Keyboard, MessageId, Sender, Transport, TransportError, Update, UpdateKind,
};

/// Extra HTTP time on top of the long-poll timeout, so the request is not
/// cut off while Telegram is still holding it open.
const HTTP_SLACK: Duration = Duration::from_secs(10);

impl From<RequestError> for TransportError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Network(err) => TransportError::Network(err.to_string()),
            RequestError::Io(err) => TransportError::Network(err.to_string()),
            other => TransportError::Api(other.to_string()),
        }
    }
}

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Creates the bot client, optionally against a custom Bot API server.
    pub fn new(token: &SecretString, api_url: Option<&str>, poll_timeout: Duration) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .timeout(poll_timeout + HTTP_SLACK)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let mut bot = Bot::with_client(token.expose_secret(), client);

        if let Some(api_url) = api_url {
            log::info!("Using custom Bot API URL: {}", api_url);
            let url = url::Url::parse(api_url).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", api_url, e)))?;
            bot = bot.set_api_url(url);
        }

        Ok(Self { bot })
    }
}

fn sender_of(user: &teloxide::types::User) -> Sender {
    Sender {
        id: ChatId::from(user.id).0,
        username: user.username.clone(),
        full_name: user.full_name(),
    }
}

fn unsupported(id: i64) -> Update {
    Update {
        id,
        conversation: ConversationId(0),
        sender: Sender {
            id: 0,
            username: None,
            full_name: String::new(),
        },
        kind: UpdateKind::Unsupported,
    }
}

/// Maps a Bot API update; anything the engine cannot act on becomes
/// [`UpdateKind::Unsupported`] so the offset still moves past it.
fn convert(update: teloxide::types::Update) -> Update {
    let id = i64::from(update.id.0);
    match update.kind {
        TgUpdateKind::Message(msg) => {
            let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
                return unsupported(id);
            };
            Update {
                id,
                conversation: ConversationId(msg.chat.id.0),
                sender: sender_of(user),
                kind: UpdateKind::from_text(text),
            }
        }
        TgUpdateKind::CallbackQuery(q) => {
            let Some(data) = q.data.clone() else {
                return unsupported(id);
            };
            let chat_id = q.message.as_ref().map_or(ChatId::from(q.from.id), |m| m.chat().id);
            Update {
                id,
                conversation: ConversationId(chat_id.0),
                sender: sender_of(&q.from),
                kind: UpdateKind::Callback {
                    query_id: q.id.0.clone(),
                    data,
                    message_id: q.message.as_ref().map(|m| MessageId(m.id().0)),
                },
            }
        }
        _ => unsupported(id),
    }
}

fn markup(keyboard: &Keyboard) -> Result<InlineKeyboardMarkup, TransportError> {
    let rows = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.action {
                    ButtonAction::Callback(data) => Ok(InlineKeyboardButton::callback(button.label.clone(), data.clone())),
                    ButtonAction::Url(url) => url::Url::parse(url)
                        .map(|url| InlineKeyboardButton::url(button.label.clone(), url))
                        .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e))),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(InlineKeyboardMarkup::new(rows))
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn poll(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, TransportError> {
        let offset = i32::try_from(offset).map_err(|_| TransportError::Api(format!("offset {} out of range", offset)))?;
        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX))
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
            .await?;
        Ok(updates.into_iter().map(convert).collect())
    }

    async fn send(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let mut request = self.bot.send_message(ChatId(conversation.0), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(markup(keyboard)?);
        }
        let message = request.await?;
        Ok(MessageId(message.id.0))
    }

    async fn edit_message(
        &self,
        conversation: ConversationId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(conversation.0), TgMessageId(message_id.0), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(markup(keyboard)?);
        }
        match request.await {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => {
                log::debug!("Message {} in {} not modified", message_id.0, conversation);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>, alert: bool) -> Result<(), TransportError> {
        let mut request = self.bot.answer_callback_query(CallbackQueryId(query_id.to_string()));
        if let Some(text) = text {
            request = request.text(text).show_alert(alert);
        }
        request.await?;
        Ok(())
    }

    async fn reset_pending(&self) -> Result<(), TransportError> {
        self.bot.delete_webhook().drop_pending_updates(true).await?;
        log::info!("Webhook removed, pending updates dropped");
        Ok(())
    }

    async fn set_commands(&self, commands: &[(String, String)]) -> Result<(), TransportError> {
        let commands: Vec<BotCommand> = commands
            .iter()
            .map(|(name, description)| BotCommand::new(name.clone(), description.clone()))
            .collect();
        self.bot.set_my_commands(commands).await?;
        Ok(())
    }
}
