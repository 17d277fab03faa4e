//! Chat side of the bot: transport, routing, screens and the update loop.

pub mod bot;
pub mod cards;
pub mod dispatcher;
pub mod engine;
pub mod guard;
mod handlers;
pub mod keyboards;
pub mod transport;
pub mod trigger;

pub use bot::TelegramTransport;
pub use dispatcher::Dispatcher;
pub use engine::Engine;
pub use guard::{Authorized, RoleGuard};
pub use transport::{
    Button, ButtonAction, ConversationId, Keyboard, MessageId, Outgoing, Sender, Transport, TransportError, Update,
    UpdateKind,
};
pub use trigger::Trigger;
