//! Fleetbot - Telegram bot for vehicle fleet bookkeeping
//!
//! Operators keep track of maintenance, repairs, refueling and mileage of
//! their vehicles through guided chat dialogs.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and input validation
//! - `storage`: the storage interface and its SQLite implementation
//! - `flows`: flow definitions, flow state and the session store
//! - `telegram`: transport, keyboards, the conversational engine and the dispatcher

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod flows;
pub mod i18n;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, EngineError};
pub use flows::{FlowState, SessionStore};
pub use storage::{SqliteStorage, Storage};
pub use telegram::{Dispatcher, Engine, Transport};
