use thiserror::Error;

use crate::core::validation::ValidationError;
use crate::storage::StorageError;

/// Something the user referenced no longer exists.
///
/// Carries enough context for the engine to send the user back to the
/// closest surviving parent menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Vehicle(i64),
    Repair { record_id: i64, vehicle_id: Option<i64> },
    Maintenance { record_id: i64, vehicle_id: Option<i64> },
    User(i64),
}

/// Errors raised while handling a single update.
///
/// Every variant is caught at the dispatcher boundary and converted into a
/// user-facing message; none of them stops the update loop.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad user input. Recoverable: the same step is prompted again.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The acting user is not allowed to run an admin-only trigger.
    #[error("user {user_id} is not allowed to do this")]
    PermissionDenied { user_id: i64 },

    /// A referenced vehicle, record or user vanished.
    #[error("not found: {0:?}")]
    NotFound(Missing),

    /// A storage call failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// A broken invariant inside the engine (e.g. a completed flow missing a field).
    #[error("internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors of the startup path
///
/// Handler errors use [`EngineError`] instead.
#[derive(Error, Debug)]
pub enum AppError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logger setup errors
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
