//! Admin gating.
//!
//! The admin flag is read from storage on every call; nothing is cached, so
//! a revoked admin loses access on their very next action.

use std::sync::Arc;

use super::trigger::Trigger;
use crate::core::error::{EngineError, EngineResult};
use crate::storage::Storage;

/// Proof that the role check ran for this update.
///
/// Only [`RoleGuard`] constructs it; privileged code paths take it as a
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorized {
    user_id: i64,
    is_admin: bool,
}

impl Authorized {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Whether admin-only buttons should be offered.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }
}

#[derive(Clone)]
pub struct RoleGuard {
    storage: Arc<dyn Storage>,
}

impl RoleGuard {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Resolves the user's role and rejects admin-only triggers for non-admins.
    ///
    /// Only admin-only triggers fail when the role cannot be read; anything
    /// else proceeds as a non-admin, which merely hides the admin buttons.
    pub async fn authorize(&self, user_id: i64, trigger: &Trigger) -> EngineResult<Authorized> {
        let is_admin = match self.storage.is_admin(user_id).await {
            Ok(is_admin) => is_admin,
            Err(err) if !trigger.requires_admin() => {
                log::warn!("Failed to read the role of user {}, treating as non-admin: {}", user_id, err);
                false
            }
            Err(err) => return Err(err.into()),
        };
        if trigger.requires_admin() && !is_admin {
            log::warn!("⛔ User {} denied {}", user_id, trigger.name());
            return Err(EngineError::PermissionDenied { user_id });
        }
        Ok(Authorized { user_id, is_admin })
    }

    /// Re-checks admin rights right before a flow writes to storage.
    pub async fn authorize_commit(&self, user_id: i64) -> EngineResult<Authorized> {
        if !self.storage.is_admin(user_id).await? {
            log::warn!("⛔ User {} lost admin rights mid-flow", user_id);
            return Err(EngineError::PermissionDenied { user_id });
        }
        Ok(Authorized {
            user_id,
            is_admin: true,
        })
    }
}
