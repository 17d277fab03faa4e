//! Admin panel: granting and revoking admin rights.

use crate::core::error::{EngineError, EngineResult, Missing};
use crate::flows::{ActiveFlow, AdminAction, FlowContext, FlowName, FlowState};
use crate::i18n;
use crate::storage::{FieldValue, User};
use crate::telegram::engine::{Ctx, Engine};
use crate::telegram::keyboards;
use crate::telegram::transport::Outgoing;

impl Engine {
    pub(in crate::telegram) fn admin_menu(&self, ctx: &Ctx<'_>) -> Outgoing {
        self.screen(ctx, i18n::t(&self.lang, "admin.menu"), keyboards::admin_menu(&self.lang))
    }

    pub(in crate::telegram) async fn start_admin_change(
        &self,
        ctx: &Ctx<'_>,
        action: AdminAction,
    ) -> EngineResult<Vec<Outgoing>> {
        let context = FlowContext {
            admin_action: Some(action),
            ..FlowContext::default()
        };
        let flow = ActiveFlow::start(FlowName::AdminRoleChange, context);
        self.start_flow(ctx, flow, i18n::t(&self.lang, action_key(action))).await
    }

    /// Last step of the admin flow: check the target, then ask for confirmation.
    pub(in crate::telegram) async fn ask_admin_confirmation(
        &self,
        ctx: &Ctx<'_>,
        flow: ActiveFlow,
    ) -> EngineResult<Vec<Outgoing>> {
        let (action, user_id) = match (
            flow.context.admin_action,
            flow.field("user_id").and_then(FieldValue::as_int),
        ) {
            (Some(action), Some(user_id)) => (action, user_id),
            _ => return Err(EngineError::Internal("admin change without action or user".into())),
        };

        let user = self.require_user(user_id).await?;
        if let Some(reason) = self.pointless_change(ctx, action, &user) {
            self.sessions.clear(ctx.conversation);
            return Ok(vec![self.screen(ctx, reason, keyboards::admin_back(&self.lang))]);
        }

        let key = match action {
            AdminAction::Add => "admin.confirm_add",
            AdminAction::Remove => "admin.confirm_remove",
        };
        let text = i18n::t_with(&self.lang, key, &[("user", describe(&user))]);
        self.sessions.set(ctx.conversation, FlowState::InFlow(flow));
        Ok(vec![self.screen(
            ctx,
            text,
            keyboards::admin_confirm(&self.lang, action, user_id),
        )])
    }

    /// Confirm button; the target is checked again since the button may be old.
    pub(in crate::telegram) async fn confirm_admin_change(
        &self,
        ctx: &Ctx<'_>,
        action: AdminAction,
        user_id: i64,
    ) -> EngineResult<Vec<Outgoing>> {
        let user = self.require_user(user_id).await?;
        if let Some(reason) = self.pointless_change(ctx, action, &user) {
            return Ok(vec![self.screen(ctx, reason, keyboards::admin_back(&self.lang))]);
        }

        let make_admin = action == AdminAction::Add;
        if !self.storage.set_admin_status(user_id, make_admin).await? {
            return Err(EngineError::NotFound(Missing::User(user_id)));
        }
        log::info!(
            "User {} {} admin rights of user {}",
            ctx.auth.user_id(),
            if make_admin { "granted" } else { "revoked" },
            user_id
        );

        let key = match action {
            AdminAction::Add => "admin.added",
            AdminAction::Remove => "admin.removed",
        };
        Ok(vec![self.screen(
            ctx,
            i18n::t_with(&self.lang, key, &[("user", describe(&user))]),
            keyboards::admin_back(&self.lang),
        )])
    }

    async fn require_user(&self, user_id: i64) -> EngineResult<User> {
        self.storage
            .get_user(user_id)
            .await?
            .ok_or(EngineError::NotFound(Missing::User(user_id)))
    }

    /// Why the change would do nothing, if it would.
    fn pointless_change(&self, ctx: &Ctx<'_>, action: AdminAction, user: &User) -> Option<String> {
        let who = [("user", describe(user))];
        match action {
            AdminAction::Remove if user.telegram_id == ctx.auth.user_id() => {
                Some(i18n::t(&self.lang, "admin.cannot_remove_self"))
            }
            AdminAction::Add if user.is_admin => Some(i18n::t_with(&self.lang, "admin.already_admin", &who)),
            AdminAction::Remove if !user.is_admin => Some(i18n::t_with(&self.lang, "admin.not_admin", &who)),
            _ => None,
        }
    }
}

fn action_key(action: AdminAction) -> &'static str {
    match action {
        AdminAction::Add => "admin.add_button",
        AdminAction::Remove => "admin.remove_button",
    }
}

/// `Full Name (@username, 123)`, degrading gracefully.
fn describe(user: &User) -> String {
    let name = user.full_name.as_deref().filter(|name| !name.is_empty());
    match (name, user.username.as_deref()) {
        (Some(name), Some(username)) => format!("{} (@{}, {})", name, username, user.telegram_id),
        (Some(name), None) => format!("{} ({})", name, user.telegram_id),
        (None, Some(username)) => format!("@{} ({})", username, user.telegram_id),
        (None, None) => user.telegram_id.to_string(),
    }
}
