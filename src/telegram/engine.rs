//! The conversational engine: one update in, the replies out.
//!
//! The engine owns the per-conversation flow state and never talks to the
//! transport itself; the dispatcher delivers what [`Engine::handle`] returns.
//! Every handler error is converted into a reply here, so a failing update
//! never reaches the update loop.

use std::sync::Arc;

use unic_langid::LanguageIdentifier;

use super::guard::{Authorized, RoleGuard};
use super::keyboards;
use super::transport::{ConversationId, Keyboard, Outgoing, Sender, Update, UpdateKind};
use super::trigger::Trigger;
use crate::core::config::Config;
use crate::core::error::{EngineError, EngineResult, Missing};
use crate::flows::{AdminAction, FlowState, SessionStore};
use crate::i18n;
use crate::storage::Storage;

/// Per-update context shared by the handlers.
pub(super) struct Ctx<'a> {
    pub conversation: ConversationId,
    pub sender: &'a Sender,
    /// The update is a button press; screens replace the pressed message.
    pub from_button: bool,
    pub auth: Authorized,
}

pub struct Engine {
    pub(super) storage: Arc<dyn Storage>,
    pub(super) sessions: SessionStore,
    pub(super) guard: RoleGuard,
    pub(super) lang: LanguageIdentifier,
    pub(super) page_size: usize,
    pub(super) help_url: Option<String>,
}

impl Engine {
    pub fn new(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self {
            guard: RoleGuard::new(Arc::clone(&storage)),
            storage,
            sessions: SessionStore::new(config.dispatch.flow_idle_timeout()),
            lang: i18n::lang_from_code(&config.language),
            page_size: config.history_page_size,
            help_url: config.help_url.clone(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Current dialog state of a conversation.
    pub fn state(&self, conversation: ConversationId) -> FlowState {
        self.sessions.get(conversation)
    }

    /// Commands for the client's command menu.
    pub fn command_menu(&self) -> Vec<(String, String)> {
        ["start", "help", "cancel", "admin"]
            .into_iter()
            .map(|name| (name.to_string(), i18n::t(&self.lang, &format!("command.{}", name))))
            .collect()
    }

    /// Handles one update; never fails.
    pub async fn handle(&self, update: &Update) -> Vec<Outgoing> {
        let trigger = Trigger::from_update(&update.kind);
        let from_button = matches!(update.kind, UpdateKind::Callback { .. });
        log::debug!(
            "Update {} from user {} in {}: {}",
            update.id,
            update.sender.id,
            update.conversation,
            trigger.name()
        );

        match self.route(update, &trigger, from_button).await {
            Ok(replies) => replies,
            Err(err) => self.render_error(update.conversation, from_button, err).await,
        }
    }

    async fn route(&self, update: &Update, trigger: &Trigger, from_button: bool) -> EngineResult<Vec<Outgoing>> {
        if *trigger == Trigger::Unsupported {
            return Ok(Vec::new());
        }

        // The guard runs before any state change: a denied trigger leaves the flow alone
        let auth = self.guard.authorize(update.sender.id, trigger).await?;

        let previous = self.sessions.get(update.conversation);
        if trigger.leaves_flow() {
            if let Some(flow) = previous.active() {
                log::debug!("Conversation {} leaves {:?}", update.conversation, flow.flow);
                self.sessions.clear(update.conversation);
            }
        }

        let ctx = Ctx {
            conversation: update.conversation,
            sender: &update.sender,
            from_button,
            auth,
        };

        match trigger {
            Trigger::Start => self.on_start(&ctx).await,
            Trigger::Help => Ok(self.on_help(&ctx)),
            Trigger::CancelCommand => self.on_cancel_command(&ctx, &previous).await,
            Trigger::AdminCommand | Trigger::AdminMenu => Ok(vec![self.admin_menu(&ctx)]),
            Trigger::UnknownCommand(name) => {
                log::debug!("Unknown command /{}", name);
                Ok(vec![Outgoing::send(
                    i18n::t(&self.lang, "error.unknown_command"),
                    Some(keyboards::back_to_main(&self.lang)),
                )])
            }
            Trigger::Text(text) => self.on_text(&ctx, previous, text).await,
            Trigger::BackToMain => self.main_menu(&ctx).await.map(|screen| vec![screen]),
            Trigger::Cancel => self.on_cancel(&ctx, &previous).await,
            Trigger::Noop => Ok(Vec::new()),
            Trigger::SkipStep => self.on_skip(&ctx, previous).await,
            Trigger::AddVehicle => self.start_vehicle_creation(&ctx).await,
            Trigger::ShowVehicle(vehicle_id) => self.vehicle_screen(&ctx, *vehicle_id).await.map(|s| vec![s]),
            Trigger::UpdateMileage(vehicle_id) => self.start_mileage_update(&ctx, *vehicle_id).await,
            Trigger::ConfirmMileage { vehicle_id, mileage } => {
                self.confirm_mileage(&ctx, *vehicle_id, *mileage).await
            }
            Trigger::ShowMaintenance { vehicle_id, page } => {
                self.maintenance_screen(&ctx, *vehicle_id, *page).await.map(|s| vec![s])
            }
            Trigger::AddMaintenance(vehicle_id) => self.start_maintenance(&ctx, *vehicle_id).await,
            Trigger::EditMaintenance(record_id) => self.start_maintenance_edit(&ctx, *record_id).await,
            Trigger::AddRepair(vehicle_id) => self.start_repair(&ctx, *vehicle_id).await,
            Trigger::ManageRepairs(vehicle_id) => self.repairs_screen(&ctx, *vehicle_id).await.map(|s| vec![s]),
            Trigger::ShowRepair(record_id) => self.repair_screen(&ctx, *record_id).await.map(|s| vec![s]),
            Trigger::EditRepair(record_id) => self.start_repair_edit(&ctx, *record_id).await,
            Trigger::DeleteRepair(record_id) => self.ask_delete_repair(&ctx, *record_id).await,
            Trigger::ConfirmDeleteRepair(record_id) => self.delete_repair(&ctx, *record_id).await,
            Trigger::AddRefueling(vehicle_id) => self.start_refueling(&ctx, *vehicle_id).await,
            Trigger::ShowFuelStats(vehicle_id) => self.fuel_screen(&ctx, *vehicle_id).await.map(|s| vec![s]),
            Trigger::EditFuel(vehicle_id) => self.start_fuel_edit(&ctx, *vehicle_id).await,
            Trigger::EditVehicle(vehicle_id) => self.field_picklist(&ctx, *vehicle_id).await.map(|s| vec![s]),
            Trigger::EditField { vehicle_id, field } => self.start_field_edit(&ctx, *vehicle_id, *field).await,
            Trigger::AdminAdd => self.start_admin_change(&ctx, AdminAction::Add).await,
            Trigger::AdminRemove => self.start_admin_change(&ctx, AdminAction::Remove).await,
            Trigger::AdminConfirm { action, user_id } => self.confirm_admin_change(&ctx, *action, *user_id).await,
            Trigger::Unknown(data) => {
                log::debug!("Stale callback data '{}'", data);
                Ok(vec![Outgoing::Notice {
                    text: i18n::t(&self.lang, "error.stale_button"),
                    alert: false,
                }])
            }
            Trigger::Unsupported => Ok(Vec::new()),
        }
    }

    /// A full-screen reply: replaces the pressed message, or is sent anew.
    pub(super) fn screen(&self, ctx: &Ctx<'_>, text: String, keyboard: Keyboard) -> Outgoing {
        screen(ctx.from_button, text, keyboard)
    }

    async fn render_error(&self, conversation: ConversationId, from_button: bool, err: EngineError) -> Vec<Outgoing> {
        match err {
            EngineError::Validation(err) => {
                log::debug!("Rejected input in {}: {}", conversation, err);
                let label = err.label().unwrap_or_default().to_string();
                vec![Outgoing::send(
                    i18n::t_with(&self.lang, err.message_key(), &[("label", label)]),
                    None,
                )]
            }
            EngineError::PermissionDenied { .. } => {
                let text = i18n::t(&self.lang, "error.permission_denied");
                if from_button {
                    vec![Outgoing::Notice { text, alert: true }]
                } else {
                    vec![Outgoing::send(text, None)]
                }
            }
            EngineError::NotFound(missing) => {
                log::info!("Conversation {} referenced a missing {:?}", conversation, missing);
                self.sessions.clear(conversation);
                let (key, keyboard) = match missing {
                    Missing::Vehicle(_) => ("error.vehicle_not_found", self.fallback_main_menu().await),
                    Missing::Repair {
                        vehicle_id: Some(vehicle_id),
                        ..
                    }
                    | Missing::Maintenance {
                        vehicle_id: Some(vehicle_id),
                        ..
                    } => ("error.record_not_found", keyboards::back_to_vehicle(&self.lang, vehicle_id)),
                    Missing::Repair { vehicle_id: None, .. } | Missing::Maintenance { vehicle_id: None, .. } => {
                        ("error.record_not_found", keyboards::back_to_main(&self.lang))
                    }
                    Missing::User(_) => ("error.user_not_found", keyboards::admin_back(&self.lang)),
                };
                vec![screen(from_button, i18n::t(&self.lang, key), keyboard)]
            }
            EngineError::Storage(_) | EngineError::Internal(_) => {
                log::error!("Failed to handle update in {}: {}", conversation, err);
                self.sessions.clear(conversation);
                vec![screen(
                    from_button,
                    i18n::t(&self.lang, "error.generic"),
                    keyboards::back_to_main(&self.lang),
                )]
            }
        }
    }

    /// Main menu keyboard for error replies; degrades to a single back button.
    async fn fallback_main_menu(&self) -> Keyboard {
        match self.storage.list_vehicles().await {
            Ok(vehicles) => keyboards::main_menu(&self.lang, &vehicles, false),
            Err(err) => {
                log::error!("Failed to list vehicles: {}", err);
                keyboards::back_to_main(&self.lang)
            }
        }
    }
}

fn screen(from_button: bool, text: String, keyboard: Keyboard) -> Outgoing {
    if from_button {
        Outgoing::edit(text, Some(keyboard))
    } else {
        Outgoing::send(text, Some(keyboard))
    }
}
