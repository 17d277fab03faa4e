//! Read-only screens: main menu, vehicle card, histories and statistics.
//! Repair deletion lives here too since it is a two-button affair.

use crate::core::error::{EngineError, EngineResult, Missing};
use crate::flows::{FlowName, FlowState};
use crate::i18n;
use crate::storage::{RepairRecord, Vehicle};
use crate::telegram::cards;
use crate::telegram::engine::{Ctx, Engine};
use crate::telegram::keyboards;
use crate::telegram::transport::{Keyboard, Outgoing};

impl Engine {
    pub(in crate::telegram) async fn require_vehicle(&self, vehicle_id: i64) -> EngineResult<Vehicle> {
        self.storage
            .get_vehicle(vehicle_id)
            .await?
            .ok_or(EngineError::NotFound(Missing::Vehicle(vehicle_id)))
    }

    async fn require_repair(&self, record_id: i64) -> EngineResult<RepairRecord> {
        self.storage.get_repair(record_id).await?.ok_or(EngineError::NotFound(Missing::Repair {
            record_id,
            vehicle_id: None,
        }))
    }

    pub(in crate::telegram) async fn on_start(&self, ctx: &Ctx<'_>) -> EngineResult<Vec<Outgoing>> {
        let sender = ctx.sender;
        self.storage
            .register_user(sender.id, sender.username.clone(), Some(sender.full_name.clone()))
            .await?;
        log::info!("User {} ({:?}) opened the bot", sender.id, sender.username);

        let vehicles = self.storage.list_vehicles().await?;
        let text = format!(
            "{}\n\n{}",
            i18n::t_with(&self.lang, "menu.welcome", &[("name", sender.full_name.clone())]),
            cards::main_menu(&self.lang, &vehicles)
        );
        let keyboard = keyboards::main_menu(&self.lang, &vehicles, ctx.auth.is_admin());
        Ok(vec![self.screen(ctx, text, keyboard)])
    }

    pub(in crate::telegram) fn on_help(&self, ctx: &Ctx<'_>) -> Vec<Outgoing> {
        let mut text = i18n::t(&self.lang, "help.text");
        if ctx.auth.is_admin() {
            text.push_str("\n\n");
            text.push_str(&i18n::t(&self.lang, "help.admin_text"));
        }
        vec![Outgoing::send(
            text,
            Some(keyboards::help(&self.lang, self.help_url.as_deref())),
        )]
    }

    pub(in crate::telegram) async fn on_cancel_command(
        &self,
        ctx: &Ctx<'_>,
        previous: &FlowState,
    ) -> EngineResult<Vec<Outgoing>> {
        let mut replies = Vec::new();
        if !previous.is_idle() {
            replies.push(Outgoing::send(i18n::t(&self.lang, "flow.cancelled"), None));
        }
        replies.push(self.main_menu(ctx).await?);
        Ok(replies)
    }

    /// Cancel button: back to where the flow was started from.
    pub(in crate::telegram) async fn on_cancel(&self, ctx: &Ctx<'_>, previous: &FlowState) -> EngineResult<Vec<Outgoing>> {
        let notice = Outgoing::Notice {
            text: i18n::t(&self.lang, "flow.cancelled"),
            alert: false,
        };
        let screen = match previous.active() {
            Some(flow) if flow.flow == FlowName::AdminRoleChange => self.admin_menu(ctx),
            Some(flow) => match flow.context.vehicle_id {
                Some(vehicle_id) => self.vehicle_screen(ctx, vehicle_id).await?,
                None => self.main_menu(ctx).await?,
            },
            None => self.main_menu(ctx).await?,
        };
        Ok(vec![notice, screen])
    }

    pub(in crate::telegram) async fn main_menu(&self, ctx: &Ctx<'_>) -> EngineResult<Outgoing> {
        let vehicles = self.storage.list_vehicles().await?;
        Ok(self.screen(
            ctx,
            cards::main_menu(&self.lang, &vehicles),
            keyboards::main_menu(&self.lang, &vehicles, ctx.auth.is_admin()),
        ))
    }

    /// Card text and menu of a vehicle.
    pub(in crate::telegram) async fn vehicle_view(&self, vehicle_id: i64, is_admin: bool) -> EngineResult<(String, Keyboard)> {
        let vehicle = self.require_vehicle(vehicle_id).await?;
        Ok((
            cards::vehicle_card(&self.lang, &vehicle),
            keyboards::vehicle_menu(&self.lang, vehicle.id, is_admin),
        ))
    }

    pub(in crate::telegram) async fn vehicle_screen(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Outgoing> {
        let (text, keyboard) = self.vehicle_view(vehicle_id, ctx.auth.is_admin()).await?;
        Ok(self.screen(ctx, text, keyboard))
    }

    pub(in crate::telegram) async fn maintenance_screen(
        &self,
        ctx: &Ctx<'_>,
        vehicle_id: i64,
        page: usize,
    ) -> EngineResult<Outgoing> {
        let vehicle = self.require_vehicle(vehicle_id).await?;
        let history = self.storage.get_maintenance_history(vehicle_id).await?;
        let (records, page, total_pages) = cards::paginate(&history, page, self.page_size);

        Ok(self.screen(
            ctx,
            cards::maintenance_history(&self.lang, &vehicle, records, page, total_pages),
            keyboards::maintenance_history(&self.lang, vehicle_id, records, page, total_pages, ctx.auth.is_admin()),
        ))
    }

    pub(in crate::telegram) async fn repairs_screen(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Outgoing> {
        let vehicle = self.require_vehicle(vehicle_id).await?;
        let repairs = self.storage.get_repairs(vehicle_id).await?;
        Ok(self.screen(
            ctx,
            cards::repair_list(&self.lang, &vehicle, &repairs),
            keyboards::repair_list(&self.lang, vehicle_id, &repairs, ctx.auth.is_admin()),
        ))
    }

    pub(in crate::telegram) async fn repair_screen(&self, ctx: &Ctx<'_>, record_id: i64) -> EngineResult<Outgoing> {
        let repair = self.require_repair(record_id).await?;
        Ok(self.screen(
            ctx,
            cards::repair_detail(&self.lang, &repair),
            keyboards::repair_detail(&self.lang, &repair, ctx.auth.is_admin()),
        ))
    }

    pub(in crate::telegram) async fn ask_delete_repair(&self, ctx: &Ctx<'_>, record_id: i64) -> EngineResult<Vec<Outgoing>> {
        let repair = self.require_repair(record_id).await?;
        let text = format!(
            "{}\n\n{}",
            i18n::t(&self.lang, "repair.delete_question"),
            cards::repair_detail(&self.lang, &repair)
        );
        Ok(vec![self.screen(ctx, text, keyboards::delete_confirm(&self.lang, &repair))])
    }

    pub(in crate::telegram) async fn delete_repair(&self, ctx: &Ctx<'_>, record_id: i64) -> EngineResult<Vec<Outgoing>> {
        let repair = self.require_repair(record_id).await?;
        if !self.storage.delete_repair(record_id).await? {
            return Err(EngineError::NotFound(Missing::Repair {
                record_id,
                vehicle_id: Some(repair.vehicle_id),
            }));
        }
        log::info!(
            "User {} deleted repair {} of vehicle {}",
            ctx.auth.user_id(),
            record_id,
            repair.vehicle_id
        );

        Ok(vec![
            Outgoing::Notice {
                text: i18n::t(&self.lang, "repair.deleted"),
                alert: false,
            },
            self.repairs_screen(ctx, repair.vehicle_id).await?,
        ])
    }

    pub(in crate::telegram) async fn fuel_screen(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Outgoing> {
        let vehicle = self.require_vehicle(vehicle_id).await?;
        let history = self.storage.get_refueling_history(vehicle_id).await?;
        Ok(self.screen(
            ctx,
            cards::fuel_stats(&self.lang, &vehicle, &history),
            keyboards::fuel(&self.lang, vehicle_id, ctx.auth.is_admin()),
        ))
    }

    pub(in crate::telegram) async fn field_picklist(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Outgoing> {
        let vehicle = self.require_vehicle(vehicle_id).await?;
        Ok(self.screen(
            ctx,
            i18n::t_with(&self.lang, "field.pick", &[("vehicle", vehicle.title())]),
            keyboards::field_picklist(&self.lang, vehicle_id),
        ))
    }
}
