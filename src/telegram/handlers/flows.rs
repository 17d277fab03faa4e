//! Driving guided flows: starting them, feeding answers, completing them.

use std::collections::BTreeMap;

use crate::core::error::{EngineError, EngineResult, Missing};
use crate::flows::{
    commit, ActiveFlow, Advance, Committed, Completion, FlowContext, FlowName, FlowState, FlowVariant, Rule, Step,
};
use crate::i18n;
use crate::storage::{FieldValue, Vehicle, VehicleField};
use crate::telegram::cards;
use crate::telegram::engine::{Ctx, Engine};
use crate::telegram::keyboards;
use crate::telegram::transport::Outgoing;

impl Engine {
    /// Stores `flow` as the conversation's state and shows its first prompt.
    pub(in crate::telegram) async fn start_flow(
        &self,
        ctx: &Ctx<'_>,
        flow: ActiveFlow,
        subject: String,
    ) -> EngineResult<Vec<Outgoing>> {
        let definition = flow.definition();
        let title = match flow.variant {
            FlowVariant::Create => definition.title,
            FlowVariant::Edit => definition.edit_title,
        };
        let text = format!(
            "{}\n\n{}",
            i18n::t_with(&self.lang, title, &[("subject", subject)]),
            self.step_prompt(&flow).await
        );
        let keyboard = keyboards::cancel(&self.lang, flow.can_skip());

        log::info!(
            "User {} starts {:?} ({:?}) in {}",
            ctx.auth.user_id(),
            flow.flow,
            flow.variant,
            ctx.conversation
        );
        self.sessions.set(ctx.conversation, FlowState::InFlow(flow));
        Ok(vec![self.screen(ctx, text, keyboard)])
    }

    pub(in crate::telegram) async fn start_vehicle_creation(&self, ctx: &Ctx<'_>) -> EngineResult<Vec<Outgoing>> {
        let flow = ActiveFlow::start(FlowName::VehicleCreation, FlowContext::default());
        self.start_flow(ctx, flow, String::new()).await
    }

    async fn start_for_vehicle(&self, ctx: &Ctx<'_>, name: FlowName, vehicle_id: i64) -> EngineResult<Vec<Outgoing>> {
        let vehicle = self.require_vehicle(vehicle_id).await?;
        let flow = ActiveFlow::start(name, FlowContext::for_vehicle(vehicle.id));
        self.start_flow(ctx, flow, vehicle.title()).await
    }

    pub(in crate::telegram) async fn start_mileage_update(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Vec<Outgoing>> {
        self.start_for_vehicle(ctx, FlowName::MileageUpdate, vehicle_id).await
    }

    pub(in crate::telegram) async fn start_maintenance(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Vec<Outgoing>> {
        self.start_for_vehicle(ctx, FlowName::Maintenance, vehicle_id).await
    }

    pub(in crate::telegram) async fn start_repair(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Vec<Outgoing>> {
        self.start_for_vehicle(ctx, FlowName::Repair, vehicle_id).await
    }

    pub(in crate::telegram) async fn start_refueling(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Vec<Outgoing>> {
        self.start_for_vehicle(ctx, FlowName::Refueling, vehicle_id).await
    }

    pub(in crate::telegram) async fn start_fuel_edit(&self, ctx: &Ctx<'_>, vehicle_id: i64) -> EngineResult<Vec<Outgoing>> {
        self.start_for_vehicle(ctx, FlowName::FuelInfoEdit, vehicle_id).await
    }

    pub(in crate::telegram) async fn start_field_edit(
        &self,
        ctx: &Ctx<'_>,
        vehicle_id: i64,
        field: VehicleField,
    ) -> EngineResult<Vec<Outgoing>> {
        let vehicle = self.require_vehicle(vehicle_id).await?;
        let context = FlowContext {
            target_field: Some(field),
            ..FlowContext::for_vehicle(vehicle.id)
        };
        let flow = ActiveFlow::start(FlowName::FieldEdit, context);
        self.start_flow(ctx, flow, format!("{} · {}", vehicle.title(), self.field_name(field)))
            .await
    }

    pub(in crate::telegram) async fn start_maintenance_edit(&self, ctx: &Ctx<'_>, record_id: i64) -> EngineResult<Vec<Outgoing>> {
        let record = self
            .storage
            .get_maintenance(record_id)
            .await?
            .ok_or(EngineError::NotFound(Missing::Maintenance {
                record_id,
                vehicle_id: None,
            }))?;

        let current = BTreeMap::from([
            ("date", FieldValue::Date(record.date)),
            ("mileage", FieldValue::Int(record.mileage)),
            ("works", FieldValue::Text(record.works.clone())),
        ]);
        let context = FlowContext {
            record_id: Some(record.id),
            ..FlowContext::for_vehicle(record.vehicle_id)
        };
        let flow = ActiveFlow::edit(FlowName::Maintenance, context, current);
        self.start_flow(ctx, flow, cards::format_date(record.date)).await
    }

    pub(in crate::telegram) async fn start_repair_edit(&self, ctx: &Ctx<'_>, record_id: i64) -> EngineResult<Vec<Outgoing>> {
        let record = self
            .storage
            .get_repair(record_id)
            .await?
            .ok_or(EngineError::NotFound(Missing::Repair {
                record_id,
                vehicle_id: None,
            }))?;

        let current = BTreeMap::from([
            ("date", FieldValue::Date(record.date)),
            ("mileage", FieldValue::Int(record.mileage)),
            ("description", FieldValue::Text(record.description.clone())),
            ("cost", record.cost.map_or(FieldValue::Null, FieldValue::Float)),
        ]);
        let context = FlowContext {
            record_id: Some(record.id),
            ..FlowContext::for_vehicle(record.vehicle_id)
        };
        let flow = ActiveFlow::edit(FlowName::Repair, context, current);
        self.start_flow(ctx, flow, cards::short(&record.description, 32)).await
    }

    /// Free text: the answer to the current step, if a flow is active.
    pub(in crate::telegram) async fn on_text(
        &self,
        ctx: &Ctx<'_>,
        previous: FlowState,
        text: &str,
    ) -> EngineResult<Vec<Outgoing>> {
        let FlowState::InFlow(mut flow) = previous else {
            return Ok(vec![Outgoing::send(
                i18n::t(&self.lang, "flow.idle_hint"),
                Some(keyboards::back_to_main(&self.lang)),
            )]);
        };
        let Some(step) = flow.current_step() else {
            return Ok(vec![Outgoing::send(i18n::t(&self.lang, "flow.use_buttons"), None)]);
        };

        let label = self.step_label(&flow, step);
        match flow.submit(text, &label) {
            Ok(advance) => self.after_advance(ctx, flow, advance).await,
            Err(err) => {
                log::debug!(
                    "Rejected answer for {:?}.{} in {}: {}",
                    flow.flow,
                    step.field,
                    ctx.conversation,
                    err
                );
                let text = format!(
                    "{}\n\n{}",
                    i18n::t_with(&self.lang, err.message_key(), &[("label", label)]),
                    self.step_prompt(&flow).await
                );
                Ok(vec![Outgoing::send(
                    text,
                    Some(keyboards::cancel(&self.lang, flow.can_skip())),
                )])
            }
        }
    }

    pub(in crate::telegram) async fn on_skip(&self, ctx: &Ctx<'_>, previous: FlowState) -> EngineResult<Vec<Outgoing>> {
        let FlowState::InFlow(mut flow) = previous else {
            return Ok(vec![Outgoing::Notice {
                text: i18n::t(&self.lang, "flow.nothing_to_skip"),
                alert: false,
            }]);
        };
        if !flow.can_skip() {
            return Ok(vec![Outgoing::Notice {
                text: i18n::t(&self.lang, "flow.cannot_skip"),
                alert: false,
            }]);
        }

        let advance = flow.skip();
        self.after_advance(ctx, flow, advance).await
    }

    async fn after_advance(&self, ctx: &Ctx<'_>, flow: ActiveFlow, advance: Advance) -> EngineResult<Vec<Outgoing>> {
        match advance {
            Advance::Next(_) => {
                let text = self.step_prompt(&flow).await;
                let keyboard = keyboards::cancel(&self.lang, flow.can_skip());
                self.sessions.set(ctx.conversation, FlowState::InFlow(flow));
                Ok(vec![self.screen(ctx, text, keyboard)])
            }
            Advance::Complete => match flow.definition().completion {
                Completion::Commit => self.commit_flow(ctx, flow).await,
                Completion::Confirm => match flow.flow {
                    FlowName::MileageUpdate => self.ask_mileage_confirmation(ctx, flow).await,
                    FlowName::AdminRoleChange => self.ask_admin_confirmation(ctx, flow).await,
                    other => Err(EngineError::Internal(format!("{:?} has no confirmation step", other))),
                },
            },
            Advance::AwaitingConfirmation => Ok(vec![Outgoing::send(i18n::t(&self.lang, "flow.use_buttons"), None)]),
        }
    }

    /// Writes a finished flow. The state is cleared whatever the outcome.
    async fn commit_flow(&self, ctx: &Ctx<'_>, flow: ActiveFlow) -> EngineResult<Vec<Outgoing>> {
        self.sessions.clear(ctx.conversation);
        let auth = self.guard.authorize_commit(ctx.auth.user_id()).await?;
        let committed = commit(&flow, self.storage.as_ref(), &auth).await?;
        log::info!("User {} committed {:?}", auth.user_id(), committed);

        let (card, keyboard) = self.vehicle_view(committed.vehicle_id(), auth.is_admin()).await?;
        Ok(vec![
            Outgoing::send(self.committed_message(&committed), None),
            Outgoing::send(card, Some(keyboard)),
        ])
    }

    fn committed_message(&self, committed: &Committed) -> String {
        let lang = &self.lang;
        match committed {
            Committed::RepairAdded { .. } => i18n::t(lang, "repair.added"),
            Committed::RepairUpdated { .. } => i18n::t(lang, "repair.updated"),
            Committed::RefuelingAdded { refueling, .. } => i18n::t_with(
                lang,
                "refueling.added",
                &[
                    ("liters", cards::format_amount(refueling.liters)),
                    ("price", cards::format_amount(refueling.cost_per_liter)),
                    ("total", cards::format_amount(refueling.liters * refueling.cost_per_liter)),
                ],
            ),
            Committed::MaintenanceAdded { .. } => i18n::t(lang, "maintenance.added"),
            Committed::MaintenanceUpdated { .. } => i18n::t(lang, "maintenance.updated"),
            Committed::VehicleAdded { title, .. } => i18n::t_with(lang, "vehicle.added", &[("vehicle", title.clone())]),
            Committed::FuelInfoUpdated { changed: true, .. } => i18n::t(lang, "fuel.updated"),
            Committed::FuelInfoUpdated { changed: false, .. } => i18n::t(lang, "fuel.unchanged"),
            Committed::FieldUpdated { field, .. } => {
                i18n::t_with(lang, "field.updated", &[("field", self.field_name(*field))])
            }
        }
    }

    async fn ask_mileage_confirmation(&self, ctx: &Ctx<'_>, flow: ActiveFlow) -> EngineResult<Vec<Outgoing>> {
        let (vehicle_id, mileage) = match (flow.context.vehicle_id, flow.field("mileage").and_then(FieldValue::as_int)) {
            (Some(vehicle_id), Some(mileage)) => (vehicle_id, mileage),
            _ => return Err(EngineError::Internal("mileage update without vehicle or value".into())),
        };
        let vehicle = self.require_vehicle(vehicle_id).await?;

        if mileage <= vehicle.mileage {
            self.sessions.clear(ctx.conversation);
            return Ok(vec![self.mileage_rejected(ctx, &vehicle, mileage)]);
        }

        let text = i18n::t_with(
            &self.lang,
            "mileage.confirm",
            &[
                ("vehicle", vehicle.title()),
                ("current", vehicle.mileage.to_string()),
                ("mileage", mileage.to_string()),
            ],
        );
        self.sessions.set(ctx.conversation, FlowState::InFlow(flow));
        Ok(vec![self.screen(
            ctx,
            text,
            keyboards::mileage_confirm(&self.lang, vehicle_id, mileage),
        )])
    }

    /// Confirm button of a mileage update; stateless, so checks everything again.
    pub(in crate::telegram) async fn confirm_mileage(
        &self,
        ctx: &Ctx<'_>,
        vehicle_id: i64,
        mileage: i64,
    ) -> EngineResult<Vec<Outgoing>> {
        let vehicle = self.require_vehicle(vehicle_id).await?;
        if mileage <= vehicle.mileage || !self.storage.update_mileage(vehicle_id, mileage).await? {
            log::info!(
                "Mileage {} rejected for vehicle {} (current {})",
                mileage,
                vehicle_id,
                vehicle.mileage
            );
            return Ok(vec![self.mileage_rejected(ctx, &vehicle, mileage)]);
        }
        log::info!(
            "User {} updated mileage of vehicle {}: {} -> {}",
            ctx.auth.user_id(),
            vehicle_id,
            vehicle.mileage,
            mileage
        );

        let (card, keyboard) = self.vehicle_view(vehicle_id, ctx.auth.is_admin()).await?;
        let text = format!(
            "{}\n\n{}",
            i18n::t_with(&self.lang, "mileage.updated", &[("mileage", mileage.to_string())]),
            card
        );
        Ok(vec![self.screen(ctx, text, keyboard)])
    }

    fn mileage_rejected(&self, ctx: &Ctx<'_>, vehicle: &Vehicle, mileage: i64) -> Outgoing {
        self.screen(
            ctx,
            i18n::t_with(
                &self.lang,
                "mileage.not_greater",
                &[("mileage", mileage.to_string()), ("current", vehicle.mileage.to_string())],
            ),
            keyboards::back_to_vehicle(&self.lang, vehicle.id),
        )
    }

    pub(in crate::telegram) fn field_name(&self, field: VehicleField) -> String {
        i18n::t(&self.lang, &format!("field.{}", field.key()))
    }

    fn step_label(&self, flow: &ActiveFlow, step: &Step) -> String {
        match (flow.flow, flow.context.target_field) {
            (FlowName::FieldEdit, Some(field)) => self.field_name(field),
            _ => i18n::t(&self.lang, step.label),
        }
    }

    /// Prompt of the current step with the current value and input hints.
    async fn step_prompt(&self, flow: &ActiveFlow) -> String {
        let Some(step) = flow.current_step() else {
            return String::new();
        };

        let mut lines = vec![match (flow.flow, flow.context.target_field) {
            (FlowName::FieldEdit, Some(field)) => {
                i18n::t_with(&self.lang, step.prompt, &[("field", self.field_name(field))])
            }
            _ => i18n::t(&self.lang, step.prompt),
        }];

        if let Some(current) = self.current_value(flow, step).await {
            lines.push(i18n::t_with(
                &self.lang,
                "flow.current_value",
                &[("value", cards::value_display(&self.lang, Some(&current)))],
            ));
        }
        if flow.can_skip() {
            lines.push(i18n::t(&self.lang, "flow.skip_hint"));
        }
        let accepts_null = match step.rule {
            Rule::OptionalFloat | Rule::OptionalText => true,
            Rule::VehicleColumn => flow.context.target_field.is_some_and(|field| field.nullable()),
            _ => false,
        };
        if accepts_null {
            lines.push(i18n::t(&self.lang, "flow.null_hint"));
        }
        lines.join("\n")
    }

    /// Value the step would overwrite, for display.
    async fn current_value(&self, flow: &ActiveFlow, step: &Step) -> Option<FieldValue> {
        if flow.variant == FlowVariant::Edit {
            return flow.field(step.field).cloned();
        }
        if !matches!(
            flow.flow,
            FlowName::MileageUpdate | FlowName::FuelInfoEdit | FlowName::FieldEdit
        ) {
            return None;
        }

        let vehicle_id = flow.context.vehicle_id?;
        let vehicle = match self.storage.get_vehicle(vehicle_id).await {
            Ok(vehicle) => vehicle?,
            Err(err) => {
                log::warn!("Failed to load vehicle {} for a prompt: {}", vehicle_id, err);
                return None;
            }
        };

        match (flow.flow, step.field) {
            (FlowName::MileageUpdate, _) => Some(FieldValue::Int(vehicle.mileage)),
            (FlowName::FieldEdit, _) => Some(cards::field_value(&vehicle, flow.context.target_field?)),
            (FlowName::FuelInfoEdit, "fuel_type") => Some(vehicle.fuel_type.map_or(FieldValue::Null, FieldValue::Text)),
            (FlowName::FuelInfoEdit, "tank_capacity") => {
                Some(vehicle.fuel_tank_capacity.map_or(FieldValue::Null, FieldValue::Float))
            }
            (FlowName::FuelInfoEdit, "avg_consumption") => {
                Some(vehicle.avg_fuel_consumption.map_or(FieldValue::Null, FieldValue::Float))
            }
            _ => None,
        }
    }
}
