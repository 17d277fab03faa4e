//! Per-conversation dialog state.

use std::collections::BTreeMap;
use std::time::Instant;

use strum::{AsRefStr, EnumString, IntoStaticStr};

use super::registry::{definition, Completion, FlowDefinition, Step};
use crate::core::validation::ValidationError;
use crate::storage::{FieldValue, VehicleField};

/// Guided dialogs known to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum FlowName {
    Repair,
    Refueling,
    Maintenance,
    MileageUpdate,
    VehicleCreation,
    FuelInfoEdit,
    FieldEdit,
    AdminRoleChange,
}

/// Whether a flow creates a record or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowVariant {
    #[default]
    Create,
    /// Values are pre-seeded; an empty answer keeps the current value.
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AdminAction {
    Add,
    Remove,
}

/// Ids a flow carries between steps.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowContext {
    pub vehicle_id: Option<i64>,
    pub record_id: Option<i64>,
    pub target_field: Option<VehicleField>,
    pub admin_action: Option<AdminAction>,
}

impl FlowContext {
    pub fn for_vehicle(vehicle_id: i64) -> Self {
        Self {
            vehicle_id: Some(vehicle_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveFlow {
    pub flow: FlowName,
    /// Index of the step awaiting input; `steps.len()` means awaiting confirmation.
    pub step: usize,
    pub fields: BTreeMap<&'static str, FieldValue>,
    pub context: FlowContext,
    pub variant: FlowVariant,
    pub touched_at: Instant,
}

/// Result of feeding one answer into a flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance {
    /// The answer was stored; prompt for this step next.
    Next(&'static Step),
    /// Every step is answered.
    Complete,
    /// The flow already waits for a button press; the answer was ignored.
    AwaitingConfirmation,
}

impl ActiveFlow {
    pub fn start(flow: FlowName, context: FlowContext) -> Self {
        Self {
            flow,
            step: 0,
            fields: BTreeMap::new(),
            context,
            variant: FlowVariant::Create,
            touched_at: Instant::now(),
        }
    }

    /// Starts an edit of an existing record, seeded with its current values.
    pub fn edit(flow: FlowName, context: FlowContext, current: BTreeMap<&'static str, FieldValue>) -> Self {
        Self {
            fields: current,
            variant: FlowVariant::Edit,
            ..Self::start(flow, context)
        }
    }

    pub fn definition(&self) -> &'static FlowDefinition {
        definition(self.flow)
    }

    pub fn current_step(&self) -> Option<&'static Step> {
        self.definition().steps.get(self.step)
    }

    pub fn awaiting_confirmation(&self) -> bool {
        self.definition().completion == Completion::Confirm && self.step >= self.definition().steps.len()
    }

    /// Whether an empty answer is accepted for the current step.
    pub fn can_skip(&self) -> bool {
        self.current_step()
            .is_some_and(|step| step.optional || self.variant == FlowVariant::Edit)
    }

    /// Validates `input` against the current step and advances on success.
    ///
    /// A failed validation leaves the flow untouched. `label` names the field
    /// in error messages. Blank input skips the step when [`Self::can_skip`].
    pub fn submit(&mut self, input: &str, label: &str) -> Result<Advance, ValidationError> {
        let Some(step) = self.current_step() else {
            return Ok(Advance::AwaitingConfirmation);
        };

        let input = input.trim();
        if input.is_empty() && self.can_skip() {
            return Ok(self.skip());
        }

        let value = step.rule.apply(input, label, self.context.target_field)?;
        self.fields.insert(step.field, value);
        Ok(self.advance())
    }

    /// Skips the current step, keeping whatever value it already has.
    ///
    /// Callers check [`Self::can_skip`] first.
    pub fn skip(&mut self) -> Advance {
        self.advance()
    }

    fn advance(&mut self) -> Advance {
        self.step += 1;
        self.touched_at = Instant::now();
        match self.current_step() {
            Some(next) => Advance::Next(next),
            None => Advance::Complete,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Dialog state of one conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    InFlow(ActiveFlow),
}

impl FlowState {
    pub fn active(&self) -> Option<&ActiveFlow> {
        match self {
            Self::Idle => None,
            Self::InFlow(flow) => Some(flow),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}
