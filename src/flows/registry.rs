//! Declarative flow definitions.
//!
//! Each flow is an ordered list of steps; a step names the field it fills,
//! the localization key of its prompt and the rule checking the answer.

use super::state::FlowName;
use crate::core::validation::{
    parse_date, validate_float, validate_integer, validate_mileage, validate_required_text, validate_user_id,
    ValidationError,
};
use crate::storage::{FieldKind, FieldValue, VehicleField};

/// Answer used to clear an optional value.
pub const NULL_MARKER: &str = "-";

/// How a step turns raw text into a [`FieldValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Date,
    /// Strictly positive integer.
    Mileage,
    /// Zero or more; a new vehicle may come straight from the factory.
    Odometer,
    PositiveFloat,
    /// Positive float, or `-` for none.
    OptionalFloat,
    Text,
    /// Free text, or `-` for none.
    OptionalText,
    UserId,
    /// Coerced by the kind of the vehicle column being edited.
    VehicleColumn,
}

impl Rule {
    pub fn apply(&self, input: &str, label: &str, target: Option<VehicleField>) -> Result<FieldValue, ValidationError> {
        let input = input.trim();
        match self {
            Self::Date => parse_date(input).map(FieldValue::Date),
            Self::Mileage => validate_mileage(input).map(FieldValue::Int),
            Self::Odometer => validate_integer(input).map(FieldValue::Int),
            Self::PositiveFloat => validate_float(input, label).map(FieldValue::Float),
            Self::OptionalFloat if input == NULL_MARKER => Ok(FieldValue::Null),
            Self::OptionalFloat => validate_float(input, label).map(FieldValue::Float),
            Self::Text => validate_required_text(input).map(FieldValue::Text),
            Self::OptionalText if input == NULL_MARKER => Ok(FieldValue::Null),
            Self::OptionalText => validate_required_text(input).map(FieldValue::Text),
            Self::UserId => validate_user_id(input).map(FieldValue::Int),
            Self::VehicleColumn => {
                let field = target.ok_or(ValidationError::NoTargetField)?;
                if field.nullable() && input == NULL_MARKER {
                    return Ok(FieldValue::Null);
                }
                match field.kind() {
                    FieldKind::Text => validate_required_text(input).map(FieldValue::Text),
                    FieldKind::Integer => validate_integer(input).map(FieldValue::Int),
                    FieldKind::Date => parse_date(input).map(FieldValue::Date),
                }
            }
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Step {
    pub field: &'static str,
    /// Localization key of the prompt.
    pub prompt: &'static str,
    /// Localization key naming the field in errors and edit hints.
    pub label: &'static str,
    pub rule: Rule,
    /// Blank answers leave the value unset.
    pub optional: bool,
}

impl Step {
    const fn new(field: &'static str, prompt: &'static str, label: &'static str, rule: Rule) -> Self {
        Self {
            field,
            prompt,
            label,
            rule,
            optional: false,
        }
    }

    const fn optional(self) -> Self {
        Self { optional: true, ..self }
    }
}

/// What happens once the last step is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Write straight to storage.
    Commit,
    /// Show a confirmation keyboard; the write happens on the button press.
    Confirm,
}

#[derive(Debug, PartialEq)]
pub struct FlowDefinition {
    pub name: FlowName,
    /// Localization key of the heading shown with the first prompt.
    pub title: &'static str,
    /// Heading used by the edit variant.
    pub edit_title: &'static str,
    pub steps: &'static [Step],
    pub completion: Completion,
}

static REPAIR_STEPS: [Step; 4] = [
    Step::new("date", "repair.ask_date", "label.date", Rule::Date),
    Step::new("mileage", "repair.ask_mileage", "label.mileage", Rule::Mileage),
    Step::new("description", "repair.ask_description", "label.description", Rule::Text),
    Step::new("cost", "repair.ask_cost", "label.cost", Rule::OptionalFloat),
];

static REFUELING_STEPS: [Step; 4] = [
    Step::new("date", "refueling.ask_date", "label.date", Rule::Date),
    Step::new("mileage", "refueling.ask_mileage", "label.mileage", Rule::Mileage),
    Step::new("liters", "refueling.ask_liters", "label.liters", Rule::PositiveFloat),
    Step::new("cost_per_liter", "refueling.ask_price", "label.price", Rule::PositiveFloat),
];

static MAINTENANCE_STEPS: [Step; 3] = [
    Step::new("date", "maintenance.ask_date", "label.date", Rule::Date),
    Step::new("mileage", "maintenance.ask_mileage", "label.mileage", Rule::Mileage),
    Step::new("works", "maintenance.ask_works", "label.works", Rule::Text),
];

static MILEAGE_STEPS: [Step; 1] = [Step::new("mileage", "mileage.ask", "label.mileage", Rule::Mileage)];

static VEHICLE_STEPS: [Step; 4] = [
    Step::new("model", "vehicle.ask_model", "label.model", Rule::Text),
    Step::new("reg_number", "vehicle.ask_reg_number", "label.reg_number", Rule::Text),
    Step::new("vin", "vehicle.ask_vin", "label.vin", Rule::OptionalText),
    Step::new("mileage", "vehicle.ask_mileage", "label.mileage", Rule::Odometer),
];

static FUEL_INFO_STEPS: [Step; 3] = [
    Step::new("fuel_type", "fuel.ask_type", "label.fuel_type", Rule::Text).optional(),
    Step::new("tank_capacity", "fuel.ask_capacity", "label.tank_capacity", Rule::PositiveFloat).optional(),
    Step::new("avg_consumption", "fuel.ask_consumption", "label.consumption", Rule::PositiveFloat).optional(),
];

static FIELD_EDIT_STEPS: [Step; 1] = [Step::new("value", "field.ask", "label.value", Rule::VehicleColumn)];

static ADMIN_STEPS: [Step; 1] = [Step::new("user_id", "admin.ask_user_id", "label.user_id", Rule::UserId)];

static REPAIR: FlowDefinition = FlowDefinition {
    name: FlowName::Repair,
    title: "repair.title",
    edit_title: "repair.edit_title",
    steps: &REPAIR_STEPS,
    completion: Completion::Commit,
};

static REFUELING: FlowDefinition = FlowDefinition {
    name: FlowName::Refueling,
    title: "refueling.title",
    edit_title: "refueling.title",
    steps: &REFUELING_STEPS,
    completion: Completion::Commit,
};

static MAINTENANCE: FlowDefinition = FlowDefinition {
    name: FlowName::Maintenance,
    title: "maintenance.title",
    edit_title: "maintenance.edit_title",
    steps: &MAINTENANCE_STEPS,
    completion: Completion::Commit,
};

static MILEAGE_UPDATE: FlowDefinition = FlowDefinition {
    name: FlowName::MileageUpdate,
    title: "mileage.title",
    edit_title: "mileage.title",
    steps: &MILEAGE_STEPS,
    completion: Completion::Confirm,
};

static VEHICLE_CREATION: FlowDefinition = FlowDefinition {
    name: FlowName::VehicleCreation,
    title: "vehicle.create_title",
    edit_title: "vehicle.create_title",
    steps: &VEHICLE_STEPS,
    completion: Completion::Commit,
};

static FUEL_INFO_EDIT: FlowDefinition = FlowDefinition {
    name: FlowName::FuelInfoEdit,
    title: "fuel.edit_title",
    edit_title: "fuel.edit_title",
    steps: &FUEL_INFO_STEPS,
    completion: Completion::Commit,
};

static FIELD_EDIT: FlowDefinition = FlowDefinition {
    name: FlowName::FieldEdit,
    title: "field.title",
    edit_title: "field.title",
    steps: &FIELD_EDIT_STEPS,
    completion: Completion::Commit,
};

static ADMIN_ROLE_CHANGE: FlowDefinition = FlowDefinition {
    name: FlowName::AdminRoleChange,
    title: "admin.change_title",
    edit_title: "admin.change_title",
    steps: &ADMIN_STEPS,
    completion: Completion::Confirm,
};

/// Looks up the definition of a flow.
pub fn definition(name: FlowName) -> &'static FlowDefinition {
    match name {
        FlowName::Repair => &REPAIR,
        FlowName::Refueling => &REFUELING,
        FlowName::Maintenance => &MAINTENANCE,
        FlowName::MileageUpdate => &MILEAGE_UPDATE,
        FlowName::VehicleCreation => &VEHICLE_CREATION,
        FlowName::FuelInfoEdit => &FUEL_INFO_EDIT,
        FlowName::FieldEdit => &FIELD_EDIT,
        FlowName::AdminRoleChange => &ADMIN_ROLE_CHANGE,
    }
}
