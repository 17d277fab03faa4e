//! Routing rules: what an update asks the bot to do.
//!
//! Callback data is built and parsed here only, so every token a keyboard
//! emits is guaranteed to route back to the same trigger.

use std::str::FromStr;

use strum::IntoStaticStr;

use super::transport::UpdateKind;
use crate::flows::AdminAction;
use crate::storage::VehicleField;

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
pub enum Trigger {
    // Commands
    Start,
    Help,
    CancelCommand,
    AdminCommand,
    UnknownCommand(String),

    /// Free text; routed to the active flow's current step.
    Text(String),

    // Exact callback tokens
    BackToMain,
    Cancel,
    Noop,
    SkipStep,
    AddVehicle,
    AdminMenu,
    AdminAdd,
    AdminRemove,

    // Callback tokens carrying ids
    ShowVehicle(i64),
    UpdateMileage(i64),
    ConfirmMileage { vehicle_id: i64, mileage: i64 },
    ShowMaintenance { vehicle_id: i64, page: usize },
    AddMaintenance(i64),
    EditMaintenance(i64),
    AddRepair(i64),
    ManageRepairs(i64),
    ShowRepair(i64),
    EditRepair(i64),
    DeleteRepair(i64),
    ConfirmDeleteRepair(i64),
    AddRefueling(i64),
    ShowFuelStats(i64),
    EditFuel(i64),
    EditVehicle(i64),
    EditField { vehicle_id: i64, field: VehicleField },
    AdminConfirm { action: AdminAction, user_id: i64 },

    /// Callback data nothing recognizes (e.g. from an older bot version).
    Unknown(String),
    /// Update kinds the bot ignores.
    Unsupported,
}

impl Trigger {
    pub fn from_update(kind: &UpdateKind) -> Self {
        match kind {
            UpdateKind::Command { name, .. } => match name.as_str() {
                "start" => Self::Start,
                "help" => Self::Help,
                "cancel" => Self::CancelCommand,
                "admin" => Self::AdminCommand,
                other => Self::UnknownCommand(other.to_string()),
            },
            UpdateKind::Text(text) => Self::Text(text.clone()),
            UpdateKind::Callback { data, .. } => Self::parse_callback(data),
            UpdateKind::Unsupported => Self::Unsupported,
        }
    }

    /// Parses callback data produced by [`Trigger::callback_data`].
    pub fn parse_callback(data: &str) -> Self {
        match data {
            "back_to_main" => return Self::BackToMain,
            "cancel" => return Self::Cancel,
            "noop" => return Self::Noop,
            "skip_step" => return Self::SkipStep,
            "add_vehicle" => return Self::AddVehicle,
            "admin_menu" => return Self::AdminMenu,
            "admin_add" => return Self::AdminAdd,
            "admin_remove" => return Self::AdminRemove,
            _ => {}
        }

        Self::parse_prefixed(data).unwrap_or_else(|| Self::Unknown(data.to_string()))
    }

    fn parse_prefixed(data: &str) -> Option<Self> {
        if let Some(rest) = data.strip_prefix("confirm_mileage_") {
            let (vehicle_id, mileage) = rest.split_once('_')?;
            return Some(Self::ConfirmMileage {
                vehicle_id: vehicle_id.parse().ok()?,
                mileage: mileage.parse().ok()?,
            });
        }
        if let Some(rest) = data.strip_prefix("show_maintenance_") {
            return Some(match rest.split_once('_') {
                Some((vehicle_id, page)) => Self::ShowMaintenance {
                    vehicle_id: vehicle_id.parse().ok()?,
                    page: page.parse().ok()?,
                },
                None => Self::ShowMaintenance {
                    vehicle_id: rest.parse().ok()?,
                    page: 0,
                },
            });
        }
        if let Some(rest) = data.strip_prefix("edit_field_") {
            // Field keys contain underscores; the id never does
            let (vehicle_id, field) = rest.split_once('_')?;
            return Some(Self::EditField {
                vehicle_id: vehicle_id.parse().ok()?,
                field: VehicleField::from_str(field).ok()?,
            });
        }
        if let Some(rest) = data.strip_prefix("admin_confirm_") {
            let (action, user_id) = rest.split_once('_')?;
            return Some(Self::AdminConfirm {
                action: AdminAction::from_str(action).ok()?,
                user_id: user_id.parse().ok()?,
            });
        }

        let with_id: [(&str, fn(i64) -> Self); 14] = [
            ("repair_delete_confirm_", Self::ConfirmDeleteRepair),
            ("delete_repair_", Self::DeleteRepair),
            ("update_mileage_", Self::UpdateMileage),
            ("add_maintenance_", Self::AddMaintenance),
            ("edit_maintenance_", Self::EditMaintenance),
            ("add_repair_", Self::AddRepair),
            ("manage_repairs_", Self::ManageRepairs),
            ("show_repair_", Self::ShowRepair),
            ("edit_repair_", Self::EditRepair),
            ("add_refueling_", Self::AddRefueling),
            ("show_fuel_stats_", Self::ShowFuelStats),
            ("edit_fuel_", Self::EditFuel),
            ("edit_vehicle_", Self::EditVehicle),
            ("vehicle_", Self::ShowVehicle),
        ];
        with_id.iter().find_map(|(prefix, make)| {
            let id = data.strip_prefix(prefix)?.parse().ok()?;
            Some(make(id))
        })
    }

    /// Callback data for triggers reachable from a button.
    pub fn callback_data(&self) -> String {
        match self {
            Self::BackToMain => "back_to_main".into(),
            Self::Cancel => "cancel".into(),
            Self::Noop => "noop".into(),
            Self::SkipStep => "skip_step".into(),
            Self::AddVehicle => "add_vehicle".into(),
            Self::AdminMenu => "admin_menu".into(),
            Self::AdminAdd => "admin_add".into(),
            Self::AdminRemove => "admin_remove".into(),
            Self::ShowVehicle(id) => format!("vehicle_{}", id),
            Self::UpdateMileage(id) => format!("update_mileage_{}", id),
            Self::ConfirmMileage { vehicle_id, mileage } => format!("confirm_mileage_{}_{}", vehicle_id, mileage),
            Self::ShowMaintenance { vehicle_id, page } => format!("show_maintenance_{}_{}", vehicle_id, page),
            Self::AddMaintenance(id) => format!("add_maintenance_{}", id),
            Self::EditMaintenance(id) => format!("edit_maintenance_{}", id),
            Self::AddRepair(id) => format!("add_repair_{}", id),
            Self::ManageRepairs(id) => format!("manage_repairs_{}", id),
            Self::ShowRepair(id) => format!("show_repair_{}", id),
            Self::EditRepair(id) => format!("edit_repair_{}", id),
            Self::DeleteRepair(id) => format!("delete_repair_{}", id),
            Self::ConfirmDeleteRepair(id) => format!("repair_delete_confirm_{}", id),
            Self::AddRefueling(id) => format!("add_refueling_{}", id),
            Self::ShowFuelStats(id) => format!("show_fuel_stats_{}", id),
            Self::EditFuel(id) => format!("edit_fuel_{}", id),
            Self::EditVehicle(id) => format!("edit_vehicle_{}", id),
            Self::EditField { vehicle_id, field } => format!("edit_field_{}_{}", vehicle_id, field.key()),
            Self::AdminConfirm { action, user_id } => format!("admin_confirm_{}_{}", action.as_ref(), user_id),
            Self::Unknown(data) => data.clone(),
            Self::Start
            | Self::Help
            | Self::CancelCommand
            | Self::AdminCommand
            | Self::UnknownCommand(_)
            | Self::Text(_)
            | Self::Unsupported => "noop".into(),
        }
    }

    /// Every mutation, and every menu leading to one, is admin-only.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::AdminCommand
                | Self::AddVehicle
                | Self::AdminMenu
                | Self::AdminAdd
                | Self::AdminRemove
                | Self::UpdateMileage(_)
                | Self::ConfirmMileage { .. }
                | Self::AddMaintenance(_)
                | Self::EditMaintenance(_)
                | Self::AddRepair(_)
                | Self::EditRepair(_)
                | Self::DeleteRepair(_)
                | Self::ConfirmDeleteRepair(_)
                | Self::AddRefueling(_)
                | Self::EditFuel(_)
                | Self::EditVehicle(_)
                | Self::EditField { .. }
                | Self::AdminConfirm { .. }
        )
    }

    /// Whether handling this trigger abandons an active flow.
    ///
    /// Text and the skip button feed the flow; `noop`, `/help`, unknown input
    /// and ignored updates leave it alone.
    pub fn leaves_flow(&self) -> bool {
        !matches!(
            self,
            Self::Text(_)
                | Self::SkipStep
                | Self::Noop
                | Self::Help
                | Self::UnknownCommand(_)
                | Self::Unknown(_)
                | Self::Unsupported
        )
    }

    /// Variant name for logs.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}
