//! Storage writes performed when a flow's last step is accepted.

use chrono::NaiveDate;

use super::state::{ActiveFlow, FlowName, FlowVariant};
use crate::core::error::{EngineError, EngineResult, Missing};
use crate::storage::{
    FieldValue, FuelInfoUpdate, Maintenance, NewVehicle, Refueling, Repair, Storage, Vehicle, VehicleField,
};
use crate::telegram::guard::Authorized;

/// What a committed flow changed, for the confirmation message.
#[derive(Debug, Clone, PartialEq)]
pub enum Committed {
    RepairAdded { vehicle_id: i64 },
    RepairUpdated { vehicle_id: i64, record_id: i64 },
    RefuelingAdded { vehicle_id: i64, refueling: Refueling },
    MaintenanceAdded { vehicle_id: i64 },
    MaintenanceUpdated { vehicle_id: i64 },
    VehicleAdded { vehicle_id: i64, title: String },
    FuelInfoUpdated { vehicle_id: i64, changed: bool },
    FieldUpdated { vehicle_id: i64, field: VehicleField },
}

impl Committed {
    pub fn vehicle_id(&self) -> i64 {
        match self {
            Self::RepairAdded { vehicle_id }
            | Self::RepairUpdated { vehicle_id, .. }
            | Self::RefuelingAdded { vehicle_id, .. }
            | Self::MaintenanceAdded { vehicle_id }
            | Self::MaintenanceUpdated { vehicle_id }
            | Self::VehicleAdded { vehicle_id, .. }
            | Self::FuelInfoUpdated { vehicle_id, .. }
            | Self::FieldUpdated { vehicle_id, .. } => *vehicle_id,
        }
    }
}

/// Writes a completed commit-mode flow to storage.
///
/// The flow must have every step answered; it is read, never modified.
pub async fn commit(flow: &ActiveFlow, storage: &dyn Storage, auth: &Authorized) -> EngineResult<Committed> {
    log::info!("User {} commits {:?} ({:?})", auth.user_id(), flow.flow, flow.variant);

    match (flow.flow, flow.variant) {
        (FlowName::Repair, FlowVariant::Create) => {
            let vehicle = require_vehicle(flow, storage).await?;
            storage.add_repair(vehicle.id, repair(flow)?).await?;
            Ok(Committed::RepairAdded { vehicle_id: vehicle.id })
        }
        (FlowName::Repair, FlowVariant::Edit) => {
            let (record_id, vehicle_id) = record_ids(flow)?;
            if !storage.update_repair(record_id, repair(flow)?).await? {
                return Err(EngineError::NotFound(Missing::Repair {
                    record_id,
                    vehicle_id: Some(vehicle_id),
                }));
            }
            Ok(Committed::RepairUpdated { vehicle_id, record_id })
        }
        (FlowName::Refueling, _) => {
            let vehicle = require_vehicle(flow, storage).await?;
            let refueling = Refueling {
                date: date(flow, "date")?,
                mileage: int(flow, "mileage")?,
                liters: float(flow, "liters")?,
                cost_per_liter: float(flow, "cost_per_liter")?,
            };
            storage.add_refueling(vehicle.id, refueling.clone()).await?;
            Ok(Committed::RefuelingAdded {
                vehicle_id: vehicle.id,
                refueling,
            })
        }
        (FlowName::Maintenance, FlowVariant::Create) => {
            let vehicle = require_vehicle(flow, storage).await?;
            storage.add_maintenance(vehicle.id, maintenance(flow)?).await?;
            Ok(Committed::MaintenanceAdded { vehicle_id: vehicle.id })
        }
        (FlowName::Maintenance, FlowVariant::Edit) => {
            let (record_id, vehicle_id) = record_ids(flow)?;
            if !storage.update_maintenance(record_id, maintenance(flow)?).await? {
                return Err(EngineError::NotFound(Missing::Maintenance {
                    record_id,
                    vehicle_id: Some(vehicle_id),
                }));
            }
            Ok(Committed::MaintenanceUpdated { vehicle_id })
        }
        (FlowName::VehicleCreation, _) => {
            let vehicle = NewVehicle {
                model: text(flow, "model")?,
                reg_number: text(flow, "reg_number")?,
                vin: optional_text(flow, "vin"),
                mileage: int(flow, "mileage")?,
            };
            let title = format!("{} ({})", vehicle.model, vehicle.reg_number);
            let vehicle_id = storage.add_vehicle(vehicle).await?;
            Ok(Committed::VehicleAdded { vehicle_id, title })
        }
        (FlowName::FuelInfoEdit, _) => {
            let vehicle = require_vehicle(flow, storage).await?;
            let update = FuelInfoUpdate {
                fuel_type: optional_text(flow, "fuel_type"),
                tank_capacity: optional_float(flow, "tank_capacity"),
                avg_consumption: optional_float(flow, "avg_consumption"),
            };
            let changed = !update.is_empty();
            if changed && !storage.update_fuel_info(vehicle.id, update).await? {
                return Err(EngineError::NotFound(Missing::Vehicle(vehicle.id)));
            }
            Ok(Committed::FuelInfoUpdated {
                vehicle_id: vehicle.id,
                changed,
            })
        }
        (FlowName::FieldEdit, _) => {
            let vehicle_id = vehicle_id(flow)?;
            let field = flow
                .context
                .target_field
                .ok_or_else(|| EngineError::Internal("field edit without a target field".into()))?;
            let value = flow
                .field("value")
                .cloned()
                .ok_or_else(|| missing_field(flow, "value"))?;
            if !storage.update_vehicle_field(vehicle_id, field, value).await? {
                return Err(EngineError::NotFound(Missing::Vehicle(vehicle_id)));
            }
            Ok(Committed::FieldUpdated { vehicle_id, field })
        }
        (FlowName::MileageUpdate | FlowName::AdminRoleChange, _) => Err(EngineError::Internal(format!(
            "{:?} completes through its confirmation button",
            flow.flow
        ))),
    }
}

async fn require_vehicle(flow: &ActiveFlow, storage: &dyn Storage) -> EngineResult<Vehicle> {
    let id = vehicle_id(flow)?;
    storage
        .get_vehicle(id)
        .await?
        .ok_or(EngineError::NotFound(Missing::Vehicle(id)))
}

fn vehicle_id(flow: &ActiveFlow) -> EngineResult<i64> {
    flow.context
        .vehicle_id
        .ok_or_else(|| EngineError::Internal(format!("{:?} without a vehicle", flow.flow)))
}

fn record_ids(flow: &ActiveFlow) -> EngineResult<(i64, i64)> {
    let record_id = flow
        .context
        .record_id
        .ok_or_else(|| EngineError::Internal(format!("{:?} edit without a record", flow.flow)))?;
    Ok((record_id, vehicle_id(flow)?))
}

fn repair(flow: &ActiveFlow) -> EngineResult<Repair> {
    Ok(Repair {
        date: date(flow, "date")?,
        mileage: int(flow, "mileage")?,
        description: text(flow, "description")?,
        cost: optional_float(flow, "cost"),
    })
}

fn maintenance(flow: &ActiveFlow) -> EngineResult<Maintenance> {
    Ok(Maintenance {
        date: date(flow, "date")?,
        mileage: int(flow, "mileage")?,
        works: text(flow, "works")?,
    })
}

fn missing_field(flow: &ActiveFlow, name: &str) -> EngineError {
    EngineError::Internal(format!("{:?} completed without '{}'", flow.flow, name))
}

fn date(flow: &ActiveFlow, name: &str) -> EngineResult<NaiveDate> {
    flow.field(name)
        .and_then(FieldValue::as_date)
        .ok_or_else(|| missing_field(flow, name))
}

fn int(flow: &ActiveFlow, name: &str) -> EngineResult<i64> {
    flow.field(name)
        .and_then(FieldValue::as_int)
        .ok_or_else(|| missing_field(flow, name))
}

fn float(flow: &ActiveFlow, name: &str) -> EngineResult<f64> {
    flow.field(name)
        .and_then(FieldValue::as_float)
        .ok_or_else(|| missing_field(flow, name))
}

fn text(flow: &ActiveFlow, name: &str) -> EngineResult<String> {
    flow.field(name)
        .and_then(FieldValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| missing_field(flow, name))
}

/// Absent and `Null` both read as `None`.
fn optional_text(flow: &ActiveFlow, name: &str) -> Option<String> {
    flow.field(name).and_then(FieldValue::as_text).map(str::to_string)
}

fn optional_float(flow: &ActiveFlow, name: &str) -> Option<f64> {
    flow.field(name).and_then(FieldValue::as_float)
}
