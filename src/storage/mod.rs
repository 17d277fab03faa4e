//! Domain storage: the trait the engine talks to, its record types and the
//! SQLite implementation.

pub mod db;
pub mod migrations;
pub mod stats;

use async_trait::async_trait;
use chrono::NaiveDate;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use thiserror::Error;

pub use db::{create_pool, DbConnection, DbPool, SqliteStorage};
pub use stats::{FuelStats, MaintenanceAlert};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("query failed: {0}")]
    Query(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: i64,
    pub model: String,
    pub reg_number: String,
    pub vin: Option<String>,
    pub year: Option<i64>,
    pub mileage: i64,
    pub tachograph_required: bool,
    pub osago_valid: Option<NaiveDate>,
    pub tech_inspection_valid: Option<NaiveDate>,
    pub skzi_valid_date: Option<NaiveDate>,
    /// Mileage at which the next scheduled service is due.
    pub next_to: Option<i64>,
    pub next_to_date: Option<NaiveDate>,
    pub last_to_date: Option<NaiveDate>,
    pub fuel_type: Option<String>,
    pub fuel_tank_capacity: Option<f64>,
    pub avg_fuel_consumption: Option<f64>,
}

impl Vehicle {
    /// Label used on buttons and card headers: `Model (REG)`.
    pub fn title(&self) -> String {
        format!("{} ({})", self.model, self.reg_number)
    }
}

/// Data collected by the vehicle creation flow.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVehicle {
    pub model: String,
    pub reg_number: String,
    pub vin: Option<String>,
    pub mileage: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Maintenance {
    pub date: NaiveDate,
    pub mileage: i64,
    pub works: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceRecord {
    pub id: i64,
    pub vehicle_id: i64,
    pub date: NaiveDate,
    pub mileage: i64,
    pub works: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repair {
    pub date: NaiveDate,
    pub mileage: i64,
    pub description: String,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairRecord {
    pub id: i64,
    pub vehicle_id: i64,
    pub date: NaiveDate,
    pub mileage: i64,
    pub description: String,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refueling {
    pub date: NaiveDate,
    pub mileage: i64,
    pub liters: f64,
    pub cost_per_liter: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefuelingRecord {
    pub id: i64,
    pub vehicle_id: i64,
    pub date: NaiveDate,
    pub mileage: i64,
    pub liters: f64,
    pub cost_per_liter: f64,
}

impl RefuelingRecord {
    pub fn total_cost(&self) -> f64 {
        self.liters * self.cost_per_liter
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

/// Fuel parameters edit; `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FuelInfoUpdate {
    pub fuel_type: Option<String>,
    pub tank_capacity: Option<f64>,
    pub avg_consumption: Option<f64>,
}

impl FuelInfoUpdate {
    pub fn is_empty(&self) -> bool {
        self.fuel_type.is_none() && self.tank_capacity.is_none() && self.avg_consumption.is_none()
    }
}

/// A typed value collected from the user.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// How a single-field edit coerces its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Date,
}

/// Vehicle columns editable one at a time, in picklist order.
///
/// The snake_case name doubles as the SQL column and the callback key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum VehicleField {
    Model,
    RegNumber,
    Vin,
    Year,
    OsagoValid,
    TechInspectionValid,
    SkziValidDate,
    NextTo,
    NextToDate,
    LastToDate,
}

impl VehicleField {
    pub fn all() -> impl Iterator<Item = VehicleField> {
        Self::iter()
    }

    pub fn key(&self) -> &'static str {
        (*self).into()
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Model | Self::RegNumber | Self::Vin => FieldKind::Text,
            Self::Year | Self::NextTo => FieldKind::Integer,
            Self::OsagoValid
            | Self::TechInspectionValid
            | Self::SkziValidDate
            | Self::NextToDate
            | Self::LastToDate => FieldKind::Date,
        }
    }

    /// Whether `-` may clear the column.
    pub fn nullable(&self) -> bool {
        !matches!(self, Self::Model | Self::RegNumber)
    }
}

/// Domain storage used by the engine.
///
/// Reads return `Ok(None)`/empty collections for missing rows. Writes that
/// address a row by id return `Ok(false)` when the row does not exist.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_vehicle(&self, vehicle_id: i64) -> StorageResult<Option<Vehicle>>;
    /// All vehicles ordered by model.
    async fn list_vehicles(&self) -> StorageResult<Vec<Vehicle>>;
    async fn add_vehicle(&self, vehicle: NewVehicle) -> StorageResult<i64>;
    /// Stores `mileage` only if it is greater than the current value.
    async fn update_mileage(&self, vehicle_id: i64, mileage: i64) -> StorageResult<bool>;
    async fn update_vehicle_field(&self, vehicle_id: i64, field: VehicleField, value: FieldValue) -> StorageResult<bool>;
    async fn update_fuel_info(&self, vehicle_id: i64, update: FuelInfoUpdate) -> StorageResult<bool>;

    /// Adds the record and, atomically with it, moves the vehicle's
    /// `last_to_date` forward to the record's date.
    async fn add_maintenance(&self, vehicle_id: i64, record: Maintenance) -> StorageResult<i64>;
    async fn update_maintenance(&self, record_id: i64, record: Maintenance) -> StorageResult<bool>;
    async fn get_maintenance(&self, record_id: i64) -> StorageResult<Option<MaintenanceRecord>>;
    /// Newest first.
    async fn get_maintenance_history(&self, vehicle_id: i64) -> StorageResult<Vec<MaintenanceRecord>>;

    async fn add_repair(&self, vehicle_id: i64, repair: Repair) -> StorageResult<i64>;
    async fn update_repair(&self, record_id: i64, repair: Repair) -> StorageResult<bool>;
    async fn get_repair(&self, record_id: i64) -> StorageResult<Option<RepairRecord>>;
    /// Newest first.
    async fn get_repairs(&self, vehicle_id: i64) -> StorageResult<Vec<RepairRecord>>;
    async fn delete_repair(&self, record_id: i64) -> StorageResult<bool>;

    async fn add_refueling(&self, vehicle_id: i64, refueling: Refueling) -> StorageResult<i64>;
    /// Newest first.
    async fn get_refueling_history(&self, vehicle_id: i64) -> StorageResult<Vec<RefuelingRecord>>;

    async fn set_admin_status(&self, user_id: i64, is_admin: bool) -> StorageResult<bool>;
    async fn is_admin(&self, user_id: i64) -> StorageResult<bool>;
    /// Inserts the user or refreshes their names; never touches the admin flag.
    async fn register_user(&self, user_id: i64, username: Option<String>, full_name: Option<String>) -> StorageResult<()>;
    async fn get_user(&self, user_id: i64) -> StorageResult<Option<User>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_vehicle_field_keys_round_trip_through_strum() {
        for field in VehicleField::all() {
            assert_eq!(field.as_ref(), field.key());
            assert_eq!(VehicleField::from_str(field.key()), Ok(field));
        }
        assert_eq!(VehicleField::all().count(), 10);
    }

    #[test]
    fn test_vehicle_field_kinds() {
        assert_eq!(VehicleField::Year.kind(), FieldKind::Integer);
        assert_eq!(VehicleField::OsagoValid.kind(), FieldKind::Date);
        assert_eq!(VehicleField::Vin.kind(), FieldKind::Text);
        assert!(!VehicleField::Model.nullable());
        assert!(VehicleField::Vin.nullable());
    }

    #[test]
    fn test_fuel_info_update_is_empty() {
        assert!(FuelInfoUpdate::default().is_empty());
        let update = FuelInfoUpdate {
            tank_capacity: Some(60.0),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
