//! In-memory storage recording every write.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use fleetbot::storage::{
    FieldValue, FuelInfoUpdate, Maintenance, MaintenanceRecord, NewVehicle, Refueling, RefuelingRecord, Repair,
    RepairRecord, Storage, StorageError, StorageResult, User, Vehicle, VehicleField,
};

#[derive(Default)]
struct Tables {
    vehicles: BTreeMap<i64, Vehicle>,
    maintenance: BTreeMap<i64, MaintenanceRecord>,
    repairs: BTreeMap<i64, RepairRecord>,
    refuelings: BTreeMap<i64, RefuelingRecord>,
    users: BTreeMap<i64, User>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Storage double with the same contract as the SQLite implementation.
///
/// Writes are logged as `name(args)` strings; [`MockStorage::fail`] makes
/// every call return a query error and [`MockStorage::fail_write`] only the
/// named write. A failed write changes nothing and is not logged.
#[derive(Default)]
pub struct MockStorage {
    tables: Mutex<Tables>,
    writes: Mutex<Vec<String>>,
    failing: AtomicBool,
    failing_write: Mutex<Option<String>>,
}

pub fn vehicle(id: i64, model: &str, reg_number: &str, mileage: i64) -> Vehicle {
    Vehicle {
        id,
        model: model.to_string(),
        reg_number: reg_number.to_string(),
        vin: None,
        year: None,
        mileage,
        tachograph_required: false,
        osago_valid: None,
        tech_inspection_valid: None,
        skzi_valid_date: None,
        next_to: None,
        next_to_date: None,
        last_to_date: None,
        fuel_type: None,
        fuel_tank_capacity: None,
        avg_fuel_consumption: None,
    }
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                next_id: 1000,
                ..Tables::default()
            }),
            ..Self::default()
        }
    }

    pub fn insert_vehicle(&self, vehicle: Vehicle) {
        self.tables.lock().unwrap().vehicles.insert(vehicle.id, vehicle);
    }

    pub fn insert_user(&self, telegram_id: i64, full_name: &str, is_admin: bool) {
        self.tables.lock().unwrap().users.insert(
            telegram_id,
            User {
                telegram_id,
                username: None,
                full_name: Some(full_name.to_string()),
                is_admin,
            },
        );
    }

    pub fn insert_repair(&self, vehicle_id: i64, repair: Repair) -> i64 {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        tables.repairs.insert(
            id,
            RepairRecord {
                id,
                vehicle_id,
                date: repair.date,
                mileage: repair.mileage,
                description: repair.description,
                cost: repair.cost,
            },
        );
        id
    }

    pub fn insert_maintenance(&self, vehicle_id: i64, record: Maintenance) -> i64 {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        tables.maintenance.insert(
            id,
            MaintenanceRecord {
                id,
                vehicle_id,
                date: record.date,
                mileage: record.mileage,
                works: record.works,
            },
        );
        id
    }

    pub fn vehicle(&self, id: i64) -> Option<Vehicle> {
        self.tables.lock().unwrap().vehicles.get(&id).cloned()
    }

    pub fn repairs(&self) -> Vec<RepairRecord> {
        self.tables.lock().unwrap().repairs.values().cloned().collect()
    }

    pub fn refuelings(&self) -> Vec<RefuelingRecord> {
        self.tables.lock().unwrap().refuelings.values().cloned().collect()
    }

    pub fn maintenance(&self) -> Vec<MaintenanceRecord> {
        self.tables.lock().unwrap().maintenance.values().cloned().collect()
    }

    pub fn user(&self, id: i64) -> Option<User> {
        self.tables.lock().unwrap().users.get(&id).cloned()
    }

    /// Write calls so far, oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_named(&self, name: &str) -> usize {
        self.writes().iter().filter(|w| w.starts_with(&format!("{}(", name))).count()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Query("database is locked".into()));
        }
        Ok(())
    }

    /// Makes every later call of the write `name` fail.
    pub fn fail_write(&self, name: &str) {
        *self.failing_write.lock().unwrap() = Some(name.to_string());
    }

    fn record(&self, write: String) -> StorageResult<()> {
        if let Some(name) = self.failing_write.lock().unwrap().as_deref() {
            if write.starts_with(&format!("{}(", name)) {
                return Err(StorageError::Query(format!("{} failed: disk I/O error", name)));
            }
        }
        self.writes.lock().unwrap().push(write);
        Ok(())
    }
}

fn newest_first<T: Clone>(records: impl Iterator<Item = T>, key: impl Fn(&T) -> (NaiveDate, i64)) -> Vec<T> {
    let mut records: Vec<T> = records.collect();
    records.sort_by_key(|r| std::cmp::Reverse(key(r)));
    records
}

#[async_trait]
impl Storage for MockStorage {
    async fn get_vehicle(&self, vehicle_id: i64) -> StorageResult<Option<Vehicle>> {
        self.check()?;
        Ok(self.vehicle(vehicle_id))
    }

    async fn list_vehicles(&self) -> StorageResult<Vec<Vehicle>> {
        self.check()?;
        let mut vehicles: Vec<Vehicle> = self.tables.lock().unwrap().vehicles.values().cloned().collect();
        vehicles.sort_by(|a, b| a.model.cmp(&b.model));
        Ok(vehicles)
    }

    async fn add_vehicle(&self, new: NewVehicle) -> StorageResult<i64> {
        self.check()?;
        self.record(format!("add_vehicle({})", new.model))?;
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        let mut created = vehicle(id, &new.model, &new.reg_number, new.mileage);
        created.vin = new.vin;
        tables.vehicles.insert(id, created);
        Ok(id)
    }

    async fn update_mileage(&self, vehicle_id: i64, mileage: i64) -> StorageResult<bool> {
        self.check()?;
        self.record(format!("update_mileage({}, {})", vehicle_id, mileage))?;
        let mut tables = self.tables.lock().unwrap();
        match tables.vehicles.get_mut(&vehicle_id) {
            Some(v) if mileage > v.mileage => {
                v.mileage = mileage;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_vehicle_field(&self, vehicle_id: i64, field: VehicleField, value: FieldValue) -> StorageResult<bool> {
        self.check()?;
        self.record(format!("update_vehicle_field({}, {}, {:?})", vehicle_id, field.key(), value))?;
        let mut tables = self.tables.lock().unwrap();
        let Some(v) = tables.vehicles.get_mut(&vehicle_id) else {
            return Ok(false);
        };
        match field {
            VehicleField::Model => v.model = value.as_text().unwrap_or_default().to_string(),
            VehicleField::RegNumber => v.reg_number = value.as_text().unwrap_or_default().to_string(),
            VehicleField::Vin => v.vin = value.as_text().map(str::to_string),
            VehicleField::Year => v.year = value.as_int(),
            VehicleField::OsagoValid => v.osago_valid = value.as_date(),
            VehicleField::TechInspectionValid => v.tech_inspection_valid = value.as_date(),
            VehicleField::SkziValidDate => v.skzi_valid_date = value.as_date(),
            VehicleField::NextTo => v.next_to = value.as_int(),
            VehicleField::NextToDate => v.next_to_date = value.as_date(),
            VehicleField::LastToDate => v.last_to_date = value.as_date(),
        }
        Ok(true)
    }

    async fn update_fuel_info(&self, vehicle_id: i64, update: FuelInfoUpdate) -> StorageResult<bool> {
        self.check()?;
        self.record(format!("update_fuel_info({}, {:?})", vehicle_id, update))?;
        let mut tables = self.tables.lock().unwrap();
        let Some(v) = tables.vehicles.get_mut(&vehicle_id) else {
            return Ok(false);
        };
        if let Some(fuel_type) = update.fuel_type {
            v.fuel_type = Some(fuel_type);
        }
        if let Some(capacity) = update.tank_capacity {
            v.fuel_tank_capacity = Some(capacity);
        }
        if let Some(consumption) = update.avg_consumption {
            v.avg_fuel_consumption = Some(consumption);
        }
        Ok(true)
    }

    async fn add_maintenance(&self, vehicle_id: i64, record: Maintenance) -> StorageResult<i64> {
        self.check()?;
        self.record(format!("add_maintenance({}, {})", vehicle_id, record.works))?;
        let done_on = record.date;
        let id = self.insert_maintenance(vehicle_id, record);
        if let Some(v) = self.tables.lock().unwrap().vehicles.get_mut(&vehicle_id) {
            if v.last_to_date.map_or(true, |last| last < done_on) {
                v.last_to_date = Some(done_on);
            }
        }
        Ok(id)
    }

    async fn update_maintenance(&self, record_id: i64, record: Maintenance) -> StorageResult<bool> {
        self.check()?;
        self.record(format!("update_maintenance({})", record_id))?;
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables.maintenance.get_mut(&record_id) else {
            return Ok(false);
        };
        stored.date = record.date;
        stored.mileage = record.mileage;
        stored.works = record.works;
        Ok(true)
    }

    async fn get_maintenance(&self, record_id: i64) -> StorageResult<Option<MaintenanceRecord>> {
        self.check()?;
        Ok(self.tables.lock().unwrap().maintenance.get(&record_id).cloned())
    }

    async fn get_maintenance_history(&self, vehicle_id: i64) -> StorageResult<Vec<MaintenanceRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(newest_first(
            tables.maintenance.values().filter(|r| r.vehicle_id == vehicle_id).cloned(),
            |r| (r.date, r.id),
        ))
    }

    async fn add_repair(&self, vehicle_id: i64, repair: Repair) -> StorageResult<i64> {
        self.check()?;
        self.record(format!("add_repair({}, {})", vehicle_id, repair.description))?;
        Ok(self.insert_repair(vehicle_id, repair))
    }

    async fn update_repair(&self, record_id: i64, repair: Repair) -> StorageResult<bool> {
        self.check()?;
        self.record(format!("update_repair({})", record_id))?;
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables.repairs.get_mut(&record_id) else {
            return Ok(false);
        };
        stored.date = repair.date;
        stored.mileage = repair.mileage;
        stored.description = repair.description;
        stored.cost = repair.cost;
        Ok(true)
    }

    async fn get_repair(&self, record_id: i64) -> StorageResult<Option<RepairRecord>> {
        self.check()?;
        Ok(self.tables.lock().unwrap().repairs.get(&record_id).cloned())
    }

    async fn get_repairs(&self, vehicle_id: i64) -> StorageResult<Vec<RepairRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(newest_first(
            tables.repairs.values().filter(|r| r.vehicle_id == vehicle_id).cloned(),
            |r| (r.date, r.id),
        ))
    }

    async fn delete_repair(&self, record_id: i64) -> StorageResult<bool> {
        self.check()?;
        self.record(format!("delete_repair({})", record_id))?;
        Ok(self.tables.lock().unwrap().repairs.remove(&record_id).is_some())
    }

    async fn add_refueling(&self, vehicle_id: i64, refueling: Refueling) -> StorageResult<i64> {
        self.check()?;
        self.record(format!("add_refueling({}, {})", vehicle_id, refueling.liters))?;
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        tables.refuelings.insert(
            id,
            RefuelingRecord {
                id,
                vehicle_id,
                date: refueling.date,
                mileage: refueling.mileage,
                liters: refueling.liters,
                cost_per_liter: refueling.cost_per_liter,
            },
        );
        Ok(id)
    }

    async fn get_refueling_history(&self, vehicle_id: i64) -> StorageResult<Vec<RefuelingRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(newest_first(
            tables.refuelings.values().filter(|r| r.vehicle_id == vehicle_id).cloned(),
            |r| (r.date, r.id),
        ))
    }

    async fn set_admin_status(&self, user_id: i64, is_admin: bool) -> StorageResult<bool> {
        self.check()?;
        self.record(format!("set_admin_status({}, {})", user_id, is_admin))?;
        let mut tables = self.tables.lock().unwrap();
        match tables.users.get_mut(&user_id) {
            Some(user) => {
                user.is_admin = is_admin;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn is_admin(&self, user_id: i64) -> StorageResult<bool> {
        self.check()?;
        Ok(self.user(user_id).is_some_and(|u| u.is_admin))
    }

    async fn register_user(&self, user_id: i64, username: Option<String>, full_name: Option<String>) -> StorageResult<()> {
        self.check()?;
        self.record(format!("register_user({})", user_id))?;
        let mut tables = self.tables.lock().unwrap();
        let user = tables.users.entry(user_id).or_insert(User {
            telegram_id: user_id,
            username: None,
            full_name: None,
            is_admin: false,
        });
        user.username = username;
        user.full_name = full_name;
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> StorageResult<Option<User>> {
        self.check()?;
        Ok(self.user(user_id))
    }
}
