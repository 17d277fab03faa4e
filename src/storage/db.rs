use async_trait::async_trait;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Type, Value};
use rusqlite::{params, OptionalExtension, Row};

use super::migrations::run_migrations;
use super::{
    FieldValue, FuelInfoUpdate, Maintenance, MaintenanceRecord, NewVehicle, Refueling, RefuelingRecord, Repair,
    RepairRecord, Storage, StorageError, StorageResult, User, Vehicle, VehicleField,
};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const SQL_DATE_FORMAT: &str = "%Y-%m-%d";

const VEHICLE_COLUMNS: &str = "id, model, reg_number, vin, year, mileage, tachograph_required, osago_valid, \
     tech_inspection_valid, skzi_valid_date, next_to, next_to_date, last_to_date, fuel_type, \
     fuel_tank_capacity, avg_fuel_consumption";

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema migrations.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
pub fn create_pool(database_path: &str) -> StorageResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

/// [`Storage`] backed by SQLite.
///
/// Every call borrows a pooled connection on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: DbPool,
}

impl SqliteStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Opens (or creates) the database file and applies migrations.
    pub fn open(database_path: &str) -> StorageResult<Self> {
        Ok(Self::new(create_pool(database_path)?))
    }

    async fn with_conn<T, F>(&self, op: F) -> StorageResult<T>
    where
        F: FnOnce(&DbConnection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            op(&conn).map_err(StorageError::from)
        })
        .await
        .map_err(|e| StorageError::Query(format!("blocking task failed: {}", e)))?
    }
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format(SQL_DATE_FORMAT).to_string()
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, SQL_DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_date_column(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        NaiveDate::parse_from_str(&raw, SQL_DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn field_value_to_sql(value: FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::Text(s),
        FieldValue::Int(v) => Value::Integer(v),
        FieldValue::Float(v) => Value::Real(v),
        FieldValue::Date(d) => Value::Text(date_to_sql(d)),
        FieldValue::Null => Value::Null,
    }
}

fn vehicle_from_row(row: &Row) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: row.get(0)?,
        model: row.get(1)?,
        reg_number: row.get(2)?,
        vin: row.get(3)?,
        year: row.get(4)?,
        mileage: row.get(5)?,
        tachograph_required: row.get(6)?,
        osago_valid: optional_date_column(row, 7)?,
        tech_inspection_valid: optional_date_column(row, 8)?,
        skzi_valid_date: optional_date_column(row, 9)?,
        next_to: row.get(10)?,
        next_to_date: optional_date_column(row, 11)?,
        last_to_date: optional_date_column(row, 12)?,
        fuel_type: row.get(13)?,
        fuel_tank_capacity: row.get(14)?,
        avg_fuel_consumption: row.get(15)?,
    })
}

fn maintenance_from_row(row: &Row) -> rusqlite::Result<MaintenanceRecord> {
    Ok(MaintenanceRecord {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        date: date_column(row, 2)?,
        mileage: row.get(3)?,
        works: row.get(4)?,
    })
}

fn repair_from_row(row: &Row) -> rusqlite::Result<RepairRecord> {
    Ok(RepairRecord {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        date: date_column(row, 2)?,
        mileage: row.get(3)?,
        description: row.get(4)?,
        cost: row.get(5)?,
    })
}

fn refueling_from_row(row: &Row) -> rusqlite::Result<RefuelingRecord> {
    Ok(RefuelingRecord {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        date: date_column(row, 2)?,
        mileage: row.get(3)?,
        liters: row.get(4)?,
        cost_per_liter: row.get(5)?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        telegram_id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        is_admin: row.get(3)?,
    })
}

pub fn get_vehicle(conn: &DbConnection, vehicle_id: i64) -> rusqlite::Result<Option<Vehicle>> {
    conn.query_row(
        &format!("SELECT {} FROM vehicles WHERE id = ?1", VEHICLE_COLUMNS),
        [vehicle_id],
        vehicle_from_row,
    )
    .optional()
}

pub fn list_vehicles(conn: &DbConnection) -> rusqlite::Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM vehicles ORDER BY model, id", VEHICLE_COLUMNS))?;
    let rows = stmt.query_map([], vehicle_from_row)?;
    rows.collect()
}

pub fn add_vehicle(conn: &DbConnection, vehicle: &NewVehicle) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO vehicles (model, reg_number, vin, mileage) VALUES (?1, ?2, ?3, ?4)",
        params![vehicle.model, vehicle.reg_number, vehicle.vin, vehicle.mileage],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Writes the mileage only if it grows; the comparison happens in the same statement.
pub fn update_mileage(conn: &DbConnection, vehicle_id: i64, mileage: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE vehicles SET mileage = ?1 WHERE id = ?2 AND mileage < ?1",
        params![mileage, vehicle_id],
    )?;
    Ok(rows > 0)
}

pub fn update_vehicle_field(
    conn: &DbConnection,
    vehicle_id: i64,
    field: VehicleField,
    value: FieldValue,
) -> rusqlite::Result<bool> {
    // Column names come from the closed VehicleField set
    let sql = format!("UPDATE vehicles SET {} = ?1 WHERE id = ?2", field.key());
    let rows = conn.execute(&sql, params![field_value_to_sql(value), vehicle_id])?;
    Ok(rows > 0)
}

pub fn update_fuel_info(conn: &DbConnection, vehicle_id: i64, update: &FuelInfoUpdate) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE vehicles SET
            fuel_type = COALESCE(?1, fuel_type),
            fuel_tank_capacity = COALESCE(?2, fuel_tank_capacity),
            avg_fuel_consumption = COALESCE(?3, avg_fuel_consumption)
         WHERE id = ?4",
        params![update.fuel_type, update.tank_capacity, update.avg_consumption, vehicle_id],
    )?;
    Ok(rows > 0)
}

/// Inserts the record and moves the vehicle's `last_to_date` forward to its
/// date, in one transaction. An older date leaves `last_to_date` as it is.
pub fn add_maintenance(conn: &DbConnection, vehicle_id: i64, record: &Maintenance) -> rusqlite::Result<i64> {
    let tx = conn.unchecked_transaction()?;
    let done_on = date_to_sql(record.date);
    tx.execute(
        "INSERT INTO maintenance (vehicle_id, date, mileage, works) VALUES (?1, ?2, ?3, ?4)",
        params![vehicle_id, done_on, record.mileage, record.works],
    )?;
    let id = tx.last_insert_rowid();
    tx.execute(
        "UPDATE vehicles SET last_to_date = ?1 WHERE id = ?2 AND (last_to_date IS NULL OR last_to_date < ?1)",
        params![done_on, vehicle_id],
    )?;
    tx.commit()?;
    Ok(id)
}

pub fn update_maintenance(conn: &DbConnection, record_id: i64, record: &Maintenance) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE maintenance SET date = ?1, mileage = ?2, works = ?3 WHERE id = ?4",
        params![date_to_sql(record.date), record.mileage, record.works, record_id],
    )?;
    Ok(rows > 0)
}

pub fn get_maintenance(conn: &DbConnection, record_id: i64) -> rusqlite::Result<Option<MaintenanceRecord>> {
    conn.query_row(
        "SELECT id, vehicle_id, date, mileage, works FROM maintenance WHERE id = ?1",
        [record_id],
        maintenance_from_row,
    )
    .optional()
}

pub fn get_maintenance_history(conn: &DbConnection, vehicle_id: i64) -> rusqlite::Result<Vec<MaintenanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, date, mileage, works FROM maintenance
         WHERE vehicle_id = ?1 ORDER BY date DESC, mileage DESC, id DESC",
    )?;
    let rows = stmt.query_map([vehicle_id], maintenance_from_row)?;
    rows.collect()
}

pub fn add_repair(conn: &DbConnection, vehicle_id: i64, repair: &Repair) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO repairs (vehicle_id, date, mileage, description, cost) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![vehicle_id, date_to_sql(repair.date), repair.mileage, repair.description, repair.cost],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_repair(conn: &DbConnection, record_id: i64, repair: &Repair) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE repairs SET date = ?1, mileage = ?2, description = ?3, cost = ?4 WHERE id = ?5",
        params![date_to_sql(repair.date), repair.mileage, repair.description, repair.cost, record_id],
    )?;
    Ok(rows > 0)
}

pub fn get_repair(conn: &DbConnection, record_id: i64) -> rusqlite::Result<Option<RepairRecord>> {
    conn.query_row(
        "SELECT id, vehicle_id, date, mileage, description, cost FROM repairs WHERE id = ?1",
        [record_id],
        repair_from_row,
    )
    .optional()
}

pub fn get_repairs(conn: &DbConnection, vehicle_id: i64) -> rusqlite::Result<Vec<RepairRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, date, mileage, description, cost FROM repairs
         WHERE vehicle_id = ?1 ORDER BY date DESC, mileage DESC, id DESC",
    )?;
    let rows = stmt.query_map([vehicle_id], repair_from_row)?;
    rows.collect()
}

pub fn delete_repair(conn: &DbConnection, record_id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM repairs WHERE id = ?1", [record_id])?;
    Ok(rows > 0)
}

pub fn add_refueling(conn: &DbConnection, vehicle_id: i64, refueling: &Refueling) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO refueling (vehicle_id, date, mileage, liters, cost_per_liter) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            vehicle_id,
            date_to_sql(refueling.date),
            refueling.mileage,
            refueling.liters,
            refueling.cost_per_liter
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_refueling_history(conn: &DbConnection, vehicle_id: i64) -> rusqlite::Result<Vec<RefuelingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, date, mileage, liters, cost_per_liter FROM refueling
         WHERE vehicle_id = ?1 ORDER BY date DESC, mileage DESC, id DESC",
    )?;
    let rows = stmt.query_map([vehicle_id], refueling_from_row)?;
    rows.collect()
}

pub fn register_user(
    conn: &DbConnection,
    telegram_id: i64,
    username: Option<&str>,
    full_name: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, username, full_name, last_activity)
         VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
         ON CONFLICT(telegram_id) DO UPDATE SET
            username = excluded.username,
            full_name = excluded.full_name,
            last_activity = CURRENT_TIMESTAMP",
        params![telegram_id, username, full_name],
    )?;
    Ok(())
}

pub fn get_user(conn: &DbConnection, telegram_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT telegram_id, username, full_name, is_admin FROM users WHERE telegram_id = ?1",
        [telegram_id],
        user_from_row,
    )
    .optional()
}

pub fn set_admin_status(conn: &DbConnection, telegram_id: i64, is_admin: bool) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE users SET is_admin = ?1 WHERE telegram_id = ?2",
        params![is_admin, telegram_id],
    )?;
    Ok(rows > 0)
}

pub fn is_admin(conn: &DbConnection, telegram_id: i64) -> rusqlite::Result<bool> {
    let flag: Option<bool> = conn
        .query_row("SELECT is_admin FROM users WHERE telegram_id = ?1", [telegram_id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(flag.unwrap_or(false))
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_vehicle(&self, vehicle_id: i64) -> StorageResult<Option<Vehicle>> {
        self.with_conn(move |conn| get_vehicle(conn, vehicle_id)).await
    }

    async fn list_vehicles(&self) -> StorageResult<Vec<Vehicle>> {
        self.with_conn(list_vehicles).await
    }

    async fn add_vehicle(&self, vehicle: NewVehicle) -> StorageResult<i64> {
        let id = self.with_conn(move |conn| add_vehicle(conn, &vehicle)).await?;
        log::info!("Vehicle {} added", id);
        Ok(id)
    }

    async fn update_mileage(&self, vehicle_id: i64, mileage: i64) -> StorageResult<bool> {
        self.with_conn(move |conn| update_mileage(conn, vehicle_id, mileage)).await
    }

    async fn update_vehicle_field(&self, vehicle_id: i64, field: VehicleField, value: FieldValue) -> StorageResult<bool> {
        self.with_conn(move |conn| update_vehicle_field(conn, vehicle_id, field, value))
            .await
    }

    async fn update_fuel_info(&self, vehicle_id: i64, update: FuelInfoUpdate) -> StorageResult<bool> {
        self.with_conn(move |conn| update_fuel_info(conn, vehicle_id, &update)).await
    }

    async fn add_maintenance(&self, vehicle_id: i64, record: Maintenance) -> StorageResult<i64> {
        self.with_conn(move |conn| add_maintenance(conn, vehicle_id, &record)).await
    }

    async fn update_maintenance(&self, record_id: i64, record: Maintenance) -> StorageResult<bool> {
        self.with_conn(move |conn| update_maintenance(conn, record_id, &record)).await
    }

    async fn get_maintenance(&self, record_id: i64) -> StorageResult<Option<MaintenanceRecord>> {
        self.with_conn(move |conn| get_maintenance(conn, record_id)).await
    }

    async fn get_maintenance_history(&self, vehicle_id: i64) -> StorageResult<Vec<MaintenanceRecord>> {
        self.with_conn(move |conn| get_maintenance_history(conn, vehicle_id)).await
    }

    async fn add_repair(&self, vehicle_id: i64, repair: Repair) -> StorageResult<i64> {
        self.with_conn(move |conn| add_repair(conn, vehicle_id, &repair)).await
    }

    async fn update_repair(&self, record_id: i64, repair: Repair) -> StorageResult<bool> {
        self.with_conn(move |conn| update_repair(conn, record_id, &repair)).await
    }

    async fn get_repair(&self, record_id: i64) -> StorageResult<Option<RepairRecord>> {
        self.with_conn(move |conn| get_repair(conn, record_id)).await
    }

    async fn get_repairs(&self, vehicle_id: i64) -> StorageResult<Vec<RepairRecord>> {
        self.with_conn(move |conn| get_repairs(conn, vehicle_id)).await
    }

    async fn delete_repair(&self, record_id: i64) -> StorageResult<bool> {
        let deleted = self.with_conn(move |conn| delete_repair(conn, record_id)).await?;
        if deleted {
            log::info!("Repair {} deleted", record_id);
        }
        Ok(deleted)
    }

    async fn add_refueling(&self, vehicle_id: i64, refueling: Refueling) -> StorageResult<i64> {
        self.with_conn(move |conn| add_refueling(conn, vehicle_id, &refueling)).await
    }

    async fn get_refueling_history(&self, vehicle_id: i64) -> StorageResult<Vec<RefuelingRecord>> {
        self.with_conn(move |conn| get_refueling_history(conn, vehicle_id)).await
    }

    async fn set_admin_status(&self, user_id: i64, is_admin: bool) -> StorageResult<bool> {
        let changed = self
            .with_conn(move |conn| set_admin_status(conn, user_id, is_admin))
            .await?;
        if changed {
            log::info!("User {} admin status set to {}", user_id, is_admin);
        }
        Ok(changed)
    }

    async fn is_admin(&self, user_id: i64) -> StorageResult<bool> {
        self.with_conn(move |conn| is_admin(conn, user_id)).await
    }

    async fn register_user(&self, user_id: i64, username: Option<String>, full_name: Option<String>) -> StorageResult<()> {
        self.with_conn(move |conn| register_user(conn, user_id, username.as_deref(), full_name.as_deref()))
            .await
    }

    async fn get_user(&self, user_id: i64) -> StorageResult<Option<User>> {
        self.with_conn(move |conn| get_user(conn, user_id)).await
    }
}
