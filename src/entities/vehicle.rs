// 🚚 Vehicle Entity - fleet units referenced by journal events
//
// License plate, call sign and VIN are each unique across the fleet.
// Creation checks them explicitly so the caller learns which one collided.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{format_timestamp, now, timestamp_column};
use crate::error::{is_constraint_violation, FleetError, Result};
use crate::money::Money;

// ============================================================================
// VEHICLE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    #[default]
    Active,
    Maintenance,
    Sold,
    Retired,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::Sold => "sold",
            VehicleStatus::Retired => "retired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(VehicleStatus::Active),
            "maintenance" => Some(VehicleStatus::Maintenance),
            "sold" => Some(VehicleStatus::Sold),
            "retired" => Some(VehicleStatus::Retired),
            _ => None,
        }
    }
}

// ============================================================================
// VEHICLE ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub engine_volume: Option<f64>,
    pub vin_code: String,
    pub license_plate: String,
    pub call_sign: String,
    pub mileage: i64,
    pub cost: Money,
    pub status: VehicleStatus,
    pub created_at: NaiveDateTime,
}

impl Vehicle {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(10)?;
        Ok(Vehicle {
            id: row.get(0)?,
            brand: row.get(1)?,
            model: row.get(2)?,
            year: row.get(3)?,
            engine_volume: row.get(4)?,
            vin_code: row.get(5)?,
            license_plate: row.get(6)?,
            call_sign: row.get(7)?,
            mileage: row.get(8)?,
            cost: row.get(9)?,
            status: VehicleStatus::parse(&status).unwrap_or_default(),
            created_at: timestamp_column(row, 11)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == VehicleStatus::Active
    }
}

/// Input for `create_vehicle`
#[derive(Debug, Clone, Default)]
pub struct NewVehicle {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub engine_volume: Option<f64>,
    pub vin_code: String,
    pub license_plate: String,
    pub call_sign: String,
    pub mileage: i64,
    pub cost: Money,
}

/// Vehicle as submitted by a form: every field is a string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehicleForm {
    pub brand: String,
    pub model: String,
    pub year: String,
    pub engine_volume: String,
    pub vin_code: String,
    pub license_plate: String,
    pub call_sign: String,
    pub mileage: String,
    pub cost: String,
}

impl VehicleForm {
    /// Year must be a number. Mileage and cost fall back to zero, an
    /// unreadable engine volume is left empty.
    pub fn into_new_vehicle(self) -> Result<NewVehicle> {
        let year = self.year.trim().parse::<i32>().map_err(|_| {
            FleetError::InvalidInput(format!("year '{}' is not a number", self.year))
        })?;

        Ok(NewVehicle {
            brand: self.brand.trim().to_string(),
            model: self.model.trim().to_string(),
            year,
            engine_volume: self.engine_volume.trim().parse::<f64>().ok(),
            vin_code: self.vin_code.trim().to_string(),
            license_plate: self.license_plate.trim().to_string(),
            call_sign: self.call_sign.trim().to_string(),
            mileage: self.mileage.trim().parse::<i64>().unwrap_or(0),
            cost: Money::parse_lenient(&self.cost),
        })
    }
}

const VEHICLE_COLUMNS: &str = "id, brand, model, year, engine_volume, vin_code, license_plate, \
                               call_sign, mileage, cost, status, created_at";

// Checked in this order; the first collision is reported
const UNIQUE_FIELDS: [(&str, &str); 3] = [
    ("license_plate", "license plate"),
    ("call_sign", "call sign"),
    ("vin_code", "VIN"),
];

pub fn create_vehicle(conn: &Connection, vehicle: &NewVehicle) -> Result<Vehicle> {
    for (field, value) in [
        ("brand", &vehicle.brand),
        ("model", &vehicle.model),
        ("vin_code", &vehicle.vin_code),
        ("license_plate", &vehicle.license_plate),
        ("call_sign", &vehicle.call_sign),
    ] {
        if value.trim().is_empty() {
            return Err(FleetError::InvalidInput(format!("{} is required", field)));
        }
    }

    for (column, label) in UNIQUE_FIELDS {
        let value = unique_value(vehicle, column);
        if vehicle_exists_with(conn, column, value)? {
            warn!(field = label, value, "Vehicle rejected: duplicate");
            return Err(FleetError::Conflict {
                field: label,
                value: value.to_string(),
            });
        }
    }

    let result = conn.execute(
        "INSERT INTO vehicles (
            brand, model, year, engine_volume, vin_code, license_plate,
            call_sign, mileage, cost, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            vehicle.brand,
            vehicle.model,
            vehicle.year,
            vehicle.engine_volume,
            vehicle.vin_code,
            vehicle.license_plate,
            vehicle.call_sign,
            vehicle.mileage,
            vehicle.cost,
            VehicleStatus::Active.as_str(),
            format_timestamp(&now()),
        ],
    );

    match result {
        Ok(_) => {}
        // Another writer slipped in between the checks and the insert
        Err(e) if is_constraint_violation(&e) => {
            return Err(FleetError::Conflict {
                field: "license plate, call sign or VIN",
                value: vehicle.license_plate.clone(),
            })
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    info!(vehicle_id = id, call_sign = %vehicle.call_sign, "Vehicle created");
    get_vehicle(conn, id)
}

fn unique_value<'a>(vehicle: &'a NewVehicle, column: &str) -> &'a str {
    match column {
        "license_plate" => &vehicle.license_plate,
        "call_sign" => &vehicle.call_sign,
        _ => &vehicle.vin_code,
    }
}

fn vehicle_exists_with(conn: &Connection, column: &str, value: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM vehicles WHERE {} = ?1", column),
            [value],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn get_vehicle(conn: &Connection, id: i64) -> Result<Vehicle> {
    conn.query_row(
        &format!("SELECT {} FROM vehicles WHERE id = ?1", VEHICLE_COLUMNS),
        [id],
        Vehicle::from_row,
    )
    .optional()?
    .ok_or_else(|| FleetError::not_found("vehicle", id))
}

pub fn list_vehicles(conn: &Connection) -> Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM vehicles ORDER BY call_sign",
        VEHICLE_COLUMNS
    ))?;

    let vehicles = stmt
        .query_map([], Vehicle::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(vehicles)
}

pub fn set_vehicle_status(conn: &Connection, id: i64, status: VehicleStatus) -> Result<Vehicle> {
    let updated = conn.execute(
        "UPDATE vehicles SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;

    if updated == 0 {
        return Err(FleetError::not_found("vehicle", id));
    }

    info!(vehicle_id = id, status = status.as_str(), "Vehicle status changed");
    get_vehicle(conn, id)
}

pub fn vehicle_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM vehicles WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}
