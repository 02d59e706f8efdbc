//! Maps raw `vehicle_data` payloads into [`VehicleSnapshot`] and [`TelemetryReading`].

use chrono::{DateTime, Utc};
use fleet_core::utc_timestamp_iso;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::geo::Coordinates;
use crate::vehicle_snapshot::{
    DoorStates, TelemetryReading, TirePressures, VehicleSnapshot, WindowStates,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawVehicleData {
    #[serde(default)]
    pub drive_state: RawDriveState,
    #[serde(default)]
    pub charge_state: RawChargeState,
    #[serde(default)]
    pub climate_state: RawClimateState,
    #[serde(default)]
    pub vehicle_state: RawVehicleState,
    #[serde(default)]
    pub notifications: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDriveState {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawChargeState {
    pub battery_level: Option<f64>,
    pub charging_state: Option<String>,
    pub charger_power: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawClimateState {
    pub inside_temp: Option<f64>,
    pub outside_temp: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawVehicleState {
    pub odometer: Option<f64>,
    pub locked: Option<bool>,
    pub sentry_mode: Option<bool>,
    #[serde(alias = "software_version")]
    pub car_version: Option<String>,
    pub tpms_pressure_fl: Option<f64>,
    pub tpms_pressure_fr: Option<f64>,
    pub tpms_pressure_rl: Option<f64>,
    pub tpms_pressure_rr: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_open_flag")]
    pub df: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_open_flag")]
    pub dr: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_open_flag")]
    pub pf: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_open_flag")]
    pub pr: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_open_flag")]
    pub fd_window: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_open_flag")]
    pub fp_window: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_open_flag")]
    pub rd_window: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_open_flag")]
    pub rp_window: Option<bool>,
}

// Door and window fields arrive as 0/1 integers on most firmware, booleans on some.
fn deserialize_open_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Bool(flag) => Some(flag),
        Value::Number(number) => number.as_f64().map(|raw| raw != 0.0),
        _ => None,
    }))
}

/// Extracts the motion and charge fields consumed by change detection and trips.
pub fn telemetry_reading(raw: &RawVehicleData) -> TelemetryReading {
    TelemetryReading {
        coordinates: Coordinates::from_optional(raw.drive_state.latitude, raw.drive_state.longitude),
        speed_mph: raw.drive_state.speed.filter(|speed| speed.is_finite()),
        battery: round_to_i64(raw.charge_state.battery_level),
    }
}

/// Builds the canonical snapshot for one vehicle. Missing fields stay `None`.
pub fn normalize_vehicle_data(
    vehicle_id: &str,
    label: &str,
    raw: &RawVehicleData,
    address: &str,
    observed_at: DateTime<Utc>,
) -> VehicleSnapshot {
    let drive = &raw.drive_state;
    let charge = &raw.charge_state;
    let climate = &raw.climate_state;
    let vehicle = &raw.vehicle_state;
    VehicleSnapshot {
        vehicle_id: vehicle_id.to_string(),
        label: label.to_string(),
        battery: round_to_i64(charge.battery_level),
        odometer: vehicle.odometer,
        charging_state: charge.charging_state.clone(),
        charger_power: charge.charger_power,
        inside_temp: climate.inside_temp,
        outside_temp: climate.outside_temp,
        locked: vehicle.locked,
        sentry_mode: vehicle.sentry_mode,
        software_version: vehicle.car_version.clone(),
        tire_pressure: TirePressures {
            fl: vehicle.tpms_pressure_fl,
            fr: vehicle.tpms_pressure_fr,
            rl: vehicle.tpms_pressure_rl,
            rr: vehicle.tpms_pressure_rr,
        },
        doors: DoorStates {
            df: vehicle.df,
            dr: vehicle.dr,
            pf: vehicle.pf,
            pr: vehicle.pr,
        },
        windows: WindowStates {
            fd: vehicle.fd_window,
            fp: vehicle.fp_window,
            rd: vehicle.rd_window,
            rp: vehicle.rp_window,
        },
        heading: round_to_i64(drive.heading),
        latitude: drive.latitude,
        longitude: drive.longitude,
        address: address.to_string(),
        notifications: raw.notifications.iter().map(notification_text).collect(),
        timestamp: utc_timestamp_iso(observed_at),
    }
}

fn notification_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn round_to_i64(value: Option<f64>) -> Option<i64> {
    value
        .filter(|raw| raw.is_finite())
        .map(|raw| raw.round() as i64)
}
