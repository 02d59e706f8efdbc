//! Canonical per-vehicle snapshot shared by the poll loop and status rendering.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Tire pressures in the raw unit reported by the vehicle (bar).
pub struct TirePressures {
    pub fl: Option<f64>,
    pub fr: Option<f64>,
    pub rl: Option<f64>,
    pub rr: Option<f64>,
}

impl TirePressures {
    /// Positions in display order with their upper-case keys.
    pub fn positions(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("FL", self.fl),
            ("FR", self.fr),
            ("RL", self.rl),
            ("RR", self.rr),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Door-open flags: driver front/rear, passenger front/rear.
pub struct DoorStates {
    pub df: Option<bool>,
    pub dr: Option<bool>,
    pub pf: Option<bool>,
    pub pr: Option<bool>,
}

impl DoorStates {
    pub fn positions(&self) -> [(&'static str, Option<bool>); 4] {
        [
            ("DF", self.df),
            ("DR", self.dr),
            ("PF", self.pf),
            ("PR", self.pr),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Window-open flags: front driver/passenger, rear driver/passenger.
pub struct WindowStates {
    pub fd: Option<bool>,
    pub fp: Option<bool>,
    pub rd: Option<bool>,
    pub rp: Option<bool>,
}

impl WindowStates {
    pub fn positions(&self) -> [(&'static str, Option<bool>); 4] {
        [
            ("FD", self.fd),
            ("FP", self.fp),
            ("RD", self.rd),
            ("RP", self.rp),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Latest known full telemetry state of one vehicle.
pub struct VehicleSnapshot {
    pub vehicle_id: String,
    pub label: String,
    #[serde(default)]
    pub battery: Option<i64>,
    #[serde(default)]
    pub odometer: Option<f64>,
    #[serde(default)]
    pub charging_state: Option<String>,
    #[serde(default)]
    pub charger_power: Option<f64>,
    #[serde(default)]
    pub inside_temp: Option<f64>,
    #[serde(default)]
    pub outside_temp: Option<f64>,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(default)]
    pub sentry_mode: Option<bool>,
    #[serde(default)]
    pub software_version: Option<String>,
    #[serde(default)]
    pub tire_pressure: TirePressures,
    #[serde(default)]
    pub doors: DoorStates,
    #[serde(default)]
    pub windows: WindowStates,
    #[serde(default)]
    pub heading: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notifications: Vec<String>,
    pub timestamp: String,
}

impl VehicleSnapshot {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_optional(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Append-only record of a significant change observation.
pub struct LoggedEvent {
    pub timestamp: String,
    pub vehicle_id: String,
    pub label: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed: Option<f64>,
    pub battery: Option<i64>,
    pub address: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
/// The motion and charge fields the change and trip engines consume each cycle.
pub struct TelemetryReading {
    pub coordinates: Option<Coordinates>,
    pub speed_mph: Option<f64>,
    pub battery: Option<i64>,
}
