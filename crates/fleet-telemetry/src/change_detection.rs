//! Debounce filter deciding which poll readings become logged events.

use std::collections::HashMap;

use crate::geo::Coordinates;
use crate::vehicle_snapshot::TelemetryReading;

/// 0.02 miles is roughly 32 meters, above typical parked GPS jitter.
pub const DEFAULT_MIN_LOG_DISTANCE_MILES: f64 = 0.02;
pub const DEFAULT_MIN_LOG_BATTERY_DELTA: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeDetectionPolicy {
    pub min_distance_miles: f64,
    pub min_battery_delta: i64,
}

impl Default for ChangeDetectionPolicy {
    fn default() -> Self {
        Self {
            min_distance_miles: DEFAULT_MIN_LOG_DISTANCE_MILES,
            min_battery_delta: DEFAULT_MIN_LOG_BATTERY_DELTA,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Last logged values for a vehicle, the comparison point for the next cycle.
pub struct ChangeBaseline {
    pub coordinates: Option<Coordinates>,
    pub battery: Option<i64>,
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeAssessment {
    pub should_log: bool,
    pub first_observation: bool,
    pub distance_miles: Option<f64>,
    pub battery_delta: Option<i64>,
}

impl ChangeDetectionPolicy {
    pub fn assess(
        &self,
        previous: Option<&ChangeBaseline>,
        reading: &TelemetryReading,
    ) -> ChangeAssessment {
        let Some(previous) = previous else {
            return ChangeAssessment {
                should_log: true,
                first_observation: true,
                distance_miles: None,
                battery_delta: None,
            };
        };

        let distance_miles = match (previous.coordinates, reading.coordinates) {
            (Some(from), Some(to)) => Some(from.distance_miles(to)),
            _ => None,
        };
        let battery_delta = match (previous.battery, reading.battery) {
            (Some(before), Some(now)) => Some((now - before).abs()),
            _ => None,
        };
        // A value the baseline lacked counts as a change, or the baseline never recovers.
        let gained_fix = previous.coordinates.is_none() && reading.coordinates.is_some();
        let gained_battery = previous.battery.is_none() && reading.battery.is_some();
        let moved =
            gained_fix || distance_miles.is_some_and(|miles| miles >= self.min_distance_miles);
        let charged =
            gained_battery || battery_delta.is_some_and(|delta| delta >= self.min_battery_delta);

        ChangeAssessment {
            should_log: moved || charged,
            first_observation: false,
            distance_miles,
            battery_delta,
        }
    }
}

/// Per-vehicle baselines owned by the telemetry loop.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    policy: ChangeDetectionPolicy,
    baselines: HashMap<String, ChangeBaseline>,
}

impl ChangeDetector {
    pub fn new(policy: ChangeDetectionPolicy) -> Self {
        Self {
            policy,
            baselines: HashMap::new(),
        }
    }

    pub fn assess(&self, vehicle_id: &str, reading: &TelemetryReading) -> ChangeAssessment {
        self.policy.assess(self.baselines.get(vehicle_id), reading)
    }

    /// Moves the baseline forward; call only once the event has been appended.
    pub fn record_logged(&mut self, vehicle_id: &str, reading: &TelemetryReading, address: &str) {
        self.baselines.insert(
            vehicle_id.to_string(),
            ChangeBaseline {
                coordinates: reading.coordinates,
                battery: reading.battery,
                address: address.to_string(),
            },
        );
    }

    pub fn baseline(&self, vehicle_id: &str) -> Option<&ChangeBaseline> {
        self.baselines.get(vehicle_id)
    }
}
