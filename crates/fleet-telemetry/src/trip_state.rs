//! Per-vehicle moving/stationary tracking and trip summaries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fleet_core::elapsed_minutes;

use crate::geo::Coordinates;

/// Speeds strictly above this (mph) count as moving.
pub const DEFAULT_MOVING_SPEED_MPH: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TripPhase {
    #[default]
    Stationary,
    Moving {
        started_at: DateTime<Utc>,
        origin: Option<Coordinates>,
    },
}

impl TripPhase {
    pub fn is_moving(&self) -> bool {
        matches!(self, Self::Moving { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Emitted once on each `Moving -> Stationary` transition.
pub struct TripSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: f64,
    pub origin: Option<Coordinates>,
    pub destination: Option<Coordinates>,
    pub distance_miles: Option<f64>,
}

/// Trip phases for every vehicle seen by this process. Not persisted.
#[derive(Debug)]
pub struct TripTracker {
    moving_speed_mph: f64,
    phases: HashMap<String, TripPhase>,
}

impl Default for TripTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MOVING_SPEED_MPH)
    }
}

impl TripTracker {
    pub fn new(moving_speed_mph: f64) -> Self {
        Self {
            moving_speed_mph,
            phases: HashMap::new(),
        }
    }

    pub fn phase(&self, vehicle_id: &str) -> TripPhase {
        self.phases.get(vehicle_id).copied().unwrap_or_default()
    }

    /// Feeds one poll observation. Returns a summary when a trip just ended.
    pub fn observe(
        &mut self,
        vehicle_id: &str,
        speed_mph: Option<f64>,
        position: Option<Coordinates>,
        now: DateTime<Utc>,
    ) -> Option<TripSummary> {
        let moving = speed_mph.is_some_and(|speed| speed > self.moving_speed_mph);
        let phase = self.phases.entry(vehicle_id.to_string()).or_default();
        match (*phase, moving) {
            (TripPhase::Stationary, true) => {
                *phase = TripPhase::Moving {
                    started_at: now,
                    origin: position,
                };
                None
            }
            (TripPhase::Moving { started_at, origin }, false) => {
                *phase = TripPhase::Stationary;
                let distance_miles = match (origin, position) {
                    (Some(from), Some(to)) => Some(from.distance_miles(to)),
                    _ => None,
                };
                Some(TripSummary {
                    started_at,
                    ended_at: now,
                    duration_minutes: elapsed_minutes(started_at, now),
                    origin,
                    destination: position,
                    distance_miles,
                })
            }
            _ => None,
        }
    }
}

/// Renders the trip-ended notification text.
pub fn render_trip_summary(
    label: &str,
    summary: &TripSummary,
    origin_address: &str,
    destination_address: &str,
) -> String {
    let distance = summary
        .distance_miles
        .map(|miles| format!("{miles:.1} miles"))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "🏁 {label} Trip ended\nDuration: {:.1} min\nDistance: {distance}\nFrom: {}\nTo: {}",
        summary.duration_minutes,
        address_or_unknown(origin_address),
        address_or_unknown(destination_address),
    )
}

fn address_or_unknown(address: &str) -> &str {
    if address.trim().is_empty() {
        "N/A"
    } else {
        address
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{render_trip_summary, TripPhase, TripTracker};
    use crate::geo::{Coordinates, EARTH_RADIUS_MILES};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 4, 9, 0, 0).single().expect("time")
    }

    #[test]
    fn functional_exactly_one_summary_per_maximal_moving_run() {
        let speeds: [Option<f64>; 14] = [
            None,
            Some(0.0),
            Some(12.0),
            Some(40.0),
            Some(5.5),
            Some(5.0),
            None,
            Some(3.0),
            Some(6.0),
            None,
            Some(30.0),
            Some(31.0),
            Some(2.0),
            Some(0.0),
        ];
        let mut tracker = TripTracker::default();
        let mut ended_at = Vec::new();
        for (tick, speed) in speeds.iter().enumerate() {
            let now = t0() + Duration::minutes(tick as i64);
            if tracker.observe("v1", *speed, None, now).is_some() {
                ended_at.push(tick);
            }
        }
        // Runs above 5 mph: ticks 2..=4, 8, 10..=11.
        assert_eq!(ended_at, vec![5, 9, 12]);
        assert!(!tracker.phase("v1").is_moving());
    }

    #[test]
    fn unit_no_transition_while_speed_stays_on_one_side() {
        let mut tracker = TripTracker::default();
        for tick in 0..5 {
            let now = t0() + Duration::minutes(tick);
            assert!(tracker.observe("v1", Some(2.0), None, now).is_none());
        }
        assert_eq!(tracker.phase("v1"), TripPhase::Stationary);
        for tick in 5..10 {
            let now = t0() + Duration::minutes(tick);
            assert!(tracker.observe("v1", Some(55.0), None, now).is_none());
        }
        assert!(tracker.phase("v1").is_moving());
    }

    #[test]
    fn functional_ten_minute_three_mile_trip_renders_rounded_summary() {
        let origin = Coordinates::new(37.0, -122.0);
        let destination = Coordinates::new(37.0 + (3.0 / EARTH_RADIUS_MILES).to_degrees(), -122.0);
        let mut tracker = TripTracker::default();

        assert!(tracker.observe("v1", Some(0.0), Some(origin), t0()).is_none());
        let start = t0() + Duration::seconds(30);
        assert!(tracker.observe("v1", Some(20.0), Some(origin), start).is_none());
        let summary = tracker
            .observe("v1", Some(0.0), Some(destination), start + Duration::minutes(10))
            .expect("trip ended");

        let text = render_trip_summary("Alicia", &summary, "Home", "Work");
        assert!(text.contains("Alicia Trip ended"), "{text}");
        assert!(text.contains("10.0 min"), "{text}");
        assert!(text.contains("3.0 miles"), "{text}");
        assert!(text.contains("From: Home\nTo: Work"), "{text}");
    }

    #[test]
    fn regression_trip_without_fix_reports_unknown_distance() {
        let mut tracker = TripTracker::default();
        tracker.observe("v1", Some(25.0), None, t0());
        let summary = tracker
            .observe("v1", None, Some(Coordinates::new(1.0, 1.0)), t0() + Duration::minutes(2))
            .expect("trip ended");
        assert_eq!(summary.distance_miles, None);
        let text = render_trip_summary("Jacob", &summary, "", "");
        assert!(text.contains("Distance: N/A"), "{text}");
        assert!(text.contains("From: N/A"), "{text}");
    }

    #[test]
    fn unit_vehicles_are_tracked_independently() {
        let mut tracker = TripTracker::default();
        tracker.observe("a", Some(30.0), None, t0());
        assert!(tracker.observe("b", Some(0.0), None, t0()).is_none());
        assert!(tracker.phase("a").is_moving());
        assert!(!tracker.phase("b").is_moving());
    }
}
