//! Telemetry poll loop: fetch, normalize, debounce-log, snapshot, track trips.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_core::{shutdown_requested, utc_timestamp_iso};
use tokio::sync::watch;

use crate::change_detection::{ChangeDetectionPolicy, ChangeDetector};
use crate::event_sink::EventSink;
use crate::geocode::ReverseGeocoder;
use crate::normalizer::{normalize_vehicle_data, telemetry_reading};
use crate::snapshot_store::SnapshotStore;
use crate::trip_state::{render_trip_summary, TripTracker};
use crate::vehicle_api_client::{VehicleApi, VehicleDescriptor};
use crate::vehicle_snapshot::LoggedEvent;

#[async_trait]
/// Outbound channel for trip-ended notifications.
pub trait TripNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct TelemetryRuntimeConfig {
    pub vehicle_labels: Vec<String>,
    pub poll_interval: Duration,
    pub snapshot_path: PathBuf,
    pub change_policy: ChangeDetectionPolicy,
    pub moving_speed_mph: f64,
}

/// Display label for the vehicle at `index` in vehicle-list order.
pub fn vehicle_label(labels: &[String], index: usize) -> String {
    labels
        .get(index)
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Car {}", index + 1))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TelemetryCycleReport {
    pub polled_vehicles: usize,
    pub logged_events: usize,
    pub unchanged_vehicles: usize,
    pub trips_ended: usize,
    pub failed_vehicles: usize,
}

#[derive(Debug, Default)]
struct VehicleCycleOutcome {
    logged: bool,
    trip_ended: bool,
}

/// Runs the telemetry loop until `shutdown` flips to true.
pub async fn run_telemetry_loop(
    config: TelemetryRuntimeConfig,
    api: Arc<dyn VehicleApi>,
    geocoder: Arc<dyn ReverseGeocoder>,
    sink: Arc<dyn EventSink>,
    notifier: Arc<dyn TripNotifier>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut runtime = TelemetryRuntime::new(config, api, geocoder, sink, notifier);
    runtime.run(shutdown).await
}

pub struct TelemetryRuntime {
    config: TelemetryRuntimeConfig,
    api: Arc<dyn VehicleApi>,
    geocoder: Arc<dyn ReverseGeocoder>,
    sink: Arc<dyn EventSink>,
    notifier: Arc<dyn TripNotifier>,
    snapshots: SnapshotStore,
    changes: ChangeDetector,
    trips: TripTracker,
    vehicles: Vec<VehicleDescriptor>,
}

impl TelemetryRuntime {
    pub fn new(
        config: TelemetryRuntimeConfig,
        api: Arc<dyn VehicleApi>,
        geocoder: Arc<dyn ReverseGeocoder>,
        sink: Arc<dyn EventSink>,
        notifier: Arc<dyn TripNotifier>,
    ) -> Self {
        let snapshots = SnapshotStore::open(config.snapshot_path.clone());
        let changes = ChangeDetector::new(config.change_policy);
        let trips = TripTracker::new(config.moving_speed_mph);
        Self {
            config,
            api,
            geocoder,
            sink,
            notifier,
            snapshots,
            changes,
            trips,
            vehicles: Vec::new(),
        }
    }

    /// Polls until shutdown. A cycle in flight is abandoned; snapshot writes are atomic.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            interval_secs = self.config.poll_interval.as_secs(),
            snapshot_path = %self.config.snapshot_path.display(),
            "telemetry loop started"
        );
        loop {
            let report = tokio::select! {
                report = self.poll_cycle() => report,
                _ = shutdown_requested(&mut shutdown) => {
                    tracing::info!("telemetry loop shutdown requested");
                    return Ok(());
                }
            };
            tracing::info!(
                polled = report.polled_vehicles,
                logged = report.logged_events,
                unchanged = report.unchanged_vehicles,
                trips_ended = report.trips_ended,
                failed = report.failed_vehicles,
                "telemetry cycle complete"
            );
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    tracing::info!("telemetry loop shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    pub async fn poll_cycle(&mut self) -> TelemetryCycleReport {
        self.poll_cycle_at(Utc::now()).await
    }

    /// One pass over every vehicle. Failures are isolated per vehicle.
    pub async fn poll_cycle_at(&mut self, now: DateTime<Utc>) -> TelemetryCycleReport {
        let mut report = TelemetryCycleReport::default();
        if self.vehicles.is_empty() {
            match self.api.list_vehicles().await {
                Ok(vehicles) => self.vehicles = vehicles,
                Err(error) => {
                    tracing::warn!("failed to list vehicles: {error:#}");
                    return report;
                }
            }
        }

        let vehicles = self.vehicles.clone();
        for (index, vehicle) in vehicles.iter().enumerate() {
            let label = vehicle_label(&self.config.vehicle_labels, index);
            match self.poll_vehicle(vehicle, &label, now).await {
                Ok(outcome) => {
                    report.polled_vehicles += 1;
                    if outcome.logged {
                        report.logged_events += 1;
                    } else {
                        report.unchanged_vehicles += 1;
                    }
                    if outcome.trip_ended {
                        report.trips_ended += 1;
                    }
                }
                Err(error) => {
                    report.failed_vehicles += 1;
                    tracing::warn!(vehicle = %label, vehicle_id = %vehicle.id, "error tracking vehicle: {error:#}");
                }
            }
        }
        report
    }

    async fn poll_vehicle(
        &mut self,
        vehicle: &VehicleDescriptor,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<VehicleCycleOutcome> {
        self.api
            .wake(vehicle)
            .await
            .with_context(|| format!("failed to wake {label}"))?;
        let raw = self
            .api
            .fetch_vehicle_data(vehicle)
            .await
            .with_context(|| format!("failed to fetch vehicle data for {label}"))?;

        let reading = telemetry_reading(&raw);
        let address = match reading.coordinates {
            Some(position) => self.geocoder.reverse_geocode(position.lat, position.lon).await,
            None => String::new(),
        };
        let mut outcome = VehicleCycleOutcome::default();

        let assessment = self.changes.assess(&vehicle.id, &reading);
        if assessment.should_log {
            let event = LoggedEvent {
                timestamp: utc_timestamp_iso(now),
                vehicle_id: vehicle.id.clone(),
                label: label.to_string(),
                lat: reading.coordinates.map(|position| position.lat),
                lon: reading.coordinates.map(|position| position.lon),
                speed: reading.speed_mph,
                battery: reading.battery,
                address: address.clone(),
            };
            match self.sink.append(&event) {
                Ok(()) => {
                    self.changes.record_logged(&vehicle.id, &reading, &address);
                    outcome.logged = true;
                    tracing::info!(
                        vehicle = %label,
                        lat = ?event.lat,
                        lon = ?event.lon,
                        speed = ?event.speed,
                        battery = ?event.battery,
                        address = %event.address,
                        "logged significant change"
                    );
                }
                Err(error) => {
                    tracing::warn!(vehicle = %label, "failed to append logged event: {error:#}");
                }
            }
        } else {
            tracing::debug!(
                vehicle = %label,
                distance_miles = ?assessment.distance_miles,
                battery_delta = ?assessment.battery_delta,
                "no significant change, skipping log"
            );
        }

        let snapshot = normalize_vehicle_data(&vehicle.id, label, &raw, &address, now);
        self.snapshots.upsert(snapshot);
        if let Err(error) = self.snapshots.save() {
            tracing::warn!(vehicle = %label, "failed to persist snapshot store: {error:#}");
        }

        if let Some(summary) =
            self.trips
                .observe(&vehicle.id, reading.speed_mph, reading.coordinates, now)
        {
            outcome.trip_ended = true;
            let origin_address = match summary.origin {
                Some(origin) => self.geocoder.reverse_geocode(origin.lat, origin.lon).await,
                None => String::new(),
            };
            let message = render_trip_summary(label, &summary, &origin_address, &address);
            match self.notifier.notify(&message).await {
                Ok(()) => tracing::info!(vehicle = %label, "trip summary sent"),
                Err(error) => {
                    tracing::warn!(vehicle = %label, "failed to send trip summary: {error:#}")
                }
            }
        }

        Ok(outcome)
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }
}
