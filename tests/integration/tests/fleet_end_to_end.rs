use std::{path::Path, sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use fleet_access::{access_gate_config_for_state_dir, AccessGate};
use fleet_bot::{
    bot_state_path_for_state_dir, BotRuntime, BotRuntimeConfig, MessagingTransport,
    TelegramApiClient, TelegramApiClientConfig, TransportTripNotifier, VehicleApiCommander,
};
use fleet_core::LogRotationPolicy;
use fleet_telemetry::{
    ChangeDetectionPolicy, GoogleGeocoder, JsonlEventSink, TelemetryRuntime,
    TelemetryRuntimeConfig, VehicleApi, VehicleApiClient, VehicleApiClientConfig,
    DEFAULT_MOVING_SPEED_MPH,
};
use httpmock::prelude::*;
use serde_json::{json, Value};

const ADMIN: i64 = 1000;
const MEMBER: i64 = 2000;

fn labels() -> Vec<String> {
    vec!["Alicia".to_string(), "Jacob".to_string()]
}

fn vehicle_api(server: &MockServer) -> Arc<dyn VehicleApi> {
    Arc::new(
        VehicleApiClient::new(VehicleApiClientConfig {
            api_base: server.base_url(),
            access_token: "vehicle-token".to_string(),
            request_timeout_ms: 2_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
            wake_max_attempts: 2,
            wake_poll_delay_ms: 1,
        })
        .expect("vehicle client"),
    )
}

fn telegram(server: &MockServer) -> Arc<dyn MessagingTransport> {
    Arc::new(
        TelegramApiClient::new(TelegramApiClientConfig {
            api_base: server.base_url(),
            bot_token: "123:abc".to_string(),
            request_timeout_ms: 2_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        })
        .expect("telegram client"),
    )
}

fn telemetry_runtime(
    state_dir: &Path,
    vehicles: &MockServer,
    geocoding: &MockServer,
    messages: &MockServer,
) -> TelemetryRuntime {
    let geocoder = GoogleGeocoder::new(&geocoding.base_url(), "geo-key", 2_000).expect("geocoder");
    TelemetryRuntime::new(
        TelemetryRuntimeConfig {
            vehicle_labels: labels(),
            poll_interval: Duration::from_secs(60),
            snapshot_path: state_dir.join("snapshots.json"),
            change_policy: ChangeDetectionPolicy::default(),
            moving_speed_mph: DEFAULT_MOVING_SPEED_MPH,
        },
        vehicle_api(vehicles),
        Arc::new(geocoder),
        Arc::new(JsonlEventSink::new(
            state_dir.join("events.jsonl"),
            LogRotationPolicy::default(),
        )),
        Arc::new(TransportTripNotifier::new(telegram(messages), ADMIN)),
    )
}

fn bot_runtime(state_dir: &Path, vehicles: &MockServer, messages: &MockServer) -> BotRuntime {
    let gate = AccessGate::open(access_gate_config_for_state_dir(state_dir, ADMIN, true))
        .expect("gate");
    BotRuntime::new(
        BotRuntimeConfig {
            vehicle_labels: labels(),
            poll_interval: Duration::from_secs(30),
            state_path: bot_state_path_for_state_dir(state_dir),
            snapshot_path: state_dir.join("snapshots.json"),
            reply_on_invalid_ordinal: false,
        },
        telegram(messages),
        Arc::new(VehicleApiCommander::new(vehicle_api(vehicles))),
        gate,
    )
    .expect("bot runtime")
}

fn text_update(
    update_id: i64,
    user_id: i64,
    username: &str,
    first_name: &str,
    text: &str,
) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "chat": {"id": user_id},
            "from": {"id": user_id, "username": username, "first_name": first_name},
            "text": text
        }
    })
}

async fn mock_vehicle_listing(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/1/vehicles");
            then.status(200).json_body(json!({
                "response": [{"id": 111, "vin": "VIN1", "display_name": "Red", "state": "online"}],
                "count": 1
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/1/vehicles/111/wake_up");
            then.status(200)
                .json_body(json!({"response": {"id": 111, "vin": "VIN1", "state": "online"}}));
        })
        .await;
}

fn vehicle_data(lat: f64, lon: f64, speed: Option<f64>, battery: i64) -> Value {
    json!({
        "response": {
            "id": 111,
            "drive_state": {"latitude": lat, "longitude": lon, "speed": speed, "heading": 90},
            "charge_state": {"battery_level": battery, "charging_state": "Disconnected", "charger_power": 0},
            "climate_state": {"inside_temp": 21.4, "outside_temp": 17.8},
            "vehicle_state": {
                "odometer": 12345.6,
                "locked": true,
                "sentry_mode": false,
                "car_version": "2024.14.9",
                "df": 0, "dr": 0, "pf": 0, "pr": 0,
                "fd_window": 0, "fp_window": 0, "rd_window": 0, "rp_window": 0
            }
        }
    })
}

#[tokio::test]
async fn integration_telemetry_cycle_feeds_status_reply() {
    let temp = tempfile::tempdir().expect("tempdir");
    let vehicles = MockServer::start_async().await;
    let geocoding = MockServer::start_async().await;
    let messages = MockServer::start_async().await;

    mock_vehicle_listing(&vehicles).await;
    vehicles
        .mock_async(|when, then| {
            when.method(GET).path("/api/1/vehicles/111/vehicle_data");
            then.status(200)
                .json_body(vehicle_data(37.4275, -122.1697, None, 81));
        })
        .await;
    geocoding
        .mock_async(|when, then| {
            when.method(GET)
                .path("/maps/api/geocode/json")
                .query_param("key", "geo-key");
            then.status(200).json_body(json!({
                "results": [{"formatted_address": "450 Serra Mall, Stanford, CA"}],
                "status": "OK"
            }));
        })
        .await;

    let mut telemetry = telemetry_runtime(temp.path(), &vehicles, &geocoding, &messages);
    let report = telemetry.poll_cycle().await;
    assert_eq!(report.polled_vehicles, 1);
    assert_eq!(report.logged_events, 1);

    let events = std::fs::read_to_string(temp.path().join("events.jsonl")).expect("events");
    assert_eq!(events.lines().count(), 1);
    assert!(events.contains("450 Serra Mall"));

    let updates = messages
        .mock_async(|when, then| {
            when.method(GET).path("/bot123:abc/getUpdates");
            then.status(200).json_body(json!({
                "ok": true,
                "result": [text_update(5, ADMIN, "owner", "Olive", "/status")]
            }));
        })
        .await;
    let pin = messages
        .mock_async(|when, then| {
            when.method(POST)
                .path("/bot123:abc/sendLocation")
                .body_includes("\"latitude\":37.4275");
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 1}}));
        })
        .await;
    let status = messages
        .mock_async(|when, then| {
            when.method(POST)
                .path("/bot123:abc/sendMessage")
                .body_includes("*Alicia*")
                .body_includes("81%")
                .body_includes("\"parse_mode\":\"Markdown\"");
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 2}}));
        })
        .await;

    let mut bot = bot_runtime(temp.path(), &vehicles, &messages);
    let report = bot.poll_cycle().await;
    updates.assert_async().await;
    pin.assert_calls_async(1).await;
    status.assert_calls_async(1).await;
    assert_eq!(report.handled_messages, 1);
    assert_eq!(report.send_failures, 0);
    assert_eq!(bot.last_update_id(), Some(5));
}

#[tokio::test]
async fn integration_trip_end_notifies_admin_chat() {
    let temp = tempfile::tempdir().expect("tempdir");
    let vehicles = MockServer::start_async().await;
    let geocoding = MockServer::start_async().await;
    let messages = MockServer::start_async().await;

    mock_vehicle_listing(&vehicles).await;
    geocoding
        .mock_async(|when, then| {
            when.method(GET).path("/maps/api/geocode/json");
            then.status(200).json_body(json!({"results": [], "status": "ZERO_RESULTS"}));
        })
        .await;
    let summary = messages
        .mock_async(|when, then| {
            when.method(POST)
                .path("/bot123:abc/sendMessage")
                .body_includes(&format!("\"chat_id\":{ADMIN}"))
                .body_includes("Alicia Trip ended")
                .body_includes("Duration: 12.0 min");
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 9}}));
        })
        .await;

    let mut telemetry = telemetry_runtime(temp.path(), &vehicles, &geocoding, &messages);
    let start = Utc
        .with_ymd_and_hms(2025, 5, 4, 9, 0, 0)
        .single()
        .expect("time");

    let mut moving = vehicles
        .mock_async(|when, then| {
            when.method(GET).path("/api/1/vehicles/111/vehicle_data");
            then.status(200)
                .json_body(vehicle_data(37.40, -122.10, Some(34.0), 80));
        })
        .await;
    let report = telemetry.poll_cycle_at(start).await;
    assert_eq!(report.trips_ended, 0);
    moving.delete_async().await;

    vehicles
        .mock_async(|when, then| {
            when.method(GET).path("/api/1/vehicles/111/vehicle_data");
            then.status(200)
                .json_body(vehicle_data(37.45, -122.15, Some(0.0), 76));
        })
        .await;
    let report = telemetry
        .poll_cycle_at(start + chrono::Duration::minutes(12))
        .await;
    assert_eq!(report.trips_ended, 1);
    summary.assert_calls_async(1).await;
}

#[tokio::test]
async fn integration_invited_member_locks_a_car_through_the_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let vehicles = MockServer::start_async().await;
    let messages = MockServer::start_async().await;

    mock_vehicle_listing(&vehicles).await;
    let lock = vehicles
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/1/vehicles/111/command/door_lock")
                .header("authorization", "Bearer vehicle-token");
            then.status(200)
                .json_body(json!({"response": {"result": true, "reason": ""}}));
        })
        .await;

    messages
        .mock_async(|when, then| {
            when.method(GET).path("/bot123:abc/getUpdates");
            then.status(200).json_body(json!({
                "ok": true,
                "result": [
                    text_update(10, ADMIN, "owner", "Olive", "/add @Jacob"),
                    text_update(11, MEMBER, "jacob", "Jacob", "hi"),
                    text_update(12, MEMBER, "jacob", "Jacob", "/lock"),
                    text_update(13, MEMBER, "jacob", "Jacob", "1")
                ]
            }));
        })
        .await;

    let mut expected = Vec::new();
    for (chat_id, fragment) in [
        (ADMIN, "Added @jacob"),
        (MEMBER, "Access granted"),
        (ADMIN, "joined via invite"),
        (MEMBER, "Which car? (1 for Alicia, 2 for Jacob)"),
        (MEMBER, "Lock command sent."),
        (MEMBER, "no status recorded for Alicia yet"),
    ] {
        let mock = messages
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bot123:abc/sendMessage")
                    .body_includes(&format!("\"chat_id\":{chat_id}"))
                    .body_includes(fragment);
                then.status(200)
                    .json_body(json!({"ok": true, "result": {"message_id": 1}}));
            })
            .await;
        expected.push(mock);
    }

    let mut bot = bot_runtime(temp.path(), &vehicles, &messages);
    let report = bot.poll_cycle().await;

    for mock in &expected {
        mock.assert_calls_async(1).await;
    }
    lock.assert_calls_async(1).await;
    assert_eq!(report.commands_dispatched, 1);
    assert_eq!(report.send_failures, 0);
    assert!(bot.gate().is_allow_listed(MEMBER));
    assert!(bot.sessions().is_empty());

    let allowlist =
        std::fs::read_to_string(temp.path().join("security/allowlist.json")).expect("allowlist");
    assert!(allowlist.contains(&MEMBER.to_string()));
    let cursor = std::fs::read_to_string(temp.path().join("bot/state.json")).expect("cursor");
    assert!(cursor.contains("13"));
}
