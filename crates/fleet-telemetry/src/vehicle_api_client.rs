//! Owner-style vehicle REST API client: listing, wake, data fetch, commands.

use std::time::Duration;

use async_trait::async_trait;
use fleet_core::{sleep_retry_backoff, truncate_body};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::normalizer::RawVehicleData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Remote actions the command bot can dispatch to a vehicle.
pub enum VehicleAction {
    Lock,
    CloseWindows,
    Sentry,
}

impl VehicleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::CloseWindows => "close",
            Self::Sentry => "sentry",
        }
    }

    fn endpoint(self) -> &'static str {
        match self {
            Self::Lock => "door_lock",
            Self::CloseWindows => "window_control",
            Self::Sentry => "set_sentry_mode",
        }
    }

    fn request_body(self) -> Value {
        match self {
            Self::Lock => json!({}),
            Self::CloseWindows => json!({"command": "close", "lat": 0, "lon": 0}),
            Self::Sentry => json!({"on": true}),
        }
    }

    /// Relay text for the user, keyed on whether the vehicle accepted it.
    pub fn outcome_message(self, success: bool) -> &'static str {
        match (self, success) {
            (Self::Lock, true) => "Lock command sent.",
            (Self::Lock, false) => "Failed to lock.",
            (Self::CloseWindows, true) => "Close windows command sent.",
            (Self::CloseWindows, false) => "Failed to close windows.",
            (Self::Sentry, true) => "Sentry mode enabled.",
            (Self::Sentry, false) => "Failed to enable sentry mode.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VehicleDescriptor {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl VehicleDescriptor {
    pub fn is_online(&self) -> bool {
        self.state.as_deref() == Some("online")
    }
}

// Vehicle ids exceed 2^53 on some accounts; keep them as strings either way.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "vehicle id must be a string or number, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum VehicleApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vehicle api returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("vehicle {vehicle_id} did not come online after {attempts} wake attempts")]
    WakeTimeout { vehicle_id: String, attempts: usize },
}

#[async_trait]
/// Telemetry and command surface of the vehicle API.
pub trait VehicleApi: Send + Sync {
    async fn list_vehicles(&self) -> Result<Vec<VehicleDescriptor>, VehicleApiError>;
    async fn wake(&self, vehicle: &VehicleDescriptor) -> Result<(), VehicleApiError>;
    async fn fetch_vehicle_data(
        &self,
        vehicle: &VehicleDescriptor,
    ) -> Result<RawVehicleData, VehicleApiError>;
    async fn send_command(
        &self,
        vehicle: &VehicleDescriptor,
        action: VehicleAction,
    ) -> Result<CommandOutcome, VehicleApiError>;
}

#[derive(Debug, Clone)]
pub struct VehicleApiClientConfig {
    pub api_base: String,
    pub access_token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub wake_max_attempts: usize,
    pub wake_poll_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope<T> {
    response: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Clone)]
pub struct VehicleApiClient {
    http: reqwest::Client,
    config: VehicleApiClientConfig,
}

impl VehicleApiClient {
    pub fn new(config: VehicleApiClientConfig) -> Result<Self, VehicleApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("fleetwatch"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            config: VehicleApiClientConfig {
                api_base: config.api_base.trim().trim_end_matches('/').to_string(),
                access_token: config.access_token.trim().to_string(),
                retry_max_attempts: config.retry_max_attempts.max(1),
                wake_max_attempts: config.wake_max_attempts.max(1),
                ..config
            },
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/1/{}", self.config.api_base, path.trim_start_matches('/'))
    }

    async fn request_response<T, F>(&self, build_request: F) -> Result<T, VehicleApiError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.config.retry_max_attempts;
        let mut attempt = 0usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = match build_request()
                .bearer_auth(&self.config.access_token)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    if attempt < max_attempts {
                        sleep_retry_backoff(self.config.retry_base_delay_ms, attempt).await;
                        continue;
                    }
                    return Err(VehicleApiError::Http(error));
                }
            };

            let status = response.status();
            if status.is_success() {
                let envelope = response.json::<ResponseEnvelope<T>>().await?;
                return match envelope.response {
                    Some(value) => Ok(value),
                    None => Err(VehicleApiError::InvalidResponse(
                        envelope
                            .error
                            .unwrap_or_else(|| "response field missing".to_string()),
                    )),
                };
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < max_attempts {
                sleep_retry_backoff(self.config.retry_base_delay_ms, attempt).await;
                continue;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(VehicleApiError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
    }
}

#[async_trait]
impl VehicleApi for VehicleApiClient {
    async fn list_vehicles(&self) -> Result<Vec<VehicleDescriptor>, VehicleApiError> {
        let url = self.url("vehicles");
        self.request_response(|| self.http.get(url.as_str())).await
    }

    async fn wake(&self, vehicle: &VehicleDescriptor) -> Result<(), VehicleApiError> {
        let url = self.url(&format!("vehicles/{}/wake_up", vehicle.id));
        for attempt in 1..=self.config.wake_max_attempts {
            let state: VehicleDescriptor =
                self.request_response(|| self.http.post(url.as_str())).await?;
            if state.is_online() {
                return Ok(());
            }
            tracing::debug!(
                vehicle_id = %vehicle.id,
                attempt,
                state = state.state.as_deref().unwrap_or("unknown"),
                "vehicle not online yet"
            );
            if attempt < self.config.wake_max_attempts {
                tokio::time::sleep(Duration::from_millis(self.config.wake_poll_delay_ms)).await;
            }
        }
        Err(VehicleApiError::WakeTimeout {
            vehicle_id: vehicle.id.clone(),
            attempts: self.config.wake_max_attempts,
        })
    }

    async fn fetch_vehicle_data(
        &self,
        vehicle: &VehicleDescriptor,
    ) -> Result<RawVehicleData, VehicleApiError> {
        let url = self.url(&format!("vehicles/{}/vehicle_data", vehicle.id));
        self.request_response(|| self.http.get(url.as_str())).await
    }

    async fn send_command(
        &self,
        vehicle: &VehicleDescriptor,
        action: VehicleAction,
    ) -> Result<CommandOutcome, VehicleApiError> {
        let url = self.url(&format!("vehicles/{}/command/{}", vehicle.id, action.endpoint()));
        let body = action.request_body();
        let response: CommandResponse = self
            .request_response(|| self.http.post(url.as_str()).json(&body))
            .await?;
        if let Some(reason) = response.reason.as_deref().filter(|r| !r.is_empty()) {
            tracing::debug!(vehicle_id = %vehicle.id, action = action.as_str(), reason, "command reason");
        }
        Ok(CommandOutcome {
            success: response.result,
            message: action.outcome_message(response.result).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{
        VehicleAction, VehicleApi, VehicleApiClient, VehicleApiClientConfig, VehicleApiError,
        VehicleDescriptor,
    };

    fn client(base_url: &str) -> VehicleApiClient {
        VehicleApiClient::new(VehicleApiClientConfig {
            api_base: base_url.to_string(),
            access_token: "token-1".to_string(),
            request_timeout_ms: 2_000,
            retry_max_attempts: 2,
            retry_base_delay_ms: 1,
            wake_max_attempts: 3,
            wake_poll_delay_ms: 1,
        })
        .expect("client")
    }

    fn vehicle() -> VehicleDescriptor {
        VehicleDescriptor {
            id: "111".to_string(),
            vin: "5YJ3E1EA0KF000001".to_string(),
            display_name: Some("Red".to_string()),
            state: Some("asleep".to_string()),
        }
    }

    #[tokio::test]
    async fn integration_list_vehicles_decodes_numeric_ids() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/1/vehicles")
                    .header("authorization", "Bearer token-1");
                then.status(200).json_body(json!({
                    "response": [
                        {"id": 1492931337156999u64, "vin": "VIN1", "display_name": "Red", "state": "online"},
                        {"id": "222", "vin": "VIN2", "state": "asleep"}
                    ],
                    "count": 2
                }));
            })
            .await;

        let vehicles = client(&server.base_url()).list_vehicles().await.expect("list");
        mock.assert_async().await;
        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles[0].id, "1492931337156999");
        assert!(vehicles[0].is_online());
        assert_eq!(vehicles[1].display_name, None);
    }

    #[tokio::test]
    async fn integration_wake_gives_up_after_configured_attempts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/1/vehicles/111/wake_up");
                then.status(200)
                    .json_body(json!({"response": {"id": 111, "state": "asleep"}}));
            })
            .await;

        let error = client(&server.base_url())
            .wake(&vehicle())
            .await
            .expect_err("timeout");
        mock.assert_calls_async(3).await;
        assert!(matches!(error, VehicleApiError::WakeTimeout { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn integration_send_command_posts_action_body_and_relays_result() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/1/vehicles/111/command/window_control")
                    .json_body(json!({"command": "close", "lat": 0, "lon": 0}));
                then.status(200)
                    .json_body(json!({"response": {"result": true, "reason": ""}}));
            })
            .await;

        let outcome = client(&server.base_url())
            .send_command(&vehicle(), VehicleAction::CloseWindows)
            .await
            .expect("command");
        mock.assert_async().await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Close windows command sent.");
    }

    #[tokio::test]
    async fn regression_server_errors_retry_then_surface_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/1/vehicles/111/vehicle_data");
                then.status(503).body("vehicle unavailable");
            })
            .await;

        let error = client(&server.base_url())
            .fetch_vehicle_data(&vehicle())
            .await
            .expect_err("unavailable");
        mock.assert_calls_async(2).await;
        match error {
            VehicleApiError::HttpStatus { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "vehicle unavailable");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unit_outcome_messages_cover_every_action() {
        assert_eq!(VehicleAction::Lock.outcome_message(false), "Failed to lock.");
        assert_eq!(VehicleAction::Sentry.outcome_message(true), "Sentry mode enabled.");
        assert_eq!(VehicleAction::CloseWindows.as_str(), "close");
    }
}
