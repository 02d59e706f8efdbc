use std::sync::Arc;

use async_trait::async_trait;
use fleet_telemetry::{CommandOutcome, VehicleAction, VehicleApi, VehicleApiError};

pub const INVALID_SELECTION_MESSAGE: &str = "Invalid car selection.";

#[async_trait]
/// Executes a vehicle action by zero-based fleet index. Never fails: problems come
/// back as an unsuccessful outcome with user-facing text.
pub trait VehicleCommander: Send + Sync {
    async fn execute(&self, vehicle_index: usize, action: VehicleAction) -> CommandOutcome;
}

pub struct VehicleApiCommander {
    api: Arc<dyn VehicleApi>,
}

impl VehicleApiCommander {
    pub fn new(api: Arc<dyn VehicleApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl VehicleCommander for VehicleApiCommander {
    async fn execute(&self, vehicle_index: usize, action: VehicleAction) -> CommandOutcome {
        let result: Result<CommandOutcome, VehicleApiError> = async {
            let vehicles = self.api.list_vehicles().await?;
            let Some(vehicle) = vehicles.get(vehicle_index) else {
                return Ok(CommandOutcome {
                    success: false,
                    message: INVALID_SELECTION_MESSAGE.to_string(),
                });
            };
            self.api.wake(vehicle).await?;
            self.api.send_command(vehicle, action).await
        }
        .await;

        match result {
            Ok(outcome) => {
                tracing::info!(
                    vehicle_index,
                    action = action.as_str(),
                    success = outcome.success,
                    "vehicle command dispatched"
                );
                outcome
            }
            Err(error) => {
                tracing::warn!(
                    vehicle_index,
                    action = action.as_str(),
                    "vehicle command failed: {error}"
                );
                CommandOutcome {
                    success: false,
                    message: format!("Vehicle API error: {error}"),
                }
            }
        }
    }
}
