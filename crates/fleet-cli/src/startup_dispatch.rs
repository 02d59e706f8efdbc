use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use fleet_access::{access_gate_config_for_state_dir, AccessGate};
use fleet_bot::{
    bot_state_path_for_state_dir, run_bot_loop, BotRuntimeConfig, MessagingTransport,
    TelegramApiClient, TelegramApiClientConfig, TransportTripNotifier, VehicleApiCommander,
};
use fleet_core::{shutdown_channel, spawn_ctrl_c_listener, LogRotationPolicy};
use fleet_telemetry::{
    run_telemetry_loop, ChangeDetectionPolicy, DisabledGeocoder, GoogleGeocoder, JsonlEventSink,
    ReverseGeocoder, TelemetryRuntimeConfig, VehicleApi, VehicleApiClient, VehicleApiClientConfig,
    DEFAULT_MOVING_SPEED_MPH,
};

use crate::cli_args::Cli;

const SNAPSHOTS_FILE: &str = "snapshots.json";
const EVENTS_FILE: &str = "events.jsonl";

/// Rejects required values that are present but blank.
pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
    if cli.telegram_bot_token.trim().is_empty() {
        bail!("--telegram-bot-token must not be empty");
    }
    if cli.vehicle_access_token.trim().is_empty() {
        bail!("--vehicle-access-token must not be empty");
    }
    Ok(())
}

pub(crate) fn vehicle_labels(cli: &Cli) -> Vec<String> {
    cli.vehicle_labels
        .iter()
        .map(|label| label.trim().to_string())
        .collect()
}

pub(crate) fn telemetry_runtime_config(cli: &Cli) -> TelemetryRuntimeConfig {
    TelemetryRuntimeConfig {
        vehicle_labels: vehicle_labels(cli),
        poll_interval: Duration::from_secs(cli.telemetry_poll_interval_seconds),
        snapshot_path: cli.state_dir.join(SNAPSHOTS_FILE),
        change_policy: ChangeDetectionPolicy::default(),
        moving_speed_mph: DEFAULT_MOVING_SPEED_MPH,
    }
}

pub(crate) fn bot_runtime_config(cli: &Cli) -> BotRuntimeConfig {
    BotRuntimeConfig {
        vehicle_labels: vehicle_labels(cli),
        poll_interval: Duration::from_secs(cli.message_poll_interval_seconds),
        state_path: bot_state_path_for_state_dir(&cli.state_dir),
        snapshot_path: cli.state_dir.join(SNAPSHOTS_FILE),
        reply_on_invalid_ordinal: cli.reply_on_invalid_ordinal,
    }
}

pub(crate) fn event_log_rotation(cli: &Cli) -> LogRotationPolicy {
    LogRotationPolicy {
        max_bytes: cli.event_log_max_bytes,
        max_files: cli.event_log_max_files,
    }
}

fn build_geocoder(cli: &Cli) -> Result<Arc<dyn ReverseGeocoder>> {
    match cli
        .geocoding_api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
    {
        Some(key) => Ok(Arc::new(GoogleGeocoder::new(
            &cli.geocoding_api_base,
            key,
            cli.request_timeout_ms,
        )?)),
        None => {
            tracing::info!("no geocoding key configured; addresses will be empty");
            Ok(Arc::new(DisabledGeocoder))
        }
    }
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    validate_cli(&cli)?;

    let vehicle_api: Arc<dyn VehicleApi> = Arc::new(
        VehicleApiClient::new(VehicleApiClientConfig {
            api_base: cli.vehicle_api_base.clone(),
            access_token: cli.vehicle_access_token.clone(),
            request_timeout_ms: cli.request_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts,
            retry_base_delay_ms: cli.retry_base_delay_ms,
            wake_max_attempts: cli.wake_max_attempts,
            wake_poll_delay_ms: cli.wake_poll_delay_ms,
        })
        .context("failed to create vehicle API client")?,
    );
    let transport: Arc<dyn MessagingTransport> = Arc::new(
        TelegramApiClient::new(TelegramApiClientConfig {
            api_base: cli.telegram_api_base.clone(),
            bot_token: cli.telegram_bot_token.clone(),
            request_timeout_ms: cli.request_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts,
            retry_base_delay_ms: cli.retry_base_delay_ms,
        })
        .context("failed to create Telegram client")?,
    );

    let run_telemetry = !cli.bot_only;
    let run_bot = !cli.telemetry_only;
    tracing::info!(
        state_dir = %cli.state_dir.display(),
        telemetry = run_telemetry,
        bot = run_bot,
        "fleetwatch starting"
    );

    // Both loops share one ctrl-c listener.
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    spawn_ctrl_c_listener(shutdown_tx);

    let telemetry = async {
        if !run_telemetry {
            return Ok(());
        }
        let notify_chat_id = cli.notify_chat_id.unwrap_or(cli.admin_user_id);
        run_telemetry_loop(
            telemetry_runtime_config(&cli),
            vehicle_api.clone(),
            build_geocoder(&cli)?,
            Arc::new(JsonlEventSink::new(
                cli.state_dir.join(EVENTS_FILE),
                event_log_rotation(&cli),
            )),
            Arc::new(TransportTripNotifier::new(transport.clone(), notify_chat_id)),
            shutdown_rx.clone(),
        )
        .await
    };

    let bot = async {
        if !run_bot {
            return Ok(());
        }
        let gate = AccessGate::open(access_gate_config_for_state_dir(
            &cli.state_dir,
            cli.admin_user_id,
            cli.persist_pending_approvals,
        ))?;
        run_bot_loop(
            bot_runtime_config(&cli),
            transport.clone(),
            Arc::new(VehicleApiCommander::new(vehicle_api.clone())),
            gate,
            shutdown_rx.clone(),
        )
        .await
    };

    tokio::try_join!(telemetry, bot)?;
    tracing::info!("fleetwatch stopped");
    Ok(())
}
