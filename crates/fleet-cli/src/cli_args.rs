use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "fleetwatch",
    about = "Vehicle telemetry poller and Telegram command bot",
    version
)]
pub struct Cli {
    #[arg(
        long = "telegram-bot-token",
        env = "TELEGRAM_BOT_TOKEN",
        hide_env_values = true,
        help = "Telegram Bot API token"
    )]
    pub telegram_bot_token: String,

    #[arg(
        long = "admin-user-id",
        env = "FLEETWATCH_ADMIN_USER_ID",
        help = "Telegram user id of the bot administrator"
    )]
    pub admin_user_id: i64,

    #[arg(
        long = "vehicle-access-token",
        env = "FLEETWATCH_VEHICLE_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Bearer token for the vehicle API"
    )]
    pub vehicle_access_token: String,

    #[arg(
        long = "vehicle-labels",
        env = "FLEETWATCH_VEHICLE_LABELS",
        value_delimiter = ',',
        default_value = "Car 1,Car 2",
        help = "Comma-separated display labels in vehicle-list order"
    )]
    pub vehicle_labels: Vec<String>,

    #[arg(
        long = "telemetry-poll-interval-seconds",
        env = "FLEETWATCH_TELEMETRY_POLL_INTERVAL_SECONDS",
        default_value_t = 60,
        value_parser = parse_positive_u64,
        help = "Seconds between telemetry poll cycles"
    )]
    pub telemetry_poll_interval_seconds: u64,

    #[arg(
        long = "message-poll-interval-seconds",
        env = "FLEETWATCH_MESSAGE_POLL_INTERVAL_SECONDS",
        default_value_t = 30,
        value_parser = parse_positive_u64,
        help = "Seconds between message poll cycles"
    )]
    pub message_poll_interval_seconds: u64,

    #[arg(
        long = "state-dir",
        env = "FLEETWATCH_STATE_DIR",
        default_value = ".fleetwatch",
        help = "Directory holding snapshots, the event log, the bot cursor and access lists"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long = "vehicle-api-base",
        env = "FLEETWATCH_VEHICLE_API_BASE",
        default_value = "https://owner-api.teslamotors.com",
        help = "Base URL for the vehicle API"
    )]
    pub vehicle_api_base: String,

    #[arg(
        long = "telegram-api-base",
        env = "FLEETWATCH_TELEGRAM_API_BASE",
        default_value = "https://api.telegram.org",
        help = "Base URL for the Telegram Bot API"
    )]
    pub telegram_api_base: String,

    #[arg(
        long = "geocoding-api-key",
        env = "FLEETWATCH_GEOCODING_API_KEY",
        hide_env_values = true,
        help = "Reverse geocoding API key; addresses stay empty without it"
    )]
    pub geocoding_api_key: Option<String>,

    #[arg(
        long = "geocoding-api-base",
        env = "FLEETWATCH_GEOCODING_API_BASE",
        default_value = "https://maps.googleapis.com",
        help = "Base URL for the reverse geocoding API"
    )]
    pub geocoding_api_base: String,

    #[arg(
        long = "notify-chat-id",
        env = "FLEETWATCH_NOTIFY_CHAT_ID",
        help = "Chat that receives trip summaries (defaults to the admin user id)"
    )]
    pub notify_chat_id: Option<i64>,

    #[arg(
        long = "request-timeout-ms",
        env = "FLEETWATCH_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "HTTP request timeout in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "FLEETWATCH_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per HTTP request on transient failures"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "FLEETWATCH_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Linear backoff base delay between HTTP retries"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "wake-max-attempts",
        env = "FLEETWATCH_WAKE_MAX_ATTEMPTS",
        default_value_t = 10,
        value_parser = parse_positive_usize,
        help = "Wake requests sent before a vehicle is reported unavailable"
    )]
    pub wake_max_attempts: usize,

    #[arg(
        long = "wake-poll-delay-ms",
        env = "FLEETWATCH_WAKE_POLL_DELAY_MS",
        default_value_t = 2_000,
        help = "Delay between wake requests"
    )]
    pub wake_poll_delay_ms: u64,

    #[arg(
        long = "persist-pending-approvals",
        env = "FLEETWATCH_PERSIST_PENDING_APPROVALS",
        default_value_t = true,
        action = ArgAction::Set,
        help = "Keep pending access requests across restarts"
    )]
    pub persist_pending_approvals: bool,

    #[arg(
        long = "reply-on-invalid-ordinal",
        env = "FLEETWATCH_REPLY_ON_INVALID_ORDINAL",
        default_value_t = false,
        action = ArgAction::Set,
        help = "Re-prompt instead of staying silent when a direct car number is out of range"
    )]
    pub reply_on_invalid_ordinal: bool,

    #[arg(
        long = "event-log-max-bytes",
        env = "FLEETWATCH_EVENT_LOG_MAX_BYTES",
        default_value_t = fleet_core::DEFAULT_LOG_ROTATION_MAX_BYTES,
        help = "Rotate events.jsonl past this size (0 disables rotation)"
    )]
    pub event_log_max_bytes: u64,

    #[arg(
        long = "event-log-max-files",
        env = "FLEETWATCH_EVENT_LOG_MAX_FILES",
        default_value_t = fleet_core::DEFAULT_LOG_ROTATION_MAX_FILES,
        help = "Event log files kept including the live file (0 disables rotation)"
    )]
    pub event_log_max_files: usize,

    #[arg(
        long = "telemetry-only",
        env = "FLEETWATCH_TELEMETRY_ONLY",
        default_value_t = false,
        conflicts_with = "bot_only",
        help = "Run only the telemetry poll loop"
    )]
    pub telemetry_only: bool,

    #[arg(
        long = "bot-only",
        env = "FLEETWATCH_BOT_ONLY",
        default_value_t = false,
        help = "Run only the message poll loop"
    )]
    pub bot_only: bool,
}
