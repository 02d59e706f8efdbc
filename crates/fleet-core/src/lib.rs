//! Low-level utilities shared by the fleetwatch crates.
//!
//! Whole-document atomic writes back every persisted state file (snapshot
//! store, allow-list, message cursor), and the rotated JSONL appender backs the
//! logged-event sink. HTTP retry helpers and the shutdown channel are shared by
//! the API clients and poll loops.

pub mod atomic_io;
pub mod log_rotation;
pub mod retry;
pub mod shutdown;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use log_rotation::{
    append_line_with_rotation, LogRotationPolicy, DEFAULT_LOG_ROTATION_MAX_BYTES,
    DEFAULT_LOG_ROTATION_MAX_FILES,
};
pub use retry::{retry_delay_ms, sleep_retry_backoff, truncate_body, MAX_ERROR_BODY_CHARS};
pub use shutdown::{shutdown_channel, shutdown_requested, spawn_ctrl_c_listener};
pub use time_utils::{current_unix_timestamp_ms, elapsed_minutes, utc_timestamp_iso};
