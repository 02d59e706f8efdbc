use std::path::PathBuf;

use anyhow::{Context, Result};
use fleet_core::{append_line_with_rotation, LogRotationPolicy};

use crate::vehicle_snapshot::LoggedEvent;

/// Append-only destination for significant-change events.
pub trait EventSink: Send + Sync {
    fn append(&self, event: &LoggedEvent) -> Result<()>;
}

/// Writes one JSON object per line, rotating by size.
pub struct JsonlEventSink {
    path: PathBuf,
    rotation: LogRotationPolicy,
}

impl JsonlEventSink {
    pub fn new(path: PathBuf, rotation: LogRotationPolicy) -> Self {
        Self { path, rotation }
    }
}

impl EventSink for JsonlEventSink {
    fn append(&self, event: &LoggedEvent) -> Result<()> {
        let line = serde_json::to_string(event).context("failed to encode logged event")?;
        append_line_with_rotation(&self.path, &line, self.rotation)
            .with_context(|| format!("failed to append event to {}", self.path.display()))
    }
}
