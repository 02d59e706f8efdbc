use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fleet_core::write_text_atomic;
use serde::{Deserialize, Serialize};

use crate::vehicle_snapshot::VehicleSnapshot;

pub const SNAPSHOT_STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// On-disk snapshot document: one current snapshot per vehicle, first-seen order.
pub struct SnapshotDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub vehicles: Vec<VehicleSnapshot>,
}

impl Default for SnapshotDocument {
    fn default() -> Self {
        Self {
            schema_version: SNAPSHOT_STORE_SCHEMA_VERSION,
            vehicles: Vec::new(),
        }
    }
}

impl SnapshotDocument {
    pub fn get(&self, vehicle_id: &str) -> Option<&VehicleSnapshot> {
        self.vehicles
            .iter()
            .find(|snapshot| snapshot.vehicle_id == vehicle_id)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&VehicleSnapshot> {
        self.vehicles.iter().find(|snapshot| snapshot.label == label)
    }

    /// Replaces the vehicle's snapshot wholesale, or appends it on first sight.
    pub fn upsert(&mut self, snapshot: VehicleSnapshot) {
        match self
            .vehicles
            .iter_mut()
            .find(|existing| existing.vehicle_id == snapshot.vehicle_id)
        {
            Some(existing) => *existing = snapshot,
            None => self.vehicles.push(snapshot),
        }
    }
}

/// Reads the snapshot document. A missing file is an empty fleet; a torn or
/// foreign document is an error the caller reports.
pub fn load_snapshot_document(path: &Path) -> Result<SnapshotDocument> {
    if !path.exists() {
        return Ok(SnapshotDocument::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot store {}", path.display()))?;
    let parsed = serde_json::from_str::<SnapshotDocument>(&raw)
        .with_context(|| format!("failed to parse snapshot store {}", path.display()))?;
    if parsed.schema_version != SNAPSHOT_STORE_SCHEMA_VERSION {
        bail!(
            "unsupported snapshot store schema_version {} in {} (expected {})",
            parsed.schema_version,
            path.display(),
            SNAPSHOT_STORE_SCHEMA_VERSION
        );
    }
    Ok(parsed)
}

/// Writer side of the snapshot store, owned by the telemetry loop.
pub struct SnapshotStore {
    path: PathBuf,
    document: SnapshotDocument,
}

impl SnapshotStore {
    /// Opens the store, starting empty when the existing file cannot be read.
    /// The telemetry loop rewrites every vehicle within one cycle anyway.
    pub fn open(path: PathBuf) -> Self {
        let document = match load_snapshot_document(&path) {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    "snapshot store unreadable, starting empty: {error:#}"
                );
                SnapshotDocument::default()
            }
        };
        Self { path, document }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &SnapshotDocument {
        &self.document
    }

    pub fn upsert(&mut self, snapshot: VehicleSnapshot) {
        self.document.upsert(snapshot);
    }

    pub fn save(&self) -> Result<()> {
        let mut payload = serde_json::to_string_pretty(&self.document)
            .context("failed to encode snapshot store")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write snapshot store {}", self.path.display()))
    }
}
