use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use fleet_core::write_text_atomic;
use serde::{Deserialize, Serialize};

use super::BOT_STATE_SCHEMA_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct BotState {
    schema_version: u32,
    #[serde(default)]
    last_update_id: Option<i64>,
}

impl Default for BotState {
    fn default() -> Self {
        Self {
            schema_version: BOT_STATE_SCHEMA_VERSION,
            last_update_id: None,
        }
    }
}

/// Durable cursor: id of the last fully handled inbound update.
pub(super) struct BotStateStore {
    path: PathBuf,
    state: BotState,
}

impl BotStateStore {
    pub(super) fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read state file {}", path.display()))?;
            serde_json::from_str::<BotState>(&raw).with_context(|| {
                format!("failed to parse bot state file {}", path.display())
            })?
        } else {
            BotState::default()
        };

        if state.schema_version != BOT_STATE_SCHEMA_VERSION {
            bail!(
                "unsupported bot state schema: expected {}, found {}",
                BOT_STATE_SCHEMA_VERSION,
                state.schema_version
            );
        }
        Ok(Self { path, state })
    }

    pub(super) fn last_update_id(&self) -> Option<i64> {
        self.state.last_update_id
    }

    /// Moves the cursor forward. Returns false for ids at or behind it.
    pub(super) fn advance(&mut self, update_id: i64) -> bool {
        if self
            .state
            .last_update_id
            .is_some_and(|current| update_id <= current)
        {
            return false;
        }
        self.state.last_update_id = Some(update_id);
        true
    }

    pub(super) fn save(&self) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(&self.state).context("failed to serialize state")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write state file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BotStateStore;

    #[test]
    fn unit_cursor_only_moves_forward_and_survives_reload() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bot/state.json");

        let mut store = BotStateStore::load(path.clone()).expect("load");
        assert_eq!(store.last_update_id(), None);
        assert!(store.advance(10));
        assert!(!store.advance(10));
        assert!(!store.advance(9));
        assert!(store.advance(11));
        store.save().expect("save");

        let reloaded = BotStateStore::load(path).expect("reload");
        assert_eq!(reloaded.last_update_id(), Some(11));
    }

    #[test]
    fn regression_unknown_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        std::fs::write(&path, r#"{"schema_version": 2, "last_update_id": 5}"#).expect("write");
        let error = BotStateStore::load(path).err().expect("schema error");
        assert!(error.to_string().contains("unsupported bot state schema"));
    }
}
