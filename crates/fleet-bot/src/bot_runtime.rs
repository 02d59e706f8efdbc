//! Message poll loop: access gate, command sessions, vehicle dispatch and replies.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use fleet_access::{AccessDecision, AccessGate, AccessRequester};
use fleet_core::shutdown_requested;
use fleet_telemetry::{load_snapshot_document, vehicle_label, VehicleAction};
use tokio::sync::watch;

use crate::session::{render_vehicle_prompt, render_vehicle_reprompt, CommandSessions, SessionStep};
use crate::status_render::{render_full_status, render_short_status};
use crate::telegram_api_client::{InboundMessage, MessagingTransport, TextFormat};
use crate::vehicle_commander::VehicleCommander;

const BOT_STATE_SCHEMA_VERSION: u32 = 1;

mod bot_command_helpers;
mod bot_state_store;

use bot_command_helpers::{bot_command_usage, render_unknown_command};
use bot_state_store::BotStateStore;

#[derive(Debug, Clone)]
pub struct BotRuntimeConfig {
    pub vehicle_labels: Vec<String>,
    pub poll_interval: Duration,
    pub state_path: PathBuf,
    pub snapshot_path: PathBuf,
    /// Re-prompt instead of staying silent when a direct-dispatch ordinal is out of range.
    pub reply_on_invalid_ordinal: bool,
}

/// `<state_dir>/bot/state.json`
pub fn bot_state_path_for_state_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("bot").join("state.json")
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BotCycleReport {
    pub fetched_updates: usize,
    pub handled_messages: usize,
    pub skipped_updates: usize,
    pub access_handled: usize,
    pub commands_dispatched: usize,
    pub send_failures: usize,
}

/// Runs the message loop until `shutdown` flips to true.
pub async fn run_bot_loop(
    config: BotRuntimeConfig,
    transport: Arc<dyn MessagingTransport>,
    commander: Arc<dyn VehicleCommander>,
    gate: AccessGate,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut runtime = BotRuntime::new(config, transport, commander, gate)?;
    runtime.run(shutdown).await
}

pub struct BotRuntime {
    config: BotRuntimeConfig,
    transport: Arc<dyn MessagingTransport>,
    commander: Arc<dyn VehicleCommander>,
    gate: AccessGate,
    sessions: CommandSessions,
    state: BotStateStore,
}

impl BotRuntime {
    pub fn new(
        config: BotRuntimeConfig,
        transport: Arc<dyn MessagingTransport>,
        commander: Arc<dyn VehicleCommander>,
        gate: AccessGate,
    ) -> Result<Self> {
        let state = BotStateStore::load(config.state_path.clone())?;
        Ok(Self {
            config,
            transport,
            commander,
            gate,
            sessions: CommandSessions::new(),
            state,
        })
    }

    pub fn last_update_id(&self) -> Option<i64> {
        self.state.last_update_id()
    }

    pub fn sessions(&self) -> &CommandSessions {
        &self.sessions
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Polls until shutdown. An update abandoned mid-cycle is redelivered on the
    /// next start because the cursor only advances after it is handled.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            interval_secs = self.config.poll_interval.as_secs(),
            last_update_id = ?self.state.last_update_id(),
            "message loop started"
        );
        loop {
            let report = tokio::select! {
                report = self.poll_cycle() => report,
                _ = shutdown_requested(&mut shutdown) => {
                    tracing::info!("message loop shutdown requested");
                    return Ok(());
                }
            };
            if report.fetched_updates > 0 {
                tracing::info!(
                    fetched = report.fetched_updates,
                    handled = report.handled_messages,
                    skipped = report.skipped_updates,
                    access_handled = report.access_handled,
                    dispatched = report.commands_dispatched,
                    send_failures = report.send_failures,
                    "message cycle complete"
                );
            }
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    tracing::info!("message loop shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Fetches updates after the cursor and handles them in order, persisting the
    /// cursor after each one.
    pub async fn poll_cycle(&mut self) -> BotCycleReport {
        let mut report = BotCycleReport::default();
        let updates = match self
            .transport
            .fetch_updates(self.state.last_update_id())
            .await
        {
            Ok(updates) => updates,
            Err(error) => {
                tracing::warn!("failed to fetch updates: {error}");
                return report;
            }
        };
        report.fetched_updates = updates.len();

        for message in &updates {
            if self
                .state
                .last_update_id()
                .is_some_and(|cursor| message.update_id <= cursor)
            {
                report.skipped_updates += 1;
                continue;
            }
            if message.text.trim().is_empty() {
                report.skipped_updates += 1;
            } else {
                self.handle_message(message, &mut report).await;
                report.handled_messages += 1;
            }
            self.state.advance(message.update_id);
            if let Err(error) = self.state.save() {
                tracing::warn!(update_id = message.update_id, "failed to persist cursor: {error:#}");
            }
        }
        report
    }

    async fn handle_message(&mut self, message: &InboundMessage, report: &mut BotCycleReport) {
        let requester = AccessRequester {
            user_id: message.sender.id,
            handle: message.sender.handle.clone(),
            display_name: message.sender.display_name.clone(),
        };
        let decision = self.gate.evaluate(&requester, message.chat_id, &message.text);
        tracing::debug!(
            update_id = message.update_id,
            user_id = requester.user_id,
            reason_code = decision.reason_code(),
            "access decision"
        );
        if let AccessDecision::Handled { notices, .. } = decision {
            report.access_handled += 1;
            for notice in notices {
                self.send(notice.chat_id, &notice.text, TextFormat::Plain, report)
                    .await;
            }
            return;
        }

        let chat_id = message.chat_id;
        let labels = &self.config.vehicle_labels;
        let step = self
            .sessions
            .step(requester.user_id, &message.text, labels.len());
        match step {
            SessionStep::Help => {
                self.send(chat_id, &bot_command_usage(), TextFormat::Markdown, report)
                    .await
            }
            SessionStep::Status => self.reply_full_status(chat_id, report).await,
            SessionStep::Prompt { .. } => {
                let prompt = render_vehicle_prompt(labels);
                self.send(chat_id, &prompt, TextFormat::Plain, report).await
            }
            SessionStep::Reprompt { .. } => {
                let prompt = render_vehicle_reprompt(labels);
                self.send(chat_id, &prompt, TextFormat::Plain, report).await
            }
            SessionStep::Dispatch {
                action,
                vehicle_index,
            } => {
                self.dispatch(chat_id, action, vehicle_index, report)
                    .await
            }
            SessionStep::InvalidDirectOrdinal { action, ordinal } => {
                tracing::debug!(
                    user_id = requester.user_id,
                    action = action.as_str(),
                    ordinal,
                    "direct-dispatch ordinal out of range"
                );
                if self.config.reply_on_invalid_ordinal {
                    let prompt = render_vehicle_reprompt(labels);
                    self.send(chat_id, &prompt, TextFormat::Plain, report).await
                }
            }
            SessionStep::Usage(usage) => {
                self.send(chat_id, &usage, TextFormat::Plain, report).await
            }
            SessionStep::UnknownCommand { keyword } => {
                let text = render_unknown_command(&keyword);
                self.send(chat_id, &text, TextFormat::Plain, report).await
            }
            SessionStep::Ignore => {}
        }
    }

    async fn dispatch(
        &self,
        chat_id: i64,
        action: VehicleAction,
        vehicle_index: usize,
        report: &mut BotCycleReport,
    ) {
        let outcome = self.commander.execute(vehicle_index, action).await;
        report.commands_dispatched += 1;
        self.send(chat_id, &outcome.message, TextFormat::Plain, report)
            .await;
        let status = match self.load_short_status(vehicle_index) {
            Ok(status) => status,
            Err(error) => format!("Could not load status: {error:#}"),
        };
        self.send(chat_id, &status, TextFormat::Plain, report).await;
    }

    fn load_short_status(&self, vehicle_index: usize) -> Result<String> {
        let document = load_snapshot_document(&self.config.snapshot_path)?;
        let label = vehicle_label(&self.config.vehicle_labels, vehicle_index);
        let snapshot = document
            .find_by_label(&label)
            .or_else(|| document.vehicles.get(vehicle_index))
            .ok_or_else(|| anyhow!("no status recorded for {label} yet"))?;
        Ok(render_short_status(snapshot))
    }

    async fn reply_full_status(&self, chat_id: i64, report: &mut BotCycleReport) {
        let document = match load_snapshot_document(&self.config.snapshot_path) {
            Ok(document) => document,
            Err(error) => {
                let text = format!("Error reading status: {error:#}");
                self.send(chat_id, &text, TextFormat::Plain, report).await;
                return;
            }
        };
        for snapshot in &document.vehicles {
            if let Some(position) = snapshot.coordinates() {
                if let Err(error) = self
                    .transport
                    .send_location(chat_id, position.lat, position.lon)
                    .await
                {
                    report.send_failures += 1;
                    tracing::warn!(chat_id, vehicle = %snapshot.label, "failed to send location: {error}");
                }
            }
        }
        let text = render_full_status(&document.vehicles);
        self.send(chat_id, &text, TextFormat::Markdown, report).await;
    }

    async fn send(&self, chat_id: i64, text: &str, format: TextFormat, report: &mut BotCycleReport) {
        if let Err(error) = self.transport.send_text(chat_id, text, format).await {
            report.send_failures += 1;
            tracing::warn!(chat_id, "failed to send message: {error}");
        }
    }
}
