//! Per-user command sessions: `Idle` or awaiting a vehicle selection for an action.

use std::collections::HashMap;

use fleet_telemetry::VehicleAction;

use crate::command::{parse_bot_command, parse_vehicle_ordinal, BotCommand};

/// What the runtime should do with one authorized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStep {
    Help,
    Status,
    /// A bare action opened a session; ask which vehicle.
    Prompt { action: VehicleAction },
    Dispatch {
        action: VehicleAction,
        vehicle_index: usize,
    },
    /// Direct-dispatch ordinal outside the fleet; no session was opened.
    InvalidDirectOrdinal { action: VehicleAction, ordinal: u32 },
    /// The session is still open and the reply was not a valid selection.
    Reprompt { action: VehicleAction },
    Usage(String),
    UnknownCommand { keyword: String },
    Ignore,
}

#[derive(Debug, Default)]
pub struct CommandSessions {
    pending: HashMap<i64, VehicleAction>,
}

impl CommandSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_action(&self, user_id: i64) -> Option<VehicleAction> {
        self.pending.get(&user_id).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Advances `user_id`'s session with `text`. Only an accepted selection clears an
    /// open session; status and help are answered without touching it.
    pub fn step(&mut self, user_id: i64, text: &str, vehicle_count: usize) -> SessionStep {
        let command = parse_bot_command(text);

        if let Some(action) = self.pending_action(user_id) {
            return match command {
                Some(BotCommand::Status) => SessionStep::Status,
                Some(BotCommand::Help) => SessionStep::Help,
                _ => match parse_vehicle_ordinal(text, vehicle_count) {
                    Some(vehicle_index) => {
                        self.pending.remove(&user_id);
                        SessionStep::Dispatch {
                            action,
                            vehicle_index,
                        }
                    }
                    None => SessionStep::Reprompt { action },
                },
            };
        }

        match command {
            Some(BotCommand::Help) => SessionStep::Help,
            Some(BotCommand::Status) => SessionStep::Status,
            Some(BotCommand::Action {
                action,
                target: None,
            }) => {
                self.pending.insert(user_id, action);
                SessionStep::Prompt { action }
            }
            Some(BotCommand::Action {
                action,
                target: Some(ordinal),
            }) => {
                let index = usize::try_from(ordinal).ok().and_then(|ordinal| {
                    (1..=vehicle_count)
                        .contains(&ordinal)
                        .then(|| ordinal - 1)
                });
                match index {
                    Some(vehicle_index) => SessionStep::Dispatch {
                        action,
                        vehicle_index,
                    },
                    None => SessionStep::InvalidDirectOrdinal { action, ordinal },
                }
            }
            Some(BotCommand::Usage(usage)) => SessionStep::Usage(usage),
            Some(BotCommand::Unknown { keyword }) => SessionStep::UnknownCommand { keyword },
            None => SessionStep::Ignore,
        }
    }
}

/// `Which car? (1 for A, 2 for B)`
pub fn render_vehicle_prompt(labels: &[String]) -> String {
    let choices = labels
        .iter()
        .enumerate()
        .map(|(index, label)| format!("{} for {label}", index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Which car? ({choices})")
}

/// `Please reply with 1 for A or 2 for B.`
pub fn render_vehicle_reprompt(labels: &[String]) -> String {
    let choices = labels
        .iter()
        .enumerate()
        .map(|(index, label)| format!("{} for {label}", index + 1))
        .collect::<Vec<_>>();
    let joined = match choices.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
    };
    format!("Please reply with {joined}.")
}
