//! Slash-command grammar: `/<keyword>[@bot][<n>| <n>]`.

use fleet_telemetry::VehicleAction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    Status,
    /// `target` is the raw 1-based ordinal; range checks happen against the fleet size.
    Action {
        action: VehicleAction,
        target: Option<u32>,
    },
    Usage(String),
    Unknown { keyword: String },
}

/// Parses a slash command. Returns `None` for text that is not a command at all.
pub fn parse_bot_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim();
    let mut tokens = trimmed.split_whitespace();
    let head = tokens.next()?.strip_prefix('/')?;
    let head = head.split('@').next().unwrap_or(head);
    if head.is_empty() {
        return None;
    }

    let keyword_end = head
        .char_indices()
        .find(|(_, ch)| ch.is_ascii_digit())
        .map(|(index, _)| index)
        .unwrap_or(head.len());
    let (keyword, attached) = head.split_at(keyword_end);
    let keyword = keyword.to_ascii_lowercase();
    let rest = tokens.collect::<Vec<_>>();

    let parsed = match keyword.as_str() {
        "help" | "start" if attached.is_empty() && rest.is_empty() => BotCommand::Help,
        "status" if attached.is_empty() && rest.is_empty() => BotCommand::Status,
        "help" | "start" | "status" => BotCommand::Usage(format!("Usage: /{keyword}")),
        "lock" | "close" | "sentry" => {
            let action = match keyword.as_str() {
                "lock" => VehicleAction::Lock,
                "close" => VehicleAction::CloseWindows,
                _ => VehicleAction::Sentry,
            };
            let argument = match (attached.is_empty(), rest.as_slice()) {
                (true, []) => Ok(None),
                (true, [value]) => parse_target(value),
                (false, []) => parse_target(attached),
                _ => Err(()),
            };
            match argument {
                Ok(target) => BotCommand::Action { action, target },
                Err(()) => BotCommand::Usage(format!("Usage: /{keyword} [car number]")),
            }
        }
        _ => BotCommand::Unknown {
            keyword: format!("/{head}"),
        },
    };
    Some(parsed)
}

fn parse_target(value: &str) -> Result<Option<u32>, ()> {
    if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(());
    }
    value.parse::<u32>().map(Some).map_err(|_| ())
}

/// A bare `1`..=`vehicle_count` reply, converted to a zero-based index.
pub fn parse_vehicle_ordinal(text: &str, vehicle_count: usize) -> Option<usize> {
    let value = text.trim();
    if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let ordinal = value.parse::<usize>().ok()?;
    (1..=vehicle_count).contains(&ordinal).then(|| ordinal - 1)
}
