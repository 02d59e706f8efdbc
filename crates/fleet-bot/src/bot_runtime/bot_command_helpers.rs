//! Static command help and clarification text.

pub(super) fn bot_command_usage() -> String {
    [
        "*Fleetwatch commands*",
        "/status - status and location of every car",
        "/lock - lock a car",
        "/close - close a car's windows",
        "/sentry - turn on sentry mode",
        "/help - show this message",
        "",
        "Add the car number to skip the question, for example /lock 1.",
    ]
    .join("\n")
}

pub(super) fn render_unknown_command(keyword: &str) -> String {
    format!("Unknown command {keyword}. Send /help for the list of commands.")
}
