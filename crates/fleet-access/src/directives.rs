//! Admin directives recognized by the access gate.

use std::sync::LazyLock;

use regex::Regex;

pub const APPROVE_USAGE: &str = "Usage: yes <user_id>";
pub const ADD_USAGE: &str = "Usage: /add @username";

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]{1,64})").expect("valid handle regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminDirective {
    Approve { user_id: i64 },
    Add { handle: String },
    /// Directive keyword recognized but the argument is missing or malformed.
    Usage(&'static str),
}

/// Parses `yes <id>` (case-insensitive) and `/add @handle`. Returns `None` for any
/// other text so the message continues through the normal gate.
pub fn parse_admin_directive(text: &str) -> Option<AdminDirective> {
    let mut tokens = text.split_whitespace();
    let keyword = tokens.next()?;

    if keyword.eq_ignore_ascii_case("yes") {
        let argument = tokens.next();
        if tokens.next().is_some() {
            return Some(AdminDirective::Usage(APPROVE_USAGE));
        }
        return Some(
            match argument.and_then(|value| value.parse::<i64>().ok()) {
                Some(user_id) => AdminDirective::Approve { user_id },
                None => AdminDirective::Usage(APPROVE_USAGE),
            },
        );
    }

    let command = keyword.split('@').next().unwrap_or(keyword);
    if command.eq_ignore_ascii_case("/add") {
        let rest = text.trim_start()[keyword.len()..].trim();
        return Some(
            match HANDLE_RE
                .captures(rest)
                .and_then(|captures| captures.get(1))
            {
                Some(handle) => AdminDirective::Add {
                    handle: normalize_handle(handle.as_str()),
                },
                None => AdminDirective::Usage(ADD_USAGE),
            },
        );
    }
    None
}

/// Case-folded handle without a leading `@`.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_ascii_lowercase()
}
