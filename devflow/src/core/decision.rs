//! Interpretation of interactive answers.

use chrono::NaiveDate;

/// Answer to the deploy confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Decline,
}

/// Parse a yes/no answer.
///
/// Only a lone `y` (any case, surrounding whitespace ignored) means proceed.
/// Everything else, including `yes` and empty input, declines.
pub fn parse_decision(input: &str) -> Decision {
    if input.trim().eq_ignore_ascii_case("y") {
        Decision::Proceed
    } else {
        Decision::Decline
    }
}

/// Pick the commit message for a deploy.
///
/// A non-blank `input` is used as-is (trimmed). Otherwise the message is
/// `default_prefix` followed by `today` as `YYYY-MM-DD`.
pub fn resolve_commit_message(
    input: Option<&str>,
    default_prefix: &str,
    today: NaiveDate,
) -> String {
    match input.map(str::trim) {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => format!("{} {}", default_prefix.trim_end(), today.format("%Y-%m-%d")),
    }
}
