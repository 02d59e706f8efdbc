use std::time::Duration;

/// Longest HTTP error body kept in error values and logs.
pub const MAX_ERROR_BODY_CHARS: usize = 240;

/// Linear backoff: `retry_base_delay_ms * attempt`, saturating.
pub fn retry_delay_ms(retry_base_delay_ms: u64, attempt: usize) -> u64 {
    retry_base_delay_ms.saturating_mul(u64::try_from(attempt).unwrap_or(u64::MAX))
}

pub async fn sleep_retry_backoff(retry_base_delay_ms: u64, attempt: usize) {
    let delay_ms = retry_delay_ms(retry_base_delay_ms, attempt);
    if delay_ms == 0 {
        return;
    }
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

/// Caps `body` at [`MAX_ERROR_BODY_CHARS`] characters, marking the cut with `...`.
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated = body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
    truncated.push_str("...");
    truncated
}
