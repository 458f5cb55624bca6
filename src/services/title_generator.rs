use std::time::Duration;

use tracing::{debug, warn};

use super::chat_backend::ChatBackend;

/// How long the title endpoint gets before the fallback kicks in.
const TITLE_TIMEOUT: Duration = Duration::from_secs(8);

/// Maximum length of a fallback title derived from the first message.
const FALLBACK_TITLE_CHARS: usize = 50;

/// Per-character delay of the sidebar typing effect, plus a settle pause.
const REVEAL_MS_PER_CHAR: u64 = 30;
const REVEAL_SETTLE_MS: u64 = 500;

/// Derive a title from the first user message: its first line, truncated
/// with an ellipsis when it runs long.
pub fn fallback_title(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or("").trim();
    let truncated: String = first_line.chars().take(FALLBACK_TITLE_CHARS).collect();
    if first_line.chars().count() > FALLBACK_TITLE_CHARS {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// How long the typing reveal animation runs for a given title.
pub fn typing_reveal_duration(title: &str) -> Duration {
    Duration::from_millis(title.chars().count() as u64 * REVEAL_MS_PER_CHAR + REVEAL_SETTLE_MS)
}

/// Ask the backend for a title, falling back to a truncation of the first
/// message when the request fails, times out, or comes back blank.
pub async fn resolve_title(backend: &dyn ChatBackend, message: &str) -> String {
    match tokio::time::timeout(TITLE_TIMEOUT, backend.generate_title(message)).await {
        Ok(Ok(title)) if !title.trim().is_empty() => {
            let title = title.trim().to_string();
            debug!(title = %title, "Title generated by backend");
            title
        }
        Ok(Ok(_)) => {
            warn!("Title endpoint returned a blank title, using fallback");
            fallback_title(message)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Title generation failed, using fallback");
            fallback_title(message)
        }
        Err(_) => {
            warn!("Title generation timed out, using fallback");
            fallback_title(message)
        }
    }
}
