//! Classify downloader stderr when no artifact was produced.

/// Phrases the downloader uses for content that will never be fetchable.
const UNAVAILABLE_MARKERS: [&str; 4] = ["unavailable", "private", "removed", "not available"];

/// Upper bound on the message kept from stderr.
const MAX_MESSAGE_CHARS: usize = 300;

/// Whether stderr says the content itself is gone (as opposed to a transient failure).
pub fn is_unavailable(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Short message for the failed log: the downloader's `ERROR:` lines if any,
/// otherwise the trimmed stderr, otherwise "unknown error".
pub fn summarize_stderr(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .collect();
    let text = if errors.is_empty() {
        stderr.trim().to_string()
    } else {
        errors.join(" ")
    };
    if text.is_empty() {
        return "unknown error".to_string();
    }
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}
