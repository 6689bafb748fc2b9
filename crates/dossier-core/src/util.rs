//! Small helpers shared by the models, the detector and the REST store.

/// Trimmed label, or `None` when the value is missing or blank.
pub fn clean_label(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Error bodies are cut to 180 characters before they reach a message.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Wall clock in Unix milliseconds, used for `updated_at` stamps.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Compare two venue labels ignoring surrounding whitespace and ASCII case.
///
/// Blank labels never match anything.
pub fn same_venue(left: Option<&str>, right: Option<&str>) -> bool {
    match (left.map(str::trim), right.map(str::trim)) {
        (Some(left), Some(right)) if !left.is_empty() && !right.is_empty() => {
            left.eq_ignore_ascii_case(right)
        }
        _ => false,
    }
}
