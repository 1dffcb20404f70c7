use chrono::{DateTime, Utc};

pub fn to_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Display time shown next to a message, e.g. "02:05 PM".
pub fn format_display_time(epoch_millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_millis)
        .map(|dt| dt.format("%I:%M %p").to_string())
        .unwrap_or_default()
}

/// Clients disagree on whether ids are JSON numbers or numeric strings.
pub fn parse_user_id(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Attachments are stored both-or-neither. A URL without a name gets the
/// name derived from its last path segment; a name without a URL is dropped.
pub fn normalize_attachment(
    file_url: Option<String>,
    file_name: Option<String>,
) -> Option<(String, String)> {
    let url = file_url.filter(|u| !u.trim().is_empty())?;
    let name = file_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| {
            url.rsplit('/')
                .next()
                .unwrap_or(url.as_str())
                .to_string()
        });
    Some((url, name))
}
