use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

pub fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    let value = value?.to_str().ok()?.trim();
    let secs = value.parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

pub fn next_backoff(backoff: Duration) -> Duration {
    (backoff + backoff).min(Duration::from_secs(60))
}

pub fn truncate_for_log(text: &str) -> String {
    let trimmed = text.trim();
    let max_len = 300usize;
    if trimmed.len() <= max_len {
        trimmed.to_string()
    } else {
        let mut cut = max_len;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &trimmed[..cut])
    }
}

/// Renders a JSON value the way a browser's `String(value)` would, so that
/// `4.8`, `"4.8"` and `4.80` compare equal and `150.0` prints as `150`.
pub fn js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{}", f as i128)
            }
            (None, None, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| js_string(Some(v)))
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

pub fn is_http_url(url: &str) -> bool {
    url.trim_start().starts_with("http")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn js_string_matches_browser_rendering() {
        assert_eq!(js_string(Some(&json!(4.8))), "4.8");
        assert_eq!(js_string(Some(&json!(150.0))), "150");
        assert_eq!(js_string(Some(&json!(150))), "150");
        assert_eq!(js_string(Some(&json!("Same day"))), "Same day");
        assert_eq!(js_string(Some(&Value::Null)), "null");
        assert_eq!(js_string(None), "undefined");
        assert_eq!(js_string(Some(&json!(["a", "b"]))), "a,b");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "£".repeat(400);
        let out = truncate_for_log(&long);
        assert!(out.ends_with("..."));
    }
}
