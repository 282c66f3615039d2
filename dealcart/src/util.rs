//! Small helpers shared across modules.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
#[must_use]
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Generate a unique identifier with the given prefix.
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &id[..12])
}

/// User home directory, falling back to the working directory.
#[must_use]
pub fn home_dir() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Base directory for dealcart files (`~/.dealcart`).
#[must_use]
pub fn app_dir() -> PathBuf {
    home_dir().join(".dealcart")
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// State guarded this way is only ever replaced wholesale, so a poisoned
/// lock still holds a consistent value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Render a JSON id (string or number) as a string.
///
/// Empty strings and any other JSON type yield `None`.
#[must_use]
pub fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a JSON number or numeric string.
///
/// Anything else, including NaN and infinities, yields `None`.
#[must_use]
pub fn json_number(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().trim_start_matches('$').parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse a price: missing or invalid becomes 0, negatives clamp to 0.
#[must_use]
pub fn json_price(value: Option<&serde_json::Value>) -> f64 {
    value.and_then(json_number).unwrap_or(0.0).max(0.0)
}

/// Read the first present, non-null field among `keys`.
#[must_use]
pub fn first_field<'a>(
    object: &'a serde_json::Value,
    keys: &[&str],
) -> Option<&'a serde_json::Value> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

/// Read the first non-empty string field among `keys`.
#[must_use]
pub fn first_string(object: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| object.get(*k).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_id() {
        let a = generate_id("msg");
        let b = generate_id("msg");
        assert!(a.starts_with("msg_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_json_id() {
        assert_eq!(json_id(&json!("abc")), Some("abc".into()));
        assert_eq!(json_id(&json!(42)), Some("42".into()));
        assert_eq!(json_id(&json!("  ")), None);
        assert_eq!(json_id(&json!(null)), None);
    }

    #[test]
    fn test_json_price() {
        assert!((json_price(Some(&json!("19.99"))) - 19.99).abs() < f64::EPSILON);
        assert!((json_price(Some(&json!("$5"))) - 5.0).abs() < f64::EPSILON);
        assert!(json_price(Some(&json!("abc"))).abs() < f64::EPSILON);
        assert!(json_price(Some(&json!(-3.0))).abs() < f64::EPSILON);
        assert!(json_price(Some(&json!("NaN"))).abs() < f64::EPSILON);
        assert!(json_price(None).abs() < f64::EPSILON);
    }

    #[test]
    fn test_first_string() {
        let v = json!({"name": "", "title": "Widget"});
        assert_eq!(first_string(&v, &["name", "title"]), Some("Widget".into()));
        assert_eq!(first_string(&v, &["missing"]), None);
    }
}
