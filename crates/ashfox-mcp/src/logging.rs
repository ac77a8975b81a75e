//! Log metadata sanitization.
//!
//! Everything attached to a structured log line passes through [`sanitize`]
//! first: sensitive keys are redacted, oversized values are clipped, and the
//! serialized form is capped so a hostile payload cannot flood the sink.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Maximum nesting depth before values are dropped.
const MAX_DEPTH: usize = 6;

/// Maximum object keys kept per level.
const MAX_KEYS: usize = 40;

/// Maximum array items kept per level.
const MAX_ITEMS: usize = 40;

/// Maximum string value length, in characters.
const MAX_STRING: usize = 512;

/// Maximum serialized metadata length, in characters.
const MAX_SERIALIZED: usize = 4_000;

/// Lowercased key fragments that trigger redaction.
const SENSITIVE_KEYS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "token",
    "secret",
    "password",
    "apikey",
    "api_key",
    "datauri",
    "base64",
];

static JWT_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}$")
        .expect("static regex compiles")
});

/// Sanitize a metadata value for logging.
#[must_use]
pub fn sanitize(meta: &Value) -> Value {
    sanitize_at(meta, 0)
}

/// Sanitize and serialize, clipping the result at the serialized cap.
#[must_use]
pub fn meta_string(meta: &Value) -> String {
    let serialized =
        serde_json::to_string(&sanitize(meta)).unwrap_or_else(|_| "{}".to_string());
    if serialized.chars().count() > MAX_SERIALIZED {
        let clipped: String = serialized.chars().take(MAX_SERIALIZED).collect();
        format!("{clipped}...[truncated]")
    } else {
        serialized
    }
}

fn sanitize_at(value: &Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::String("[MaxDepth]".to_string());
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, item) in map.iter().take(MAX_KEYS) {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String("[redacted]".to_string()));
                } else {
                    out.insert(key.clone(), sanitize_at(item, depth + 1));
                }
            }
            if map.len() > MAX_KEYS {
                out.insert(
                    "…".to_string(),
                    Value::String(format!("[{} more keys]", map.len() - MAX_KEYS)),
                );
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out: Vec<Value> =
                items.iter().take(MAX_ITEMS).map(|v| sanitize_at(v, depth + 1)).collect();
            if items.len() > MAX_ITEMS {
                out.push(Value::String(format!("[{} more items]", items.len() - MAX_ITEMS)));
            }
            Value::Array(out)
        }
        Value::String(s) => Value::String(sanitize_string(s)),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|needle| lowered.contains(needle))
}

fn sanitize_string(s: &str) -> String {
    if let Some(rest) = s.strip_prefix("data:") {
        let header = rest.split(',').next().unwrap_or("");
        return format!("data:{header},[{} chars]", s.chars().count());
    }
    if JWT_SHAPE.is_match(s) {
        return "[redacted:jwt]".to_string();
    }
    if s.chars().count() > MAX_STRING {
        let clipped: String = s.chars().take(MAX_STRING).collect();
        return format!("{clipped}…");
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_keys_redacted() {
        let meta = json!({
            "Authorization": "Bearer abc",
            "apiKey": "xyz",
            "nested": { "session_token": "tok" },
            "name": "root",
        });
        let clean = sanitize(&meta);
        assert_eq!(clean["Authorization"], "[redacted]");
        assert_eq!(clean["apiKey"], "[redacted]");
        assert_eq!(clean["nested"]["session_token"], "[redacted]");
        assert_eq!(clean["name"], "root");
    }

    #[test]
    fn test_data_uri_summarized() {
        let meta = json!({ "image": "data:image/png;base64,AAAA" });
        let clean = sanitize(&meta);
        let s = clean["image"].as_str().unwrap();
        assert!(s.starts_with("data:image/png;base64,["), "got {s}");
        assert!(s.ends_with(" chars]"));
    }

    #[test]
    fn test_jwt_redacted() {
        let jwt = format!("{}.{}.{}", "a".repeat(12), "b".repeat(24), "c".repeat(16));
        let clean = sanitize(&json!({ "header": jwt }));
        assert_eq!(clean["header"], "[redacted:jwt]");
    }

    #[test]
    fn test_long_string_clipped() {
        let clean = sanitize(&json!({ "blob": "x".repeat(2000) }));
        let s = clean["blob"].as_str().unwrap();
        assert!(s.chars().count() <= MAX_STRING + 1);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn test_depth_cap() {
        let deep = json!({"a":{"b":{"c":{"d":{"e":{"f":{"g":1}}}}}}});
        let clean = sanitize(&deep);
        assert_eq!(clean["a"]["b"]["c"]["d"]["e"]["f"], "[MaxDepth]");
    }

    #[test]
    fn test_wide_object_clipped() {
        let mut map = Map::new();
        for i in 0..100 {
            map.insert(format!("k{i}"), json!(i));
        }
        let clean = sanitize(&Value::Object(map));
        let obj = clean.as_object().unwrap();
        assert_eq!(obj.len(), MAX_KEYS + 1);
        assert_eq!(obj["…"], "[60 more keys]");
    }

    #[test]
    fn test_serialized_truncation() {
        let meta = json!({ "items": vec!["y".repeat(400); 40] });
        let s = meta_string(&meta);
        assert!(s.ends_with("...[truncated]"));
        assert!(s.chars().count() <= MAX_SERIALIZED + "...[truncated]".len());
    }
}
