//! Deterministic JSON emission.
//!
//! Export artifacts must be byte-stable across runs, so they are assembled as
//! insertion-ordered [`Doc`] trees and written with fixed number formatting:
//! integers carry no decimal point, floats use the shortest round-trip form,
//! and scientific notation is never produced. The same number rules feed the
//! canonical (sorted-key) form used for revision hashing.

use std::collections::BTreeMap;

use serde_json::Value;

/// An insertion-ordered JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Doc {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Arr(Vec<Doc>),
    Obj(Vec<(String, Doc)>),
}

impl Doc {
    /// Empty object.
    #[must_use]
    pub fn obj() -> Self {
        Self::Obj(Vec::new())
    }

    /// Append a field, keeping insertion order.
    pub fn push(&mut self, key: impl Into<String>, value: Doc) {
        if let Self::Obj(fields) = self {
            fields.push((key.into(), value));
        }
    }

    /// Append a field only when the value is present.
    pub fn push_opt(&mut self, key: impl Into<String>, value: Option<Doc>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// A numeric triple.
    #[must_use]
    pub fn triple(values: [f64; 3]) -> Self {
        Self::Arr(values.iter().map(|v| Self::num(*v)).collect())
    }

    /// A float, demoted to an integer form when it is one.
    #[must_use]
    pub fn num(value: f64) -> Self {
        if value == 0.0 {
            // collapse -0.0
            return Self::Int(0);
        }
        if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
            return Self::Int(value as i64);
        }
        Self::Float(value)
    }

    /// Serialize to a deterministic string.
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        write_doc(self, &mut out);
        out
    }
}

fn write_doc(doc: &Doc, out: &mut String) {
    match doc {
        Doc::Null => out.push_str("null"),
        Doc::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Doc::Int(i) => out.push_str(&i.to_string()),
        Doc::Float(f) => out.push_str(&format_float(*f)),
        Doc::Str(s) => write_escaped(s, out),
        Doc::Arr(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_doc(item, out);
            }
            out.push(']');
        }
        Doc::Obj(fields) => {
            out.push('{');
            for (i, (key, value)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                write_doc(value, out);
            }
            out.push('}');
        }
    }
}

/// Shortest round-trip float form; `{}` on f64 never emits an exponent.
fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    format!("{value}")
}

fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Format a bucketed keyframe time as an object key: at least one fractional
/// digit, no trailing noise (`0` -> `"0.0"`, `0.5` -> `"0.5"`).
#[must_use]
pub fn format_time_key(time: f64) -> String {
    let formatted = format_float(time);
    if formatted.contains('.') {
        formatted
    } else {
        format!("{formatted}.0")
    }
}

/// Canonical form of an arbitrary JSON value: object keys sorted
/// lexicographically at every level, numbers under the [`Doc`] rules.
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    canonical_doc(value).to_json()
}

fn canonical_doc(value: &Value) -> Doc {
    match value {
        Value::Null => Doc::Null,
        Value::Bool(b) => Doc::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Doc::Int(i)
            } else if let Some(u) = n.as_u64() {
                // beyond i64; format through f64 like every other number
                Doc::num(u as f64)
            } else {
                Doc::num(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Doc::Str(s.clone()),
        Value::Array(items) => Doc::Arr(items.iter().map(canonical_doc).collect()),
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            Doc::Obj(
                sorted.into_iter().map(|(k, v)| (k.clone(), canonical_doc(v))).collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_floats_have_no_decimal() {
        assert_eq!(Doc::num(4.0).to_json(), "4");
        assert_eq!(Doc::num(-4.0).to_json(), "-4");
        assert_eq!(Doc::num(0.0).to_json(), "0");
        assert_eq!(Doc::num(-0.0).to_json(), "0");
    }

    #[test]
    fn test_fractional_floats_minimal() {
        assert_eq!(Doc::num(0.5).to_json(), "0.5");
        assert_eq!(Doc::num(-10.25).to_json(), "-10.25");
        assert_eq!(Doc::num(0.1).to_json(), "0.1");
    }

    #[test]
    fn test_time_keys() {
        assert_eq!(format_time_key(0.0), "0.0");
        assert_eq!(format_time_key(1.0), "1.0");
        assert_eq!(format_time_key(0.5), "0.5");
        assert_eq!(format_time_key(1.25), "1.25");
    }

    #[test]
    fn test_object_preserves_insertion_order() {
        let mut doc = Doc::obj();
        doc.push("zeta", Doc::Int(1));
        doc.push("alpha", Doc::Int(2));
        assert_eq!(doc.to_json(), r#"{"zeta":1,"alpha":2}"#);
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(Doc::Str("a\"b\\c\n".to_string()).to_json(), r#""a\"b\\c\n""#);
    }

    #[test]
    fn test_canonical_sorts_keys() {
        let value = json!({"b": {"d": 1, "c": 2}, "a": [1.0, 2.5]});
        assert_eq!(canonical_string(&value), r#"{"a":[1,2.5],"b":{"c":2,"d":1}}"#);
    }

    #[test]
    fn test_canonical_is_stable() {
        let value = json!({"x": 1, "y": [true, null, "s"], "z": {"k": 0.25}});
        assert_eq!(canonical_string(&value), canonical_string(&value.clone()));
    }
}
