//! Lenient string coercion for loosely-typed upstream JSON.
//!
//! Upstream exports put objects, numbers or `null` where a string is expected.
//! Every free-form field goes through [`coerce_text`]: objects and arrays become
//! their JSON text, `null` becomes the empty string.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Coerced text of `value[key]`, empty when absent.
pub fn field_text(value: &Value, key: &str) -> String {
    value.get(key).map(coerce_text).unwrap_or_default()
}

/// Coerced text at a nested object path, empty when any segment is absent.
pub fn path_text(value: &Value, path: &[&str]) -> String {
    let mut cur = value;
    for key in path {
        match cur.get(key) {
            Some(next) => cur = next,
            None => return String::new(),
        }
    }
    coerce_text(cur)
}

/// First non-empty coerced text among `keys`.
pub fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .map(|k| field_text(value, k))
        .find(|s| !s.trim().is_empty())
}

/// Non-empty coerced text, `None` otherwise.
pub fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Numeric value of a JSON number or numeric string.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Loose identifier match: equal, or either contains the other (case-insensitive).
/// Empty identifiers never match.
pub fn ids_related(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// `deserialize_with` helper for free-form string fields.
pub fn lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_text(&value))
}

/// Like [`lenient`] but maps empty text to `None`.
pub fn lenient_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(non_empty(coerce_text(&value)))
}

/// Array of free-form strings; a scalar becomes a one-element list.
pub fn lenient_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .map(coerce_text)
            .filter(|s| !s.is_empty())
            .collect(),
        other => non_empty(coerce_text(&other)).into_iter().collect(),
    })
}

/// Numeric field that tolerates strings and drops anything unparseable.
pub fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value).filter(|n| n.is_finite()))
}

/// `true`/`false` as booleans or text; anything else is `None`.
pub fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_every_json_kind() {
        assert_eq!(coerce_text(&Value::Null), "");
        assert_eq!(coerce_text(&json!("AT&T")), "AT&T");
        assert_eq!(coerce_text(&json!(42)), "42");
        assert_eq!(coerce_text(&json!(true)), "true");
        assert_eq!(coerce_text(&json!({"id": "PNM"})), r#"{"id":"PNM"}"#);
    }

    #[test]
    fn path_text_tolerates_missing_segments() {
        let v = json!({"structure": {"pole": {"id": "P-1"}}});
        assert_eq!(path_text(&v, &["structure", "pole", "id"]), "P-1");
        assert_eq!(path_text(&v, &["structure", "missing", "id"]), "");
    }

    #[test]
    fn ids_related_is_symmetric_and_rejects_empty() {
        assert!(ids_related("PL-100", "pl-100"));
        assert!(ids_related("PL-100A", "PL-100"));
        assert!(ids_related("PL-100", "PL-100A"));
        assert!(!ids_related("", "PL-100"));
        assert!(!ids_related("PL-200", "PL-100"));
    }

    #[test]
    fn lenient_fields_accept_objects() {
        #[derive(Deserialize)]
        struct Record {
            #[serde(default, deserialize_with = "lenient")]
            owner: String,
            #[serde(default, deserialize_with = "lenient_opt")]
            alias: Option<String>,
            #[serde(default, deserialize_with = "lenient_list")]
            cases: Vec<String>,
        }
        let p: Record = serde_json::from_value(json!({
            "owner": {"id": "PNM"},
            "alias": null,
            "cases": "NESC Medium B"
        }))
        .unwrap();
        assert_eq!(p.owner, r#"{"id":"PNM"}"#);
        assert!(p.alias.is_none());
        assert_eq!(p.cases, vec!["NESC Medium B"]);
    }

    #[test]
    fn numeric_and_flag_fields_survive_type_drift() {
        #[derive(Deserialize)]
        struct Reading {
            #[serde(default, deserialize_with = "lenient_f64")]
            direction: Option<f64>,
            #[serde(default, deserialize_with = "lenient_f64")]
            tension: Option<f64>,
            #[serde(default, deserialize_with = "lenient_f64")]
            ratio: Option<f64>,
            #[serde(default, deserialize_with = "lenient_bool")]
            valid: Option<bool>,
        }
        let r: Reading = serde_json::from_value(json!({
            "direction": " 90 ",
            "tension": "n/a",
            "ratio": {"value": 1},
            "valid": "TRUE"
        }))
        .unwrap();
        assert_eq!(r.direction, Some(90.0));
        assert!(r.tension.is_none());
        assert!(r.ratio.is_none());
        assert_eq!(r.valid, Some(true));
    }
}
