//! Structured-text unwrapping for fiber-map `description` fields.
//!
//! A description may carry the same properties as the feature itself, encoded
//! as an HTML table (`<td>name</td><td>value</td>`), a JSON object, or loose
//! `name: value` text. Extractors run in that order and the first hit wins.
//! Malformed input falls through to the next extractor.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::text::{coerce_text, non_empty};

pub type Extractor = fn(&str, &str) -> Option<String>;

/// Ordered extraction strategies.
pub const EXTRACTORS: &[(&str, Extractor)] = &[
    ("html_table", from_html_table),
    ("json", from_json),
    ("text", from_free_text),
];

/// Value of property `name` embedded in `text`, if any extractor finds one.
pub fn extract_property(text: &str, name: &str) -> Option<String> {
    if text.trim().is_empty() || name.is_empty() {
        return None;
    }
    EXTRACTORS
        .iter()
        .find_map(|(_, extract)| extract(text, name))
}

/// First of `names` that yields a value.
pub fn extract_any(text: &str, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| extract_property(text, name))
}

pub fn from_html_table(text: &str, name: &str) -> Option<String> {
    if !text.to_ascii_lowercase().contains("<td") {
        return None;
    }
    let pattern = format!(
        r"(?is)<td[^>]*>\s*{}\s*</td>\s*<td[^>]*>(.*?)</td>",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let raw = re.captures(text)?.get(1)?.as_str();
    non_empty(strip_markup(raw))
}

pub fn from_json(text: &str, name: &str) -> Option<String> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    let obj = value.as_object()?;
    let found = obj
        .get(name)
        .or_else(|| {
            obj.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })?;
    non_empty(coerce_text(found).trim().to_string())
}

pub fn from_free_text(text: &str, name: &str) -> Option<String> {
    let pattern = format!(r"(?i){}[\s:=]+(\w+)", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    non_empty(caps.get(1)?.as_str().to_string())
}

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

fn strip_markup(raw: &str) -> String {
    TAGS.replace_all(raw, "")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .trim()
        .to_string()
}
