//! Fiber-token extraction and fiber-owner classification.
//!
//! A wire's fiber count is never a stored field; it is recovered from whichever
//! free-text field happens to carry it. Each candidate string runs through an
//! ordered list of strategies (`FIBER_STRATEGIES`) and the first strategy that
//! yields a count wins. New formats are added by appending a strategy.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::describe::extract_property;
use crate::model::{KmzFiberData, PoleWire};
use crate::text::contains_ci;

/// `c_sro` value marking Gigapower-owned features.
pub const GIGAPOWER_SRO: &str = "PSA_317";

/// Counts below this are treated as hardware sizes, not fiber counts.
const MIN_LOOSE_COUNT: u32 = 12;

pub type Combine = fn(&Regex, &str) -> Option<u32>;

pub struct FiberStrategy {
    pub name: &'static str,
    pub pattern: Regex,
    pub combine: Combine,
}

fn strategy(name: &'static str, pattern: &str, combine: Combine) -> FiberStrategy {
    FiberStrategy {
        name,
        pattern: Regex::new(pattern).unwrap(),
        combine,
    }
}

pub static FIBER_STRATEGIES: Lazy<Vec<FiberStrategy>> = Lazy::new(|| {
    vec![
        // "48ct GIG, 72ct GIG" -> 120
        strategy("sum_ct", r"(?i)(\d+)\s*ct\b", sum_captures),
        strategy("fiber_suffix", r"(?i)(\d+)[-\s]*(?:fiber|fbr|f\b)", first_capture),
        strategy("adss_prefix", r"(?i)adss[-\s]*(\d+)", first_capture),
        strategy("count_suffix", r"(?i)(\d+)[-\s]*(?:count|cable|strand|ct)", first_capture),
        strategy("compact", r"(?i)(\d+)(?:ct|f|fiber|fbr)", first_capture),
        strategy("keyword_number", r"\d+", keyword_number),
        strategy("loose_number", r"\d+(?:/\d+)?", loose_number),
    ]
});

fn parse_count(s: &str) -> Option<u32> {
    s.parse::<u32>().ok()
}

fn sum_captures(re: &Regex, text: &str) -> Option<u32> {
    let mut total: Option<u32> = None;
    for caps in re.captures_iter(text) {
        if let Some(n) = caps.get(1).and_then(|m| parse_count(m.as_str())) {
            total = Some(total.unwrap_or(0).saturating_add(n));
        }
    }
    total.filter(|n| *n > 0)
}

fn first_capture(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_count(m.as_str()))
        .filter(|n| *n > 0)
}

fn keyword_number(re: &Regex, text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let mentions_fiber = ["gigapower", "att", "fiber", "fbr"]
        .iter()
        .any(|k| lower.contains(k));
    if !mentions_fiber || lower.contains("messenger") {
        return None;
    }
    re.find_iter(text)
        .filter_map(|m| parse_count(m.as_str()))
        .find(|n| *n >= MIN_LOOSE_COUNT)
}

fn loose_number(re: &Regex, text: &str) -> Option<u32> {
    re.find_iter(text)
        .filter(|m| !m.as_str().contains('/'))
        .filter_map(|m| parse_count(m.as_str()))
        .find(|n| *n >= MIN_LOOSE_COUNT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiberMatch {
    pub count: u32,
    pub strategy: &'static str,
}

/// Run the strategy cascade over one string.
pub fn match_fiber_text(text: &str) -> Option<FiberMatch> {
    if text.trim().is_empty() {
        return None;
    }
    FIBER_STRATEGIES.iter().find_map(|s| {
        (s.combine)(&s.pattern, text).map(|count| FiberMatch {
            count,
            strategy: s.name,
        })
    })
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Anything that carries fiber/owner information in free text.
pub trait FiberText {
    /// Candidate strings for the fiber count, highest priority first.
    fn fiber_candidates(&self) -> Vec<&str>;

    /// Strings that may name the owning company.
    fn owner_texts(&self) -> Vec<&str>;

    /// Explicit `c_sro` value, when the source has one.
    fn sro(&self) -> Option<&str> {
        None
    }
}

impl FiberText for str {
    fn fiber_candidates(&self) -> Vec<&str> {
        vec![self]
    }

    fn owner_texts(&self) -> Vec<&str> {
        vec![self]
    }
}

impl FiberText for PoleWire {
    fn fiber_candidates(&self) -> Vec<&str> {
        vec![
            self.client_item.size.as_str(),
            self.size.as_str(),
            self.description.as_str(),
            self.wire_type.as_str(),
            self.client_item.item_type.as_str(),
        ]
    }

    fn owner_texts(&self) -> Vec<&str> {
        vec![
            self.owner.id.as_str(),
            self.external_id.as_deref().unwrap_or(""),
            self.description.as_str(),
            self.size.as_str(),
            self.client_item.size.as_str(),
            self.client_item.item_type.as_str(),
        ]
    }
}

impl FiberText for KmzFiberData {
    fn fiber_candidates(&self) -> Vec<&str> {
        vec![self.fiber_size.as_str(), self.description.as_str()]
    }

    fn owner_texts(&self) -> Vec<&str> {
        vec![
            self.description.as_str(),
            self.fiber_size.as_str(),
            self.pole_id.as_deref().unwrap_or(""),
        ]
    }

    fn sro(&self) -> Option<&str> {
        self.c_sro.as_deref()
    }
}

/// Fiber count of a wire-like source; 0 when nothing matches.
pub fn extract_fiber_size<T: FiberText + ?Sized>(item: &T) -> u32 {
    item.fiber_candidates()
        .into_iter()
        .find_map(match_fiber_text)
        .map(|m| m.count)
        .unwrap_or(0)
}

static GIGAPOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)gigapower|at&t|\batt\b").unwrap());

static FIBER_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)fiber|fbr|adss|gigapower|\d+\s*ct\b").unwrap());

/// Gigapower / AT&T ownership, by name or by the `c_sro` marker.
pub fn is_gigapower<T: FiberText + ?Sized>(item: &T) -> bool {
    if item.sro().map(|s| contains_ci(s, GIGAPOWER_SRO)).unwrap_or(false) {
        return true;
    }
    let texts = item.owner_texts();
    texts.iter().any(|t| GIGAPOWER.is_match(t))
        || texts.iter().any(|t| {
            extract_property(t, "c_sro")
                .map(|v| contains_ci(&v, GIGAPOWER_SRO))
                .unwrap_or(false)
        })
}

pub fn is_fiber_text(text: &str) -> bool {
    FIBER_WORDS.is_match(text)
}

/// A wire whose text names fiber and yields a nonzero count.
pub fn is_fiber_wire(wire: &PoleWire) -> bool {
    wire.fiber_candidates().into_iter().any(is_fiber_text) && extract_fiber_size(wire) > 0
}
