//! Recovery of typed values from free-text model output.
//!
//! Model output is unreliable: it may wrap JSON in prose, fence it in
//! markdown, or fail to emit JSON at all. Extraction therefore runs a
//! lenience pipeline — strict parse, fenced-block scan, outermost-bracket
//! slice — and ends in a caller-supplied synthetic value instead of an
//! error. Callers observe which branch produced the value through the
//! [`Extraction`] tag and pattern-match on it; nothing here ever fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fenced block regex"));

/// A value recovered from model output, tagged with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    /// The text parsed (directly or after slicing) into the expected shape.
    Parsed(T),
    /// Parsing failed at every stage; `value` is the caller's synthetic
    /// fallback and `reason` records why it was needed.
    Fallback { value: T, reason: String },
}

impl<T> Extraction<T> {
    pub fn into_value(self) -> T {
        match self {
            Extraction::Parsed(value) => value,
            Extraction::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Extraction::Parsed(_) => None,
            Extraction::Fallback { reason, .. } => Some(reason.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Array,
    Object,
}

impl Shape {
    fn brackets(self) -> (char, char) {
        match self {
            Shape::Array => ('[', ']'),
            Shape::Object => ('{', '}'),
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Shape::Array => "array",
            Shape::Object => "object",
        }
    }
}

/// Extract a JSON array from `raw`, falling back to `fallback()` when no
/// parseable array can be recovered.
pub fn extract_array<T, F>(raw: &str, fallback: F) -> Extraction<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    extract(raw, Shape::Array, fallback)
}

/// Extract a JSON object from `raw`, falling back to `fallback()` when no
/// parseable object can be recovered.
pub fn extract_object<T, F>(raw: &str, fallback: F) -> Extraction<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    extract(raw, Shape::Object, fallback)
}

fn extract<T, F>(raw: &str, shape: Shape, fallback: F) -> Extraction<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Extraction::Parsed(value);
    }

    // Models frequently fence the payload even when told not to.
    for capture in FENCED_BLOCK.captures_iter(trimmed) {
        let candidate = capture[1].trim();
        if let Ok(value) = serde_json::from_str::<T>(candidate) {
            return Extraction::Parsed(value);
        }
        if let Some(value) = bracket_slice::<T>(candidate, shape) {
            return Extraction::Parsed(value);
        }
    }

    if let Some(value) = bracket_slice::<T>(trimmed, shape) {
        return Extraction::Parsed(value);
    }

    let reason = format!(
        "no parseable JSON {} in response ({} chars)",
        shape.noun(),
        trimmed.len()
    );
    tracing::warn!(target: "conductor.extract", reason = %reason, "extraction fell back to synthetic value");
    Extraction::Fallback {
        value: fallback(),
        reason,
    }
}

/// Slice from the first opening bracket to the last matching closing bracket
/// and retry the strict parse on the slice.
fn bracket_slice<T: DeserializeOwned>(text: &str, shape: Shape) -> Option<T> {
    let (open, close) = shape.brackets();
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<T>(&text[start..=end]).ok()
}
