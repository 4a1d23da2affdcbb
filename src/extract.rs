//! Output text extraction helpers (v0.1)
//!
//! Cogs that wrap LLMs or shell pipelines return prose with JSON or
//! numbers buried inside. The cascade here digs them out:
//!
//! - JSON: whole string -> ```json fences -> any fenced block ->
//!   brace/bracket-delimited substrings (earliest start, so the
//!   longest candidate is tried first); first structurally valid
//!   candidate wins.
//! - Numbers: the candidate with the most digits wins, after
//!   stripping thousands separators and currency symbols.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::EngineError;

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```json\s*\n(.*?)```").expect("json fence regex is valid")
});

static ANY_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[a-zA-Z0-9_-]*\s*\n(.*?)```").expect("fence regex is valid")
});

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-?[\$€£¥]?\s?\d[\d,_]*(?:\.\d+)?(?:[eE][-+]?\d+)?")
        .expect("number regex is valid")
});

/// Parse JSON out of free-form text using the fallback cascade.
pub fn json(text: &str) -> Result<Value, EngineError> {
    try_json(text).ok_or_else(|| EngineError::Parse {
        details: preview(text),
    })
}

/// Non-raising variant of [`json`].
pub fn try_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    // 1. The whole string is already JSON.
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    // 2. ```json fenced blocks, then 3. any fenced block.
    for fence in [&*JSON_FENCE, &*ANY_FENCE] {
        for caps in fence.captures_iter(trimmed) {
            if let Ok(value) = serde_json::from_str::<Value>(caps[1].trim()) {
                return Some(value);
            }
        }
    }

    // 4. Brace/bracket-delimited substrings. Scanning start positions
    // left to right tries the longest candidates first; the serde
    // deserializer accepts a valid prefix and ignores the tail.
    for (idx, ch) in trimmed.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut de = serde_json::Deserializer::from_str(&trimmed[idx..]);
        if let Ok(value) = Value::deserialize(&mut de) {
            if value.is_object() || value.is_array() {
                return Some(value);
            }
        }
    }

    None
}

/// Locate the most plausible number in the text.
pub fn number(text: &str) -> Result<f64, EngineError> {
    try_number(text).ok_or(EngineError::NoNumber)
}

/// Non-raising variant of [`number`].
pub fn try_number(text: &str) -> Option<f64> {
    let mut best: Option<(usize, f64)> = None;
    for m in NUMBER.find_iter(text) {
        let cleaned: String = m
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | 'e' | 'E' | '+'))
            .collect();
        let Ok(parsed) = cleaned.parse::<f64>() else {
            continue;
        };
        let digits = cleaned.chars().filter(char::is_ascii_digit).count();
        // Most digits wins; first match wins ties.
        if best.map_or(true, |(n, _)| digits > n) {
            best = Some((digits, parsed));
        }
    }
    best.map(|(_, value)| value)
}

/// Rounded-integer variant of [`number`].
pub fn integer(text: &str) -> Result<i64, EngineError> {
    number(text).map(|n| n.round() as i64)
}

/// Non-raising variant of [`integer`].
pub fn try_integer(text: &str) -> Option<i64> {
    try_number(text).map(|n| n.round() as i64)
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    let trimmed = text.trim();
    if trimmed.len() <= LIMIT {
        trimmed.to_string()
    } else {
        let cut = trimmed
            .char_indices()
            .take_while(|(i, _)| *i < LIMIT)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &trimmed[..cut])
    }
}
