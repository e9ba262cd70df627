//! Parse-or-default adapters for Oracle text.
//!
//! Every structured reply passes through here before the engine sees it.
//! A reply either parses ([`Parsed::Value`]) or is replaced by a documented
//! default ([`Parsed::Fallback`]) carrying the reason.

use std::fmt;

use serde_json::{Map, Value};

/// Why a default was substituted for an Oracle reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The Oracle call failed (transport, timeout, provider error).
    Unavailable(String),
    /// The reply did not match the expected grammar.
    Unparsable { raw: String, detail: String },
    /// The reply parsed but a value was outside its valid range.
    OutOfRange(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(e) => write!(f, "oracle unavailable: {e}"),
            Self::Unparsable { detail, .. } => write!(f, "unparsable reply: {detail}"),
            Self::OutOfRange(detail) => write!(f, "out of range: {detail}"),
        }
    }
}

/// A typed Oracle result: the parsed value, or a default with its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Value(T),
    Fallback { value: T, reason: FallbackReason },
}

impl<T> Parsed<T> {
    pub fn unparsable(value: T, raw: &str, detail: impl Into<String>) -> Self {
        Self::Fallback {
            value,
            reason: FallbackReason::Unparsable {
                raw: raw.to_string(),
                detail: detail.into(),
            },
        }
    }

    pub fn out_of_range(value: T, detail: impl Into<String>) -> Self {
        Self::Fallback {
            value,
            reason: FallbackReason::OutOfRange(detail.into()),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Value(v) | Self::Fallback { value: v, .. } => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Value(v) | Self::Fallback { value: v, .. } => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Value(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        match self {
            Self::Value(v) => Parsed::Value(f(v)),
            Self::Fallback { value, reason } => Parsed::Fallback {
                value: f(value),
                reason,
            },
        }
    }
}

const THINK_END: &str = "</think>";

/// Strip a leading reasoning block and Markdown code fences from a reply.
pub fn clean_response(raw: &str) -> String {
    let text = match raw.find(THINK_END) {
        Some(i) => &raw[i + THINK_END.len()..],
        None => raw,
    };
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim().to_string()
}

/// Parse a JSON object, tolerating prose around it.
pub fn json_object(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        Err(err) => {
            if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
                && start < end
                && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=end])
            {
                return Ok(map);
            }
            Err(err.to_string())
        }
    }
}

/// The first run of ASCII digits in `text`, if any.
pub fn first_integer(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
