use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// An immutable value carried by a topic.
///
/// The text is the source of truth: the byte view is its UTF-8 encoding and the
/// numeric view is parsed from it once, at construction. Text that is not a
/// number yields `NaN`, which is how operators tell drivable numeric messages
/// apart from opaque text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    text: String,
    numeric: f64,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let numeric = parse_numeric(&text);
        Self {
            text,
            numeric,
            created_at: Utc::now(),
        }
    }

    /// Build a message from text that may be missing, e.g. an absent request parameter.
    pub fn try_from_text(text: Option<&str>) -> Result<Self> {
        match text {
            Some(text) => Ok(Self::from_text(text)),
            None => Err(EngineError::InvalidArgument(
                "message text cannot be absent".to_string(),
            )),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_text(String::from_utf8_lossy(bytes).into_owned())
    }

    /// The number is formatted first and parsed back, so `5.0` carries the text `"5.0"`.
    pub fn from_number(value: f64) -> Self {
        Self::from_text(format_number(value))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn numeric(&self) -> f64 {
        self.numeric
    }

    pub fn is_numeric(&self) -> bool {
        !self.numeric.is_nan()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::from_text(text)
    }
}

impl From<f64> for Message {
    fn from(value: f64) -> Self {
        Message::from_number(value)
    }
}

/// Parse the way a JVM `Double.parseDouble` does, yielding `NaN` on failure.
///
/// Accepted: decimal and exponent forms, an optional `f`/`F`/`d`/`D` suffix,
/// hexadecimal floats such as `0x1p3`, and the exact spellings `Infinity` and
/// `NaN`. Rust-only spellings like `inf` or `nan` are text.
fn parse_numeric(text: &str) -> f64 {
    let text = text.trim_matches(|c: char| c <= ' ');
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = match body {
        "Infinity" => Some(f64::INFINITY),
        "NaN" => None,
        _ => {
            let body = body.strip_suffix(['f', 'F', 'd', 'D']).unwrap_or(body);
            if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
                parse_hex(hex)
            } else {
                parse_decimal(body)
            }
        }
    };
    match magnitude {
        Some(value) if negative => -value,
        Some(value) => value,
        None => f64::NAN,
    }
}

fn parse_decimal(body: &str) -> Option<f64> {
    let starts_with_digit_or_dot = body.starts_with(|c: char| c.is_ascii_digit() || c == '.');
    let plain = body.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !starts_with_digit_or_dot || !plain {
        return None;
    }
    body.parse::<f64>().ok()
}

/// `<hex digits>[.<hex digits>]p<signed exponent>`; the binary exponent is required.
fn parse_hex(body: &str) -> Option<f64> {
    let (mantissa, exponent) = body.split_once(['p', 'P'])?;
    let exponent: i32 = exponent.parse().ok()?;
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let mut value = 0.0_f64;
    for c in whole.chars().chain(fraction.chars()) {
        value = value * 16.0 + f64::from(c.to_digit(16)?);
    }
    let scale = i32::try_from(fraction.len()).ok()?.checked_mul(4)?;
    Some(value * 2f64.powi(exponent.checked_sub(scale)?))
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        // Debug keeps a trailing `.0` on integral values and round-trips exactly.
        format!("{value:?}")
    }
}
