//! Best-effort rendering of opaque header values.
//!
//! Headers carry no type tag, so rendering is a fixed fallback chain:
//! UTF-8 text first, then big-endian `i32`, `i64`, `f32`, `f64` gated only by
//! byte length, then lossy text. Short byte strings are ambiguous (four
//! bytes of ASCII are text, never an integer) and an `i32` read shadows every
//! later numeric step for inputs of four bytes or more. Downstream consumers
//! rely on this exact classification, so the order must not change.

use bytes::Bytes;
use serde::{Serialize, Serializer};

type NumericReader = fn(&[u8]) -> Option<String>;

/// Numeric fallbacks in the order they are tried.
const NUMERIC_FALLBACKS: [(&str, NumericReader); 4] = [
    ("int32", read_i32),
    ("int64", read_i64),
    ("float32", read_f32),
    ("float64", read_f64),
];

/// Raw header bytes with a rendering helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderValue {
    raw: Bytes,
}

impl HeaderValue {
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self { raw: raw.into() }
    }

    /// Render the value as a display string. Never fails.
    pub fn render(&self) -> String {
        render_header(&self.raw)
    }
}

impl Serialize for HeaderValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

/// Render header bytes following the fallback chain.
pub fn render_header(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    NUMERIC_FALLBACKS
        .iter()
        .find_map(|(_, read)| read(bytes))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
}

fn leading<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}

fn read_i32(bytes: &[u8]) -> Option<String> {
    leading::<4>(bytes).map(|b| i32::from_be_bytes(b).to_string())
}

fn read_i64(bytes: &[u8]) -> Option<String> {
    leading::<8>(bytes).map(|b| i64::from_be_bytes(b).to_string())
}

fn read_f32(bytes: &[u8]) -> Option<String> {
    leading::<4>(bytes).map(|b| f32::from_be_bytes(b).to_string())
}

fn read_f64(bytes: &[u8]) -> Option<String> {
    leading::<8>(bytes).map(|b| f64::from_be_bytes(b).to_string())
}
