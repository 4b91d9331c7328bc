//! Pluggable record value decoders.
//!
//! A decoder failure never aborts a read: the worker substitutes a
//! placeholder built by [`decode_or_placeholder`] and the record is still
//! filtered and delivered.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value decoding failure for a single record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid UTF-8 at byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

/// Converts raw value bytes into a display string.
pub trait ValueDecoder: Send + Sync {
    /// Short name used in placeholders and logs.
    fn name(&self) -> &'static str;

    fn decode(&self, value: &[u8]) -> Result<String, DecodeError>;
}

/// Strict UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Decoder;

impl ValueDecoder for Utf8Decoder {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn decode(&self, value: &[u8]) -> Result<String, DecodeError> {
        std::str::from_utf8(value)
            .map(str::to_string)
            .map_err(|e| DecodeError::InvalidUtf8 {
                valid_up_to: e.valid_up_to(),
            })
    }
}

/// UTF-8 text with invalid sequences replaced. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LossyDecoder;

impl ValueDecoder for LossyDecoder {
    fn name(&self) -> &'static str {
        "lossy"
    }

    fn decode(&self, value: &[u8]) -> Result<String, DecodeError> {
        Ok(String::from_utf8_lossy(value).into_owned())
    }
}

/// JSON documents, re-serialized compactly or pretty-printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder {
    pub pretty: bool,
}

impl ValueDecoder for JsonDecoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, value: &[u8]) -> Result<String, DecodeError> {
        let document: serde_json::Value =
            serde_json::from_slice(value).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        };
        rendered.map_err(|e| DecodeError::InvalidJson(e.to_string()))
    }
}

/// Decode `value`, or describe the failure in its place.
///
/// A missing value (tombstone) renders as an empty string without consulting
/// the decoder.
pub fn decode_or_placeholder(decoder: &dyn ValueDecoder, value: Option<&[u8]>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match decoder.decode(value) {
        Ok(decoded) => decoded,
        Err(e) => format!("<decode error ({}): {}>", decoder.name(), e),
    }
}

/// Decoder selection for configuration and command lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    #[default]
    Utf8,
    Json,
    Lossy,
}

impl DecoderKind {
    pub fn build(self) -> Arc<dyn ValueDecoder> {
        match self {
            DecoderKind::Utf8 => Arc::new(Utf8Decoder),
            DecoderKind::Json => Arc::new(JsonDecoder { pretty: false }),
            DecoderKind::Lossy => Arc::new(LossyDecoder),
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderKind::Utf8 => f.write_str("utf8"),
            DecoderKind::Json => f.write_str("json"),
            DecoderKind::Lossy => f.write_str("lossy"),
        }
    }
}

impl FromStr for DecoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" | "string" => Ok(DecoderKind::Utf8),
            "json" => Ok(DecoderKind::Json),
            "lossy" => Ok(DecoderKind::Lossy),
            other => Err(format!("unknown decoder '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_decoder() {
        assert_eq!(Utf8Decoder.decode(b"hello").unwrap(), "hello");
        assert_eq!(
            Utf8Decoder.decode(&[b'o', b'k', 0xff]),
            Err(DecodeError::InvalidUtf8 { valid_up_to: 2 })
        );
    }

    #[test]
    fn test_json_decoder_compacts() {
        let decoder = JsonDecoder { pretty: false };
        assert_eq!(decoder.decode(br#"{ "a" : [1, 2] }"#).unwrap(), r#"{"a":[1,2]}"#);
        assert!(matches!(decoder.decode(b"{not json"), Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_lossy_decoder_never_fails() {
        assert_eq!(LossyDecoder.decode(&[b'a', 0xff]).unwrap(), "a\u{FFFD}");
    }

    #[test]
    fn test_placeholder_is_non_empty() {
        let placeholder = decode_or_placeholder(&Utf8Decoder, Some(&[0xc3, 0x28]));
        assert!(placeholder.starts_with("<decode error (utf8):"));

        let placeholder = decode_or_placeholder(&JsonDecoder::default(), Some(b""));
        assert!(placeholder.starts_with("<decode error (json):"));
    }

    #[test]
    fn test_tombstone_renders_empty() {
        assert_eq!(decode_or_placeholder(&JsonDecoder::default(), None), "");
    }

    #[test]
    fn test_decoder_kind_parsing() {
        assert_eq!("JSON".parse::<DecoderKind>().unwrap(), DecoderKind::Json);
        assert_eq!("utf-8".parse::<DecoderKind>().unwrap(), DecoderKind::Utf8);
        assert!("avro".parse::<DecoderKind>().is_err());
        assert_eq!(DecoderKind::Lossy.build().name(), "lossy");
    }
}
