//! Payload body transcoding: compression and serialization.

use super::frame::{Compression, Serialization};
use crate::error::{AsrError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};

/// A deserialized payload body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    /// Any non-JSON serialization is surfaced as text.
    Text(String),
    Raw(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Payload::Json(_) => "JSON",
            Payload::Text(_) => "text",
            Payload::Raw(_) => "raw",
        }
    }
}

pub fn compress(bytes: &[u8], method: Compression) -> Result<Vec<u8>> {
    match method {
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(bytes).map_err(AsrError::Compression)?;
            encoder.finish().map_err(AsrError::Compression)
        }
        Compression::None | Compression::Custom => Ok(bytes.to_vec()),
    }
}

pub fn decompress(bytes: &[u8], method: Compression) -> Result<Vec<u8>> {
    match method {
        Compression::Gzip => {
            let mut decoded = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut decoded)
                .map_err(AsrError::Compression)?;
            Ok(decoded)
        }
        Compression::None | Compression::Custom => Ok(bytes.to_vec()),
    }
}

pub fn serialize(payload: &Payload, method: Serialization) -> Result<Vec<u8>> {
    match (payload, method) {
        (Payload::Json(value), Serialization::Json) => Ok(serde_json::to_vec(value)?),
        (Payload::Raw(bytes), Serialization::None) => Ok(bytes.clone()),
        (Payload::Text(text), Serialization::Thrift | Serialization::Custom) => {
            Ok(text.as_bytes().to_vec())
        }
        (other, method) => Err(AsrError::Serialization(format!(
            "cannot serialize {} payload with {:?}",
            other.kind(),
            method
        ))),
    }
}

pub fn deserialize(bytes: &[u8], method: Serialization) -> Result<Payload> {
    match method {
        Serialization::Json => Ok(Payload::Json(serde_json::from_slice(bytes)?)),
        Serialization::None => Ok(Payload::Raw(bytes.to_vec())),
        Serialization::Thrift | Serialization::Custom => String::from_utf8(bytes.to_vec())
            .map(Payload::Text)
            .map_err(|e| AsrError::Serialization(e.to_string())),
    }
}

/// Serialize any value as JSON then compress it, as the send path does.
pub fn encode_json<T: Serialize>(value: &T, compression: Compression) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(value)?;
    compress(&body, compression)
}

/// Decompress then deserialize a received body.
pub fn decode_body(
    bytes: &[u8],
    serialization: Serialization,
    compression: Compression,
) -> Result<Payload> {
    let body = decompress(bytes, compression)?;
    deserialize(&body, serialization)
}
