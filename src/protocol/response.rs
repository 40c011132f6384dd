//! Typed server responses.
//!
//! A decoded [`Frame`] is converted exactly once into a [`RecognitionResult`];
//! the JSON body of full responses is mapped onto [`ServerMessage`].

use super::frame::{Frame, MessageType, Serialization};
use super::payload::{decode_body, decompress, Payload};
use crate::error::{AsrError, Result};
use serde::{Deserialize, Serialize};

/// Status code the server uses for success unless configured otherwise.
pub const DEFAULT_SUCCESS_CODE: u32 = 1000;

/// One recognized speech segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,

    /// `definite` on the wire: stable final result vs. interim hypothesis
    #[serde(rename = "definite", default)]
    pub is_final: bool,

    #[serde(rename = "start_time", default)]
    pub start_time_ms: i64,

    #[serde(rename = "end_time", default)]
    pub end_time_ms: i64,
}

impl Utterance {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            start_time_ms: 0,
            end_time_ms: 0,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            is_final: true,
            ..Self::interim(text)
        }
    }
}

/// JSON body of a full server response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reqid: Option<String>,
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(default)]
    pub result: Option<Vec<ResultItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultItem {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub utterances: Vec<Utterance>,
}

/// A successful full response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullResult {
    pub sequence: Option<i64>,
    /// Running full text (`result[0].text`), empty when absent
    pub text: String,
    pub utterances: Vec<Utterance>,
}

/// One decoded server message.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionResult {
    Ack {
        sequence: i32,
        payload: Option<Payload>,
    },
    Full(FullResult),
    Error {
        code: u32,
        message: String,
    },
}

impl RecognitionResult {
    /// Interpret a decoded frame. Full responses whose `code` differs from
    /// `success_code` become [`RecognitionResult::Error`].
    pub fn from_frame(frame: Frame, success_code: u32) -> Result<Self> {
        match frame.message_type {
            MessageType::ServerAck => {
                let payload = if frame.payload.is_empty() {
                    None
                } else {
                    Some(decode_body(
                        &frame.payload,
                        frame.serialization,
                        frame.compression,
                    )?)
                };
                Ok(RecognitionResult::Ack {
                    sequence: frame.sequence.unwrap_or_default(),
                    payload,
                })
            }
            MessageType::ServerFullResponse => {
                let message = parse_server_message(&frame)?;
                match message.code {
                    Some(code) if code == success_code => {
                        let first = message.result.and_then(|items| items.into_iter().next());
                        let (text, utterances) = first
                            .map(|item| (item.text, item.utterances))
                            .unwrap_or_default();
                        Ok(RecognitionResult::Full(FullResult {
                            sequence: message.sequence,
                            text,
                            utterances,
                        }))
                    }
                    Some(code) => Ok(RecognitionResult::Error {
                        code,
                        message: message.message,
                    }),
                    None => Ok(RecognitionResult::Error {
                        code: 0,
                        message: "response carries no status code".to_string(),
                    }),
                }
            }
            MessageType::ServerErrorResponse => {
                let code = frame.error_code.unwrap_or_default();
                let message = if frame.payload.is_empty() {
                    String::new()
                } else {
                    match decode_body(&frame.payload, frame.serialization, frame.compression)? {
                        Payload::Json(value) => value
                            .get("message")
                            .and_then(|m| m.as_str())
                            .map(str::to_string)
                            .unwrap_or_else(|| value.to_string()),
                        Payload::Text(text) => text,
                        Payload::Raw(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    }
                };
                Ok(RecognitionResult::Error { code, message })
            }
            other => Err(AsrError::Serialization(format!(
                "server sent a client message type {:?}",
                other
            ))),
        }
    }

    pub fn utterances(&self) -> &[Utterance] {
        match self {
            RecognitionResult::Full(full) => &full.utterances,
            _ => &[],
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RecognitionResult::Error { .. })
    }

    /// Convert an error result into the matching [`AsrError::Protocol`].
    pub fn into_protocol_error(self) -> Option<AsrError> {
        match self {
            RecognitionResult::Error { code, message } => Some(AsrError::Protocol { code, message }),
            _ => None,
        }
    }
}

fn parse_server_message(frame: &Frame) -> Result<ServerMessage> {
    if frame.serialization != Serialization::Json {
        return Err(AsrError::Serialization(format!(
            "full response must be JSON, got {:?}",
            frame.serialization
        )));
    }
    let body = decompress(&frame.payload, frame.compression)?;
    Ok(serde_json::from_slice(&body)?)
}
