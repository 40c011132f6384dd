//! Handshake request construction.

use super::config::SessionConfig;
use crate::error::Result;
use crate::protocol::{payload, Compression, Frame};
use serde::{Deserialize, Serialize};

/// JSON body of the initial full client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub app: AppSection,
    pub user: UserSection,
    pub request: RequestSection,
    pub audio: AudioSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSection {
    pub appid: String,
    pub cluster: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSection {
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSection {
    pub reqid: String,
    pub workflow: String,
    pub show_utterances: bool,
    pub result_type: String,
    pub sequence: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbest: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_language: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSection {
    pub format: String,
    pub rate: u32,
    pub bits: u16,
    pub channel: u16,
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl HandshakeRequest {
    /// Map session parameters and a request identifier onto the handshake body.
    pub fn build(config: &SessionConfig, reqid: impl Into<String>) -> Self {
        Self {
            app: AppSection {
                appid: config.app.appid.clone(),
                cluster: config.app.cluster.clone(),
                token: config.app.token.clone(),
            },
            user: UserSection {
                uid: config.user.uid.clone(),
            },
            request: RequestSection {
                reqid: reqid.into(),
                workflow: config.request.workflow.clone(),
                show_utterances: config.request.show_utterances,
                result_type: config.request.result_type.as_str().to_string(),
                sequence: config.request.sequence,
                nbest: config.request.nbest,
                show_language: config.request.show_language.then_some(true),
            },
            audio: AudioSection {
                format: config.audio.format.as_str().to_string(),
                rate: config.audio.sample_rate,
                bits: config.audio.bits,
                channel: config.audio.channels,
                codec: config.audio.codec.clone(),
                language: Some(config.audio.language.clone()).filter(|l| !l.is_empty()),
            },
        }
    }
}

/// A handshake ready to send: the request, its id and the encoded frame.
///
/// The frame bytes are fixed up front because signature authentication
/// signs exactly the bytes of the first frame.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub request_id: String,
    pub request: HandshakeRequest,
    pub frame: Vec<u8>,
}

impl Handshake {
    /// Build with a fresh request identifier.
    pub fn prepare(config: &SessionConfig) -> Result<Self> {
        Self::with_request_id(config, uuid::Uuid::new_v4().to_string())
    }

    pub fn with_request_id(config: &SessionConfig, request_id: String) -> Result<Self> {
        let request = HandshakeRequest::build(config, request_id.clone());
        let body = payload::encode_json(&request, Compression::Gzip)?;
        let frame = Frame::full_request(body).encode();

        Ok(Self {
            request_id,
            request,
            frame,
        })
    }
}
