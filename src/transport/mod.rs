//! Message-framed, full-duplex byte channel to the recognition service.

pub mod auth;
pub mod websocket;

use crate::error::{AsrError, TransportError};

pub use auth::{AuthHeaders, AuthMethod, SignedHeader};
pub use websocket::WsTransport;

/// Transport used by a streaming session.
///
/// Each `send` carries exactly one encoded frame and each `recv` yields
/// exactly one received frame.
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Close the connection. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}

/// Where and how to connect.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub url: String,
    pub auth: AuthMethod,
    /// HMAC key, required for [`AuthMethod::Signature`]
    pub secret: String,
    pub signed_headers: Vec<SignedHeader>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            url: "wss://openspeech.bytedance.com/api/v2/asr".to_string(),
            auth: AuthMethod::Token,
            secret: String::new(),
            signed_headers: auth::default_signed_headers(),
        }
    }
}

impl Endpoint {
    /// Headers for the upgrade request; `first_frame` is signed when required.
    pub fn auth_headers(&self, token: &str, first_frame: &[u8]) -> Result<AuthHeaders, AsrError> {
        match self.auth {
            AuthMethod::Token => Ok(AuthHeaders::bearer(token)),
            AuthMethod::Signature => {
                if self.secret.is_empty() {
                    return Err(AsrError::Configuration(
                        "signature auth requires a secret".to_string(),
                    ));
                }
                let path = WsTransport::request_path(&self.url)?;
                AuthHeaders::signature(token, &self.secret, &path, &self.signed_headers, first_frame)
            }
        }
    }
}
