//! Connection authentication headers.

use crate::error::AsrError;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// `Authorization: Bearer; <token>`
    #[default]
    Token,
    /// HMAC-SHA256 over the request line, signed headers and first frame
    Signature,
}

/// A header included in the signature and sent along with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHeader {
    pub name: String,
    pub value: String,
}

impl SignedHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub fn default_signed_headers() -> Vec<SignedHeader> {
    vec![SignedHeader::new("Custom", "auth_custom")]
}

/// Headers to attach to the connection upgrade request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders(pub Vec<(String, String)>);

impl AuthHeaders {
    pub fn bearer(token: &str) -> Self {
        Self(vec![(
            "Authorization".to_string(),
            format!("Bearer; {}", token),
        )])
    }

    /// Sign `first_frame` for a GET on `path`.
    pub fn signature(
        token: &str,
        secret: &str,
        path: &str,
        signed_headers: &[SignedHeader],
        first_frame: &[u8],
    ) -> Result<Self, AsrError> {
        let mac = sign(secret, path, signed_headers, first_frame)?;
        let names = signed_headers
            .iter()
            .map(|h| h.name.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut headers: Vec<(String, String)> = signed_headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();
        headers.push((
            "Authorization".to_string(),
            format!(
                "HMAC256; access_token=\"{}\"; mac=\"{}\"; h=\"{}\"",
                token, mac, names
            ),
        ));
        Ok(Self(headers))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// URL-safe base64 of HMAC-SHA256(secret, canonical request || frame).
fn sign(
    secret: &str,
    path: &str,
    signed_headers: &[SignedHeader],
    first_frame: &[u8],
) -> Result<String, AsrError> {
    let mut input = format!("GET {} HTTP/1.1\n", path).into_bytes();
    for header in signed_headers {
        input.extend_from_slice(header.value.as_bytes());
        input.push(b'\n');
    }
    input.extend_from_slice(first_frame);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AsrError::Configuration(format!("invalid signing secret: {}", e)))?;
    mac.update(&input);
    Ok(base64::engine::general_purpose::URL_SAFE.encode(mac.finalize().into_bytes()))
}
