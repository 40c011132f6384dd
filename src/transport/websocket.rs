use super::auth::AuthHeaders;
use super::Transport;
use crate::error::TransportError;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue, Uri};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Largest frame accepted from the server (1 GB).
const MAX_MESSAGE_SIZE: usize = 1_000_000_000;

/// WebSocket transport carrying one protocol frame per binary message.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    closed: bool,
}

impl WsTransport {
    /// Open a connection, attaching authentication headers to the upgrade request.
    pub async fn connect(url: &str, headers: &AuthHeaders) -> Result<Self, TransportError> {
        info!("Connecting to {}", url);

        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Connect(format!("invalid url {}: {}", url, e)))?;

        for (name, value) in &headers.0 {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Connect(format!("invalid header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Connect(format!("invalid header value: {}", e)))?;
            request.headers_mut().insert(name, value);
        }

        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(MAX_MESSAGE_SIZE);
        config.max_frame_size = Some(MAX_MESSAGE_SIZE);

        let (stream, response) = connect_async_with_config(request, Some(config), false)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!("Connected to {} (status {})", url, response.status());

        Ok(Self {
            stream,
            url: url.to_string(),
            closed: false,
        })
    }

    /// Request path used in signature authentication.
    pub fn request_path(url: &str) -> Result<String, TransportError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| TransportError::Connect(format!("invalid url {}: {}", url, e)))?;
        Ok(uri.path().to_string())
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.stream
            .send(Message::Binary(frame))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        while let Some(message) = self.stream.next().await {
            match message.map_err(|e| TransportError::Receive(e.to_string()))? {
                Message::Binary(bytes) => return Ok(bytes),
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => {
                    debug!("Server closed connection: {:?}", frame);
                    self.closed = true;
                    return Err(TransportError::Closed);
                }
                Message::Text(text) => {
                    warn!("Ignoring text message: {}", text);
                    return Err(TransportError::UnexpectedMessage("text"));
                }
                Message::Frame(_) => return Err(TransportError::UnexpectedMessage("raw frame")),
            }
        }

        self.closed = true;
        Err(TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        info!("Closing connection to {}", self.url);
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}
