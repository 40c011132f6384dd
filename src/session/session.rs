use super::config::SessionConfig;
use super::request::Handshake;
use super::state::SessionState;
use super::stats::SessionStats;
use super::transcript::TranscriptHandle;
use crate::audio::{AudioChunk, LiveSegmenter, Segmenter};
use crate::error::{AsrError, Result, TransportError};
use crate::protocol::{payload, Compression, Frame, RecognitionResult};
use crate::transport::{Endpoint, Transport, WsTransport};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Cooperative stop signal for a running session.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

/// Drives one connection through handshake, lockstep audio streaming and
/// finalization, aggregating recognition results along the way.
pub struct StreamingSession<T: Transport> {
    /// Session configuration
    config: SessionConfig,

    transport: T,

    /// Handshake frame sent on `start`
    handshake: Handshake,

    state: SessionState,

    /// Accumulated transcript, readable from other tasks
    transcript: TranscriptHandle,

    /// When the session was created
    started_at: DateTime<Utc>,

    chunks_sent: usize,
    audio_bytes_sent: usize,
    responses_received: usize,

    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

enum LiveEvent {
    Stop,
    Chunk(Option<AudioChunk>),
}

impl StreamingSession<WsTransport> {
    /// Prepare the handshake, authenticate and open a websocket connection.
    pub async fn connect(endpoint: &Endpoint, config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let handshake = Handshake::prepare(&config)?;
        let headers = endpoint.auth_headers(&config.app.token, &handshake.frame)?;
        let transport = WsTransport::connect(&endpoint.url, &headers).await?;

        Ok(Self::with_handshake(config, transport, handshake))
    }
}

impl<T: Transport> StreamingSession<T> {
    /// Create a session over an already-connected transport.
    pub fn new(config: SessionConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let handshake = Handshake::prepare(&config)?;
        Ok(Self::with_handshake(config, transport, handshake))
    }

    /// Callers validate `config` before preparing the handshake.
    fn with_handshake(config: SessionConfig, transport: T, handshake: Handshake) -> Self {
        info!(
            "Creating streaming session {} over {}",
            handshake.request_id,
            transport.name()
        );

        let (stop_tx, stop_rx) = watch::channel(false);

        Self {
            config,
            transport,
            handshake,
            state: SessionState::Idle,
            transcript: TranscriptHandle::default(),
            started_at: Utc::now(),
            chunks_sent: 0,
            audio_bytes_sent: 0,
            responses_received: 0,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request_id(&self) -> &str {
        &self.handshake.request_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transcript(&self) -> TranscriptHandle {
        self.transcript.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop_tx))
    }

    /// Send the handshake and wait for its acknowledgment.
    ///
    /// Any non-success answer fails the session; nothing is retried.
    pub async fn start(&mut self) -> Result<RecognitionResult> {
        if !self.state.can_start() {
            return Err(AsrError::InvalidState {
                state: self.state,
                operation: "send handshake",
            });
        }

        info!("Starting session {}", self.handshake.request_id);
        self.transition(SessionState::AwaitingHandshakeAck);

        let frame = self.handshake.frame.clone();
        let result = self.exchange(frame).await?;

        match result {
            RecognitionResult::Full(_) => {
                self.transition(SessionState::Streaming);
                info!("Handshake accepted");
                Ok(result)
            }
            RecognitionResult::Error { code, message } => {
                Err(self.fail(AsrError::Protocol { code, message }).await)
            }
            RecognitionResult::Ack { .. } => Err(self
                .fail(AsrError::Protocol {
                    code: 0,
                    message: "handshake answered with an ack instead of a full response".to_string(),
                })
                .await),
        }
    }

    /// Send one chunk and wait for exactly one response.
    ///
    /// A terminal chunk moves the session through `Finalizing` to `Closed`.
    pub async fn send_chunk(&mut self, chunk: &AudioChunk) -> Result<RecognitionResult> {
        if !self.state.can_send_audio() {
            return Err(AsrError::InvalidState {
                state: self.state,
                operation: "send audio",
            });
        }

        if chunk.is_last {
            self.transition(SessionState::Finalizing);
        }

        let body = match payload::compress(&chunk.data, Compression::Gzip) {
            Ok(body) => body,
            Err(e) => return Err(self.fail(e).await),
        };
        let frame = Frame::audio_request(body, chunk.is_last).encode();

        let result = self.exchange(frame).await?;
        self.chunks_sent += 1;
        self.audio_bytes_sent += chunk.data.len();
        debug!(
            "Chunk {} acknowledged ({} bytes, last={})",
            chunk.index,
            chunk.data.len(),
            chunk.is_last
        );

        match &result {
            RecognitionResult::Error { code, message } => {
                warn!("Server rejected chunk {}: {} {}", chunk.index, code, message);
                let err = AsrError::Protocol {
                    code: *code,
                    message: message.clone(),
                };
                self.shutdown(SessionState::Closed).await;
                return Err(err);
            }
            RecognitionResult::Full(full) => {
                self.transcript
                    .update(self.config.request.result_type, full)
                    .await;
            }
            RecognitionResult::Ack { sequence, .. } => {
                debug!("Ack for sequence {}", sequence);
            }
        }

        if chunk.is_last {
            info!("Final chunk acknowledged, closing session");
            self.shutdown(SessionState::Closed).await;
        }

        Ok(result)
    }

    /// Stream a finite buffer, handshaking first if needed.
    ///
    /// Every decoded response (handshake included) is passed to `on_result`.
    pub async fn stream_file<F>(&mut self, segments: Segmenter<'_>, mut on_result: F) -> Result<()>
    where
        F: FnMut(&RecognitionResult),
    {
        if self.state == SessionState::Idle {
            let ack = self.start().await?;
            on_result(&ack);
        }

        info!(
            "Streaming {} chunks of {} bytes",
            segments.chunk_count(),
            segments.chunk_size()
        );

        for chunk in segments {
            if *self.stop_rx.borrow() {
                return self.cancel().await;
            }
            let result = self.send_chunk(&chunk).await?;
            on_result(&result);
        }

        Ok(())
    }

    /// Stream live audio until the producers finish or a stop is requested.
    pub async fn stream_live<F>(&mut self, live: &mut LiveSegmenter, mut on_result: F) -> Result<()>
    where
        F: FnMut(&RecognitionResult),
    {
        if self.state == SessionState::Idle {
            let ack = self.start().await?;
            on_result(&ack);
        }

        loop {
            let event = {
                let stop_rx = &mut self.stop_rx;
                tokio::select! {
                    biased;
                    _ = stop_requested(stop_rx) => LiveEvent::Stop,
                    chunk = live.next_chunk() => LiveEvent::Chunk(chunk),
                }
            };

            let chunk = match event {
                LiveEvent::Stop => {
                    live.close();
                    return self.cancel().await;
                }
                LiveEvent::Chunk(Some(chunk)) => chunk,
                LiveEvent::Chunk(None) => return Ok(()),
            };

            let result = self.send_chunk(&chunk).await?;
            on_result(&result);
            if chunk.is_last {
                return Ok(());
            }
        }
    }

    /// Close the transport without finalizing. No-op once terminal.
    pub async fn close(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        info!("Closing session {} from {:?}", self.handshake.request_id, self.state);
        self.shutdown(SessionState::Closed).await;
        Ok(())
    }

    /// Get current session statistics
    pub async fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            state: self.state,
            request_id: self.handshake.request_id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            chunks_sent: self.chunks_sent,
            audio_bytes_sent: self.audio_bytes_sent,
            responses_received: self.responses_received,
            final_utterances: self.transcript.final_count().await,
        }
    }

    /// Lockstep round trip; any failure closes the transport.
    async fn exchange(&mut self, frame: Vec<u8>) -> Result<RecognitionResult> {
        match self.round_trip(frame).await {
            Ok(result) => {
                self.responses_received += 1;
                Ok(result)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn round_trip(&mut self, frame: Vec<u8>) -> Result<RecognitionResult> {
        self.transport.send(frame).await?;

        let timeout = self.config.response_timeout();
        let raw = tokio::time::timeout(timeout, self.transport.recv())
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        let frame = Frame::decode(&raw)?;
        debug!(
            "Received {:?} ({:?}, {} payload bytes)",
            frame.message_type,
            frame.flags,
            frame.payload.len()
        );
        RecognitionResult::from_frame(frame, self.config.success_code)
    }

    async fn cancel(&mut self) -> Result<()> {
        info!("Session {} stopped before finalizing", self.handshake.request_id);
        self.shutdown(SessionState::Closed).await;
        Ok(())
    }

    async fn fail(&mut self, err: AsrError) -> AsrError {
        error!("Session {} failed: {}", self.handshake.request_id, err);
        self.shutdown(SessionState::Failed).await;
        err
    }

    async fn shutdown(&mut self, state: SessionState) {
        self.transition(state);
        if let Err(e) = self.transport.close().await {
            warn!("Failed to close transport: {}", e);
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Resolves once a stop has been requested.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender lives as long as the session
            std::future::pending::<()>().await;
        }
    }
}
