//! Streaming session management
//!
//! This module provides the `StreamingSession` state machine that manages:
//! - Handshake construction and acknowledgment
//! - Lockstep audio chunk transmission
//! - Response decoding and transcript aggregation
//! - Cancellation, statistics and transport shutdown

mod config;
mod request;
mod session;
mod state;
mod stats;
mod transcript;

pub use config::{AppParams, AudioFormat, AudioParams, RequestParams, ResultType, SessionConfig, UserParams};
pub use request::{Handshake, HandshakeRequest};
pub use session::{StopHandle, StreamingSession};
pub use state::SessionState;
pub use stats::SessionStats;
pub use transcript::{Transcript, TranscriptHandle, TranscriptSnapshot};
