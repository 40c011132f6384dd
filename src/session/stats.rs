use super::state::SessionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a streaming session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current lifecycle state
    pub state: SessionState,

    /// Identifier sent in the handshake
    pub request_id: String,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of audio-only requests sent
    pub chunks_sent: usize,

    /// Uncompressed audio bytes sent
    pub audio_bytes_sent: usize,

    /// Number of response frames decoded (handshake included)
    pub responses_received: usize,

    /// Number of final utterances in the transcript
    pub final_utterances: usize,
}
