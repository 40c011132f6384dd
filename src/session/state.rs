use serde::{Deserialize, Serialize};

/// Lifecycle of one streaming session.
///
/// ```text
/// Idle ─start─▶ AwaitingHandshakeAck ─ok─▶ Streaming ─last chunk─▶ Finalizing ─▶ Closed
///                       │                      │                       │
///                       └──────────────────────┴───────── error ───────┴──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    AwaitingHandshakeAck,
    Streaming,
    Finalizing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn can_start(self) -> bool {
        self == SessionState::Idle
    }

    pub fn can_send_audio(self) -> bool {
        self == SessionState::Streaming
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}
