pub mod audio;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use audio::{
    live_channel, AudioChunk, AudioFile, AudioProducer, BackpressurePolicy, LiveSegmenter,
    PushOutcome, Segmenter, WavInfo,
};
pub use config::Config;
pub use error::{AsrError, DecodeError, Result, TransportError};
pub use protocol::{Frame, RecognitionResult, Utterance};
pub use session::{
    AudioFormat, Handshake, HandshakeRequest, ResultType, SessionConfig, SessionState,
    SessionStats, StopHandle, StreamingSession, TranscriptSnapshot,
};
pub use transport::{AuthMethod, Endpoint, Transport, WsTransport};
