//! Wire protocol
//!
//! - `frame`: bit-packed header + body codec, no I/O
//! - `payload`: gzip and JSON transcoding of frame bodies
//! - `response`: typed view of decoded server frames

pub mod frame;
pub mod payload;
pub mod response;

pub use frame::{
    Compression, Frame, MessageFlags, MessageType, Serialization, MAX_EXTENSION_LEN,
    PROTOCOL_VERSION,
};
pub use payload::Payload;
pub use response::{FullResult, RecognitionResult, ServerMessage, Utterance, DEFAULT_SUCCESS_CODE};
