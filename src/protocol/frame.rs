//! Binary frame encoding and decoding.
//!
//! Every message starts with a 4-byte header:
//! ```text
//! ┌──────────────┬──────────────┬───────────────┬──────────┐
//! │ version|hsize│ type|flags   │ serial|compr  │ reserved │
//! │ 4 bits|4 bits│ 4 bits|4 bits│ 4 bits|4 bits │ 1 byte   │
//! └──────────────┴──────────────┴───────────────┴──────────┘
//! ```
//! followed by `(hsize - 1) * 4` bytes of extension header and a
//! message-type specific body. All multi-byte integers are Big Endian.

use crate::error::{AsrError, DecodeError};

/// Protocol generation carried in every frame.
pub const PROTOCOL_VERSION: u8 = 0b0001;

/// Fixed part of the header in bytes.
pub const HEADER_UNIT: usize = 4;

/// Largest extension header the 4-bit header size can describe.
pub const MAX_EXTENSION_LEN: usize = (0x0f - 1) * HEADER_UNIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    ClientFullRequest,
    ClientAudioOnlyRequest,
    ServerFullResponse,
    ServerAck,
    ServerErrorResponse,
}

impl MessageType {
    pub fn code(self) -> u8 {
        match self {
            MessageType::ClientFullRequest => 0b0001,
            MessageType::ClientAudioOnlyRequest => 0b0010,
            MessageType::ServerFullResponse => 0b1001,
            MessageType::ServerAck => 0b1011,
            MessageType::ServerErrorResponse => 0b1111,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0b0001 => Ok(MessageType::ClientFullRequest),
            0b0010 => Ok(MessageType::ClientAudioOnlyRequest),
            0b1001 => Ok(MessageType::ServerFullResponse),
            0b1011 => Ok(MessageType::ServerAck),
            0b1111 => Ok(MessageType::ServerErrorResponse),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }

    /// Client-originated requests carry a plain payload length prefix.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            MessageType::ClientFullRequest | MessageType::ClientAudioOnlyRequest
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageFlags {
    #[default]
    NoSequence,
    PositiveSequence,
    /// Marks the last audio unit of a stream.
    NegativeSequence,
    NegativeSequenceTerminal,
}

impl MessageFlags {
    pub fn code(self) -> u8 {
        match self {
            MessageFlags::NoSequence => 0b0000,
            MessageFlags::PositiveSequence => 0b0001,
            MessageFlags::NegativeSequence => 0b0010,
            MessageFlags::NegativeSequenceTerminal => 0b0011,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0b0000 => Ok(MessageFlags::NoSequence),
            0b0001 => Ok(MessageFlags::PositiveSequence),
            0b0010 => Ok(MessageFlags::NegativeSequence),
            0b0011 => Ok(MessageFlags::NegativeSequenceTerminal),
            other => Err(DecodeError::UnknownFlags(other)),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageFlags::NegativeSequence | MessageFlags::NegativeSequenceTerminal
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Serialization {
    None,
    #[default]
    Json,
    /// Reserved, never produced by this client.
    Thrift,
    Custom,
}

impl Serialization {
    pub fn code(self) -> u8 {
        match self {
            Serialization::None => 0b0000,
            Serialization::Json => 0b0001,
            Serialization::Thrift => 0b0011,
            Serialization::Custom => 0b1111,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0b0000 => Ok(Serialization::None),
            0b0001 => Ok(Serialization::Json),
            0b0011 => Ok(Serialization::Thrift),
            0b1111 => Ok(Serialization::Custom),
            other => Err(DecodeError::UnknownSerialization(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    None,
    #[default]
    Gzip,
    Custom,
}

impl Compression {
    pub fn code(self) -> u8 {
        match self {
            Compression::None => 0b0000,
            Compression::Gzip => 0b0001,
            Compression::Custom => 0b1111,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0b0000 => Ok(Compression::None),
            0b0001 => Ok(Compression::Gzip),
            0b1111 => Ok(Compression::Custom),
            other => Err(DecodeError::UnknownCompression(other)),
        }
    }
}

/// One unit exchanged over the transport.
///
/// `sequence` is only meaningful for [`MessageType::ServerAck`] and
/// `error_code` only for [`MessageType::ServerErrorResponse`]; both are
/// ignored when encoding other message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub message_type: MessageType,
    pub flags: MessageFlags,
    pub serialization: Serialization,
    pub compression: Compression,
    /// Length must be a multiple of 4 and at most [`MAX_EXTENSION_LEN`].
    /// Empty in every current use; set it through [`Frame::with_extension`].
    pub extension: Vec<u8>,
    pub sequence: Option<i32>,
    pub error_code: Option<u32>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(message_type: MessageType, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type,
            flags: MessageFlags::NoSequence,
            serialization: Serialization::Json,
            compression: Compression::Gzip,
            extension: Vec::new(),
            sequence: None,
            error_code: None,
            payload,
        }
    }

    /// Handshake frame: JSON serialized, gzip compressed.
    pub fn full_request(payload: Vec<u8>) -> Self {
        Self::new(MessageType::ClientFullRequest, payload)
    }

    /// Audio frame; `is_last` switches the flags to `NegativeSequence`.
    pub fn audio_request(payload: Vec<u8>, is_last: bool) -> Self {
        let mut frame = Self::new(MessageType::ClientAudioOnlyRequest, payload);
        if is_last {
            frame.flags = MessageFlags::NegativeSequence;
        }
        frame
    }

    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_methods(mut self, serialization: Serialization, compression: Compression) -> Self {
        self.serialization = serialization;
        self.compression = compression;
        self
    }

    /// Attach an extension header, rejecting lengths the header cannot encode.
    pub fn with_extension(mut self, extension: Vec<u8>) -> Result<Self, AsrError> {
        if extension.len() % HEADER_UNIT != 0 || extension.len() > MAX_EXTENSION_LEN {
            return Err(AsrError::InvalidExtension(extension.len()));
        }
        self.extension = extension;
        Ok(self)
    }

    /// Header size in 4-byte units, extension included.
    pub fn header_size(&self) -> u8 {
        (1 + self.extension.len() / HEADER_UNIT) as u8
    }

    /// Encode to wire bytes.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the extension header is not 4-byte aligned
    /// or longer than [`MAX_EXTENSION_LEN`].
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.extension.len() % HEADER_UNIT == 0);
        debug_assert!(self.extension.len() <= MAX_EXTENSION_LEN);

        let mut buf = Vec::with_capacity(HEADER_UNIT + self.extension.len() + 12 + self.payload.len());
        buf.push((self.version << 4) | (self.header_size() & 0x0f));
        buf.push((self.message_type.code() << 4) | self.flags.code());
        buf.push((self.serialization.code() << 4) | self.compression.code());
        buf.push(0x00);
        buf.extend_from_slice(&self.extension);

        let payload_len = self.payload.len() as u32;
        match self.message_type {
            MessageType::ClientFullRequest
            | MessageType::ClientAudioOnlyRequest
            | MessageType::ServerFullResponse => {
                buf.extend_from_slice(&payload_len.to_be_bytes());
                buf.extend_from_slice(&self.payload);
            }
            MessageType::ServerAck => {
                buf.extend_from_slice(&self.sequence.unwrap_or(0).to_be_bytes());
                if !self.payload.is_empty() {
                    buf.extend_from_slice(&payload_len.to_be_bytes());
                    buf.extend_from_slice(&self.payload);
                }
            }
            MessageType::ServerErrorResponse => {
                buf.extend_from_slice(&self.error_code.unwrap_or(0).to_be_bytes());
                buf.extend_from_slice(&payload_len.to_be_bytes());
                buf.extend_from_slice(&self.payload);
            }
        }

        buf
    }

    /// Decode wire bytes into a frame.
    ///
    /// Any input shorter than its declared boundaries is rejected; the stream
    /// can no longer be trusted to be frame-aligned after that.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let header = reader.take(HEADER_UNIT, "header")?;

        let version = header[0] >> 4;
        let header_size = header[0] & 0x0f;
        if header_size == 0 {
            return Err(DecodeError::InvalidHeaderSize(header_size));
        }
        let message_type = MessageType::from_code(header[1] >> 4)?;
        let flags = MessageFlags::from_code(header[1] & 0x0f)?;
        let serialization = Serialization::from_code(header[2] >> 4)?;
        let compression = Compression::from_code(header[2] & 0x0f)?;

        let extension_len = (header_size as usize - 1) * HEADER_UNIT;
        let extension = reader.take(extension_len, "extension header")?.to_vec();

        let mut sequence = None;
        let mut error_code = None;
        let payload = match message_type {
            MessageType::ClientFullRequest | MessageType::ClientAudioOnlyRequest => {
                let size = reader.u32("payload size")? as usize;
                reader.payload(size)?
            }
            MessageType::ServerFullResponse => {
                let size = reader.i32("payload size")?;
                if size < 0 {
                    return Err(DecodeError::NegativePayloadSize(size));
                }
                reader.payload(size as usize)?
            }
            MessageType::ServerAck => {
                sequence = Some(reader.i32("sequence")?);
                if reader.remaining() >= 4 {
                    let size = reader.u32("payload size")? as usize;
                    reader.payload(size)?
                } else {
                    Vec::new()
                }
            }
            MessageType::ServerErrorResponse => {
                error_code = Some(reader.u32("error code")?);
                let size = reader.u32("payload size")? as usize;
                reader.payload(size)?
            }
        };

        Ok(Self {
            version,
            message_type,
            flags,
            serialization,
            compression,
            extension,
            sequence,
            error_code,
            payload,
        })
    }
}

/// Bounds-checked cursor over a received frame.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                field,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let raw = self.take(4, field)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        let raw = self.take(4, field)?;
        Ok(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Declared size must fit; whatever follows it is the payload.
    fn payload(&mut self, declared: usize) -> Result<Vec<u8>, DecodeError> {
        if self.remaining() < declared {
            return Err(DecodeError::Truncated {
                field: "payload",
                needed: declared,
                available: self.remaining(),
            });
        }
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        Ok(rest.to_vec())
    }
}
