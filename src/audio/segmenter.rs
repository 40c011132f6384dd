use crate::error::{AsrError, Result};
use crate::session::{AudioFormat, SessionConfig};
use hound::WavReader;
use std::io::Cursor;

/// One unit of audio sent in a single audio-only request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Logical position in the stream (0-indexed)
    pub index: u64,
    pub data: Vec<u8>,
    /// Terminal chunk, sent with the NegativeSequence flag
    pub is_last: bool,
}

/// Format parameters read from a RIFF/WAVE header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Frames (samples per channel) declared by the data chunk
    pub frames: u32,
}

impl WavInfo {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes))
            .map_err(|e| AsrError::Configuration(format!("invalid WAV header: {}", e)))?;
        let spec = reader.spec();

        Ok(Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            frames: reader.duration(),
        })
    }

    pub fn bytes_per_sample(&self) -> u64 {
        (self.bits_per_sample as u64).div_ceil(8)
    }

    /// Bytes of audio per second of playback
    pub fn byte_rate(&self) -> u64 {
        self.channels as u64 * self.bytes_per_sample() * self.sample_rate as u64
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Chunk size for a finite buffer of the given format.
///
/// WAV: one `segment_duration_ms` worth of audio. MP3: the configured fixed
/// size. Anything else is rejected before any network activity.
pub fn chunk_size_for(format: AudioFormat, audio: &[u8], config: &SessionConfig) -> Result<usize> {
    let size = match format {
        AudioFormat::Wav => {
            let info = WavInfo::parse(audio)?;
            (info.byte_rate() * config.segment_duration_ms as u64 / 1000) as usize
        }
        AudioFormat::Mp3 => config.mp3_segment_size,
        other => {
            return Err(AsrError::Configuration(format!(
                "format should be wav or mp3, got {}",
                other
            )))
        }
    };

    if size == 0 {
        return Err(AsrError::Configuration(format!(
            "computed chunk size is zero for {} input",
            format
        )));
    }
    Ok(size)
}

/// Splits a finite buffer into `chunk_size` pieces.
///
/// Exactly one chunk is marked `is_last`: the final one. A buffer whose
/// length is a multiple of `chunk_size` ends with a full-size terminal chunk,
/// and an empty buffer yields a single empty terminal chunk.
#[derive(Debug, Clone)]
pub struct Segmenter<'a> {
    data: &'a [u8],
    chunk_size: usize,
    offset: usize,
    index: u64,
    done: bool,
}

impl<'a> Segmenter<'a> {
    pub fn new(data: &'a [u8], chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AsrError::Configuration(
                "chunk size must be positive".to_string(),
            ));
        }

        Ok(Self {
            data,
            chunk_size,
            offset: 0,
            index: 0,
            done: false,
        })
    }

    /// Segmenter with the chunk size policy applied for `format`.
    pub fn for_format(data: &'a [u8], format: AudioFormat, config: &SessionConfig) -> Result<Self> {
        let chunk_size = chunk_size_for(format, data, config)?;
        Self::new(data, chunk_size)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total number of chunks this segmenter yields from the start.
    pub fn chunk_count(&self) -> usize {
        self.data.len().div_ceil(self.chunk_size).max(1)
    }
}

impl Iterator for Segmenter<'_> {
    type Item = AudioChunk;

    fn next(&mut self) -> Option<AudioChunk> {
        if self.done {
            return None;
        }

        let end = self.offset + self.chunk_size;
        let is_last = end >= self.data.len();
        let end = end.min(self.data.len());

        let chunk = AudioChunk {
            index: self.index,
            data: self.data[self.offset..end].to_vec(),
            is_last,
        };

        self.offset = end;
        self.index += 1;
        self.done = is_last;

        Some(chunk)
    }
}
