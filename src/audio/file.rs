use super::segmenter::{Segmenter, WavInfo};
use crate::error::{AsrError, Result};
use crate::session::{AudioFormat, SessionConfig};
use std::path::Path;
use tracing::info;

/// A finite audio buffer loaded from disk, sent as-is (headers included).
pub struct AudioFile {
    pub path: String,
    pub format: AudioFormat,
    pub bytes: Vec<u8>,
    /// Present for WAV input
    pub wav: Option<WavInfo>,
}

impl AudioFile {
    /// Read a file; `format` overrides detection from the extension.
    pub fn open(path: impl AsRef<Path>, format: Option<AudioFormat>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let format = match format {
            Some(format) => format,
            None => path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(AudioFormat::from_extension)
                .ok_or_else(|| {
                    AsrError::Configuration(format!(
                        "cannot infer audio format from {}",
                        path.display()
                    ))
                })?,
        };

        let bytes = std::fs::read(path)?;
        Self::from_bytes(path.display().to_string(), format, bytes)
    }

    pub fn from_bytes(path: String, format: AudioFormat, bytes: Vec<u8>) -> Result<Self> {
        let wav = match format {
            AudioFormat::Wav => {
                let info = WavInfo::parse(&bytes)?;
                info!(
                    "Audio file loaded: {:.1}s, {}Hz, {} channels, {} bits",
                    info.duration_seconds(),
                    info.sample_rate,
                    info.channels,
                    info.bits_per_sample
                );
                Some(info)
            }
            _ => {
                info!("Audio file loaded: {} bytes of {}", bytes.len(), format);
                None
            }
        };

        Ok(Self {
            path,
            format,
            bytes,
            wav,
        })
    }

    pub fn segments(&self, config: &SessionConfig) -> Result<Segmenter<'_>> {
        Segmenter::for_format(&self.bytes, self.format, config)
    }
}
