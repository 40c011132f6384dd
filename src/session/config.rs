use crate::error::{AsrError, Result};
use crate::protocol::DEFAULT_SUCCESS_CODE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Per-session parameters sent in the handshake and used to drive streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub app: AppParams,
    pub user: UserParams,
    pub request: RequestParams,
    pub audio: AudioParams,

    /// Duration of each WAV segment sent per request
    /// Default: 15000 ms
    pub segment_duration_ms: u32,

    /// Fixed segment size for MP3 input, in bytes
    pub mp3_segment_size: usize,

    /// Status code that marks a successful response
    pub success_code: u32,

    /// Upper bound for each response wait
    pub response_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppParams {
    pub appid: String,
    pub cluster: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParams {
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParams {
    pub workflow: String,
    pub result_type: ResultType,
    pub show_utterances: bool,
    pub show_language: bool,
    pub nbest: Option<u32>,
    pub sequence: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioParams {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub bits: u16,
    pub channels: u16,
    pub codec: String,
    /// Omitted from the handshake when empty
    pub language: String,
}

/// How the server reports results across responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// Every response repeats all utterances so far
    #[default]
    Full,
    /// Every response carries only new utterances
    Single,
}

impl ResultType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::Full => "full",
            ResultType::Single => "single",
        }
    }
}

/// Declared container format of the audio bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    /// Headerless PCM, used for live input
    Raw,
}

impl AudioFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Raw => "raw",
        }
    }

    /// Infer from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "pcm" | "raw" => Some(AudioFormat::Raw),
            _ => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = AsrError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s)
            .ok_or_else(|| AsrError::Configuration(format!("unsupported audio format: {}", s)))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app: AppParams::default(),
            user: UserParams::default(),
            request: RequestParams::default(),
            audio: AudioParams::default(),
            segment_duration_ms: 15000,
            mp3_segment_size: 10000,
            success_code: DEFAULT_SUCCESS_CODE,
            response_timeout_ms: 10_000,
        }
    }
}

impl Default for UserParams {
    fn default() -> Self {
        Self {
            uid: "streaming_asr_demo".to_string(),
        }
    }
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            workflow: "audio_in,resample,partition,vad,fe,decode,itn,nlu_punctuate".to_string(),
            result_type: ResultType::Full,
            show_utterances: false,
            show_language: false,
            nbest: Some(1),
            sequence: 1,
        }
    }
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            format: AudioFormat::Wav,
            sample_rate: 16000,
            bits: 16,
            channels: 1, // Mono
            codec: "raw".to_string(),
            language: "zh-CN".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Check required parameters before any network activity.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("app.appid", &self.app.appid),
            ("app.cluster", &self.app.cluster),
            ("app.token", &self.app.token),
            ("user.uid", &self.user.uid),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(AsrError::Configuration(format!("{} must not be empty", key)));
            }
        }

        if self.audio.sample_rate == 0 || self.audio.bits == 0 || self.audio.channels == 0 {
            return Err(AsrError::Configuration(format!(
                "invalid audio parameters: rate={} bits={} channels={}",
                self.audio.sample_rate, self.audio.bits, self.audio.channels
            )));
        }
        if self.segment_duration_ms == 0 {
            return Err(AsrError::Configuration(
                "segment_duration_ms must be positive".to_string(),
            ));
        }
        if self.mp3_segment_size == 0 {
            return Err(AsrError::Configuration(
                "mp3_segment_size must be positive".to_string(),
            ));
        }
        if self.response_timeout_ms == 0 {
            return Err(AsrError::Configuration(
                "response_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
