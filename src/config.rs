use crate::audio::BackpressurePolicy;
use crate::session::SessionConfig;
use crate::transport::Endpoint;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Application configuration: file layered with `ASR_*` environment overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub live: LiveConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(flatten)]
    pub endpoint: Endpoint,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Buffers held between capture and the session
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
    /// Duration of each captured buffer
    pub buffer_ms: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "streaming-asr".to_string(),
            endpoint: Endpoint::default(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            backpressure: BackpressurePolicy::Block,
            buffer_ms: 500,
        }
    }
}

impl Config {
    /// Load `path` (extension optional) plus environment overrides such as
    /// `ASR_SESSION__APP__TOKEN`.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("ASR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let cfg: Self = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        Ok(cfg)
    }

    /// Bytes in one live capture buffer at the configured audio format.
    pub fn live_buffer_bytes(&self) -> usize {
        let audio = &self.session.audio;
        let bytes_per_sample = (audio.bits as usize).div_ceil(8);
        audio.sample_rate as usize * audio.channels as usize * bytes_per_sample
            * self.live.buffer_ms as usize
            / 1000
    }
}
