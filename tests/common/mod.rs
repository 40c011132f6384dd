// Shared helpers for session tests: a scripted in-memory transport and
// builders for server frames.
#![allow(dead_code)]

use serde_json::Value;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use streaming_asr::protocol::{payload, Compression, Frame, MessageType, Serialization};
use streaming_asr::{SessionConfig, Transport, TransportError};

pub enum Scripted {
    Frame(Vec<u8>),
    Fail(TransportError),
    /// Never answers
    Hang,
}

/// Replays canned responses, one per `recv`, and records every sent frame.
pub struct ScriptedTransport {
    responses: VecDeque<Scripted>,
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pub closed: Arc<AtomicBool>,
    pub fail_send: bool,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: responses.into(),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            fail_send: false,
        }
    }

    pub fn frames(responses: Vec<Vec<u8>>) -> Self {
        Self::new(responses.into_iter().map(Scripted::Frame).collect())
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.fail_send {
            return Err(TransportError::Send("broken pipe".to_string()));
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        match self.responses.pop_front() {
            Some(Scripted::Frame(bytes)) => Ok(bytes),
            Some(Scripted::Fail(e)) => Err(e),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn test_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.app.appid = "test-app".to_string();
    config.app.cluster = "test-cluster".to_string();
    config.app.token = "test-token".to_string();
    config
}

/// Gzip-compressed JSON full response.
pub fn full_response(body: Value) -> Vec<u8> {
    let payload = payload::encode_json(&body, Compression::Gzip).unwrap();
    Frame::new(MessageType::ServerFullResponse, payload).encode()
}

pub fn ok_response() -> Vec<u8> {
    full_response(serde_json::json!({ "code": 1000, "message": "Success" }))
}

pub fn utterance_response(utterances: &[(&str, bool)]) -> Vec<u8> {
    let utterances: Vec<Value> = utterances
        .iter()
        .enumerate()
        .map(|(i, (text, definite))| {
            serde_json::json!({
                "text": text,
                "definite": definite,
                "start_time": i as i64 * 1000,
                "end_time": (i as i64 + 1) * 1000,
            })
        })
        .collect();
    let text: String = utterances
        .iter()
        .filter_map(|u| u["text"].as_str())
        .collect();
    full_response(serde_json::json!({
        "code": 1000,
        "message": "Success",
        "result": [{ "text": text, "utterances": utterances }],
    }))
}

pub fn error_response(code: u32, message: &str) -> Vec<u8> {
    let body = serde_json::to_vec(&serde_json::json!({ "message": message })).unwrap();
    let mut frame = Frame::new(MessageType::ServerErrorResponse, body)
        .with_methods(Serialization::Json, Compression::None);
    frame.error_code = Some(code);
    frame.encode()
}

pub fn ack(sequence: i32) -> Vec<u8> {
    let mut frame = Frame::new(MessageType::ServerAck, Vec::new());
    frame.sequence = Some(sequence);
    frame.encode()
}

/// 16-bit PCM WAV of `total_len` bytes in all (header included).
pub fn wav_of_len(sample_rate: u32, channels: u16, total_len: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let header_len = write_wav(spec, 0).len();
    let samples = (total_len - header_len) / 2;
    write_wav(spec, samples)
}

pub fn write_wav(spec: hound::WavSpec, samples: usize) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..samples {
            writer.write_sample((i % 128) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
