// Session state machine tests over a scripted transport.

mod common;

use anyhow::Result;
use common::*;
use std::sync::atomic::Ordering;
use std::time::Duration;
use streaming_asr::protocol::{payload, Compression, Frame, MessageFlags, MessageType};
use streaming_asr::{
    live_channel, AsrError, AudioChunk, AudioFormat, BackpressurePolicy, RecognitionResult,
    ResultType, Segmenter, SessionState, StreamingSession, TransportError,
};

fn chunk(index: u64, data: &[u8], is_last: bool) -> AudioChunk {
    AudioChunk {
        index,
        data: data.to_vec(),
        is_last,
    }
}

fn decoded_sent(transport_sent: &std::sync::Mutex<Vec<Vec<u8>>>) -> Vec<Frame> {
    transport_sent
        .lock()
        .unwrap()
        .iter()
        .map(|bytes| Frame::decode(bytes).unwrap())
        .collect()
}

#[tokio::test]
async fn test_file_stream_end_to_end() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![
        ok_response(),
        utterance_response(&[("hello", true)]),
    ]);
    let sent = transport.sent.clone();
    let closed = transport.closed.clone();

    let mut session = StreamingSession::new(test_config(), transport)?;
    assert_eq!(session.state(), SessionState::Idle);

    let audio = vec![7u8; 100];
    let segments = Segmenter::new(&audio, 1000)?;
    let mut results = Vec::new();
    session
        .stream_file(segments, |result| results.push(result.clone()))
        .await?;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(results.len(), 2);

    let snapshot = session.transcript().snapshot().await;
    assert_eq!(snapshot.finals, vec!["hello".to_string()]);
    assert_eq!(snapshot.interim, None);

    let frames = decoded_sent(&sent);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].message_type, MessageType::ClientFullRequest);
    assert_eq!(frames[1].message_type, MessageType::ClientAudioOnlyRequest);
    assert_eq!(frames[1].flags, MessageFlags::NegativeSequence);
    assert_eq!(
        payload::decompress(&frames[1].payload, Compression::Gzip)?,
        audio
    );

    let stats = session.stats().await;
    assert_eq!(stats.chunks_sent, 1);
    assert_eq!(stats.audio_bytes_sent, 100);
    assert_eq!(stats.responses_received, 2);
    assert_eq!(stats.final_utterances, 1);
    assert_eq!(stats.request_id, session.request_id());

    Ok(())
}

#[tokio::test]
async fn test_wav_file_stream_end_to_end() -> Result<()> {
    let mut config = test_config();
    config.segment_duration_ms = 1000;

    let transport = ScriptedTransport::frames(vec![
        ok_response(),
        utterance_response(&[("hello", true)]),
    ]);
    let sent = transport.sent.clone();
    let mut session = StreamingSession::new(config, transport)?;

    // One second of 16 kHz mono 16-bit audio, header included
    let wav = wav_of_len(16000, 1, 32000);
    let segments = Segmenter::for_format(&wav, AudioFormat::Wav, session.config())?;
    assert_eq!(segments.chunk_size(), 32000);
    assert_eq!(segments.chunk_count(), 1);

    session.start().await?;
    assert_eq!(session.state(), SessionState::Streaming);

    session.stream_file(segments, |_| {}).await?;
    assert_eq!(session.state(), SessionState::Closed);

    let snapshot = session.transcript().snapshot().await;
    assert_eq!(snapshot.finals, vec!["hello".to_string()]);

    let frames = decoded_sent(&sent);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].flags, MessageFlags::NegativeSequence);
    assert_eq!(
        payload::decompress(&frames[1].payload, Compression::Gzip)?,
        wav
    );
    Ok(())
}

#[tokio::test]
async fn test_text_only_responses_fill_transcript() -> Result<()> {
    let config = test_config();
    assert_eq!(config.request.result_type, ResultType::Full);
    assert!(!config.request.show_utterances);

    // Without show_utterances the server only reports the running text
    let transport = ScriptedTransport::frames(vec![
        ok_response(),
        full_response(serde_json::json!({ "code": 1000, "result": [{ "text": "hel" }] })),
        full_response(serde_json::json!({ "code": 1000, "result": [{ "text": "hello" }] })),
    ]);
    let mut session = StreamingSession::new(config, transport)?;
    let transcript = session.transcript();

    session.start().await?;
    session.send_chunk(&chunk(0, b"a", false)).await?;
    assert_eq!(transcript.snapshot().await.finals, vec!["hel".to_string()]);

    session.send_chunk(&chunk(1, b"b", true)).await?;
    let snapshot = transcript.snapshot().await;
    assert_eq!(snapshot.finals, vec!["hello".to_string()]);
    assert_eq!(snapshot.interim, None);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.stats().await.final_utterances, 1);
    Ok(())
}

#[tokio::test]
async fn test_handshake_frame_is_sent_verbatim() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![ok_response()]);
    let sent = transport.sent.clone();

    let mut session = StreamingSession::new(test_config(), transport)?;
    session.start().await?;

    let frames = decoded_sent(&sent);
    let body = payload::decompress(&frames[0].payload, Compression::Gzip)?;
    let json: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(json["request"]["reqid"], session.request_id());
    assert_eq!(json["app"]["token"], "test-token");
    Ok(())
}

#[tokio::test]
async fn test_only_final_chunk_is_terminal() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![
        ok_response(),
        ok_response(),
        ok_response(),
        ok_response(),
    ]);
    let sent = transport.sent.clone();

    let mut session = StreamingSession::new(test_config(), transport)?;
    let audio = vec![1u8; 25];
    session
        .stream_file(Segmenter::new(&audio, 10)?, |_| {})
        .await?;

    let frames = decoded_sent(&sent);
    let flags: Vec<MessageFlags> = frames[1..].iter().map(|f| f.flags).collect();
    assert_eq!(
        flags,
        vec![
            MessageFlags::NoSequence,
            MessageFlags::NoSequence,
            MessageFlags::NegativeSequence
        ]
    );
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_handshake_rejected() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![full_response(serde_json::json!({
        "code": 2000,
        "message": "invalid token",
    }))]);
    let sent = transport.sent.clone();
    let closed = transport.closed.clone();

    let mut session = StreamingSession::new(test_config(), transport)?;
    let audio = vec![0u8; 64];
    let err = session
        .stream_file(Segmenter::new(&audio, 16)?, |_| {})
        .await
        .unwrap_err();

    match err {
        AsrError::Protocol { code, message } => {
            assert_eq!(code, 2000);
            assert_eq!(message, "invalid token");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.state(), SessionState::Failed);
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(sent.lock().unwrap().len(), 1, "no audio after rejection");
    Ok(())
}

#[tokio::test]
async fn test_handshake_answered_by_error_frame() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![error_response(45_000_001, "bad request")]);
    let mut session = StreamingSession::new(test_config(), transport)?;

    let err = session.start().await.unwrap_err();
    assert_eq!(err.code(), Some(45_000_001));
    assert!(err.to_string().contains("bad request"));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test]
async fn test_handshake_answered_by_ack() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![ack(1)]);
    let mut session = StreamingSession::new(test_config(), transport)?;

    let err = session.start().await.unwrap_err();
    assert_eq!(err.code(), Some(0));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test]
async fn test_response_without_code_is_a_failure() -> Result<()> {
    let transport =
        ScriptedTransport::frames(vec![full_response(serde_json::json!({ "message": "?" }))]);
    let mut session = StreamingSession::new(test_config(), transport)?;

    let err = session.start().await.unwrap_err();
    assert_eq!(err.code(), Some(0));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test]
async fn test_custom_success_code() -> Result<()> {
    let mut config = test_config();
    config.success_code = 20_000_000;
    let transport = ScriptedTransport::frames(vec![full_response(serde_json::json!({
        "code": 20_000_000,
        "message": "OK",
    }))]);

    let mut session = StreamingSession::new(config, transport)?;
    session.start().await?;
    assert_eq!(session.state(), SessionState::Streaming);
    Ok(())
}

#[tokio::test]
async fn test_audio_before_handshake_is_rejected() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![]);
    let sent = transport.sent.clone();
    let mut session = StreamingSession::new(test_config(), transport)?;

    let err = session.send_chunk(&chunk(0, b"abc", false)).await.unwrap_err();
    assert!(matches!(
        err,
        AsrError::InvalidState {
            state: SessionState::Idle,
            ..
        }
    ));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(sent.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_double_start_is_rejected() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![ok_response()]);
    let mut session = StreamingSession::new(test_config(), transport)?;

    session.start().await?;
    let err = session.start().await.unwrap_err();
    assert!(matches!(
        err,
        AsrError::InvalidState {
            state: SessionState::Streaming,
            ..
        }
    ));
    assert_eq!(session.state(), SessionState::Streaming);
    Ok(())
}

#[tokio::test]
async fn test_audio_after_close_is_rejected() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![ok_response(), ok_response()]);
    let mut session = StreamingSession::new(test_config(), transport)?;

    session.start().await?;
    session.send_chunk(&chunk(0, b"end", true)).await?;
    assert_eq!(session.state(), SessionState::Closed);

    let err = session.send_chunk(&chunk(1, b"more", false)).await.unwrap_err();
    assert!(matches!(err, AsrError::InvalidState { .. }));

    // Closing a terminal session is a no-op
    session.close().await?;
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_single_mode_aggregation() -> Result<()> {
    let mut config = test_config();
    config.request.result_type = ResultType::Single;

    let transport = ScriptedTransport::frames(vec![
        ok_response(),
        utterance_response(&[("H", false)]),
        utterance_response(&[("He", false)]),
        utterance_response(&[("Hello", true)]),
    ]);
    let mut session = StreamingSession::new(config, transport)?;
    let transcript = session.transcript();

    session.start().await?;
    session.send_chunk(&chunk(0, b"a", false)).await?;
    assert_eq!(
        transcript.snapshot().await.interim.as_deref(),
        Some("H")
    );

    session.send_chunk(&chunk(1, b"b", false)).await?;
    let snapshot = transcript.snapshot().await;
    assert!(snapshot.finals.is_empty());
    assert_eq!(snapshot.interim.as_deref(), Some("He"));

    session.send_chunk(&chunk(2, b"c", true)).await?;
    let snapshot = transcript.snapshot().await;
    assert_eq!(snapshot.finals, vec!["Hello".to_string()]);
    assert_eq!(snapshot.interim, None);
    Ok(())
}

#[tokio::test]
async fn test_full_mode_replaces_transcript() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![
        ok_response(),
        utterance_response(&[("one", true), ("tw", false)]),
        // Empty result lists leave the transcript untouched
        ok_response(),
        utterance_response(&[("one", true), ("two", true)]),
    ]);
    let mut session = StreamingSession::new(test_config(), transport)?;
    let transcript = session.transcript();

    session.start().await?;
    session.send_chunk(&chunk(0, b"a", false)).await?;
    let snapshot = transcript.snapshot().await;
    assert_eq!(snapshot.finals, vec!["one".to_string()]);
    assert_eq!(snapshot.interim.as_deref(), Some("tw"));

    session.send_chunk(&chunk(1, b"b", false)).await?;
    assert_eq!(transcript.snapshot().await.interim.as_deref(), Some("tw"));

    session.send_chunk(&chunk(2, b"c", true)).await?;
    let snapshot = transcript.snapshot().await;
    assert_eq!(snapshot.finals, vec!["one".to_string(), "two".to_string()]);
    assert_eq!(snapshot.interim, None);
    Ok(())
}

#[tokio::test]
async fn test_mid_stream_error_closes_session() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![
        ok_response(),
        full_response(serde_json::json!({ "code": 1013, "message": "no speech" })),
    ]);
    let sent = transport.sent.clone();
    let closed = transport.closed.clone();

    let mut session = StreamingSession::new(test_config(), transport)?;
    let audio = vec![0u8; 30];
    let err = session
        .stream_file(Segmenter::new(&audio, 10)?, |_| {})
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(1013));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(sent.lock().unwrap().len(), 2, "no further chunks");
    Ok(())
}

#[tokio::test]
async fn test_mid_stream_ack_keeps_streaming() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![ok_response(), ack(2)]);
    let mut session = StreamingSession::new(test_config(), transport)?;

    session.start().await?;
    let result = session.send_chunk(&chunk(0, b"a", false)).await?;
    assert_eq!(
        result,
        RecognitionResult::Ack {
            sequence: 2,
            payload: None
        }
    );
    assert_eq!(session.state(), SessionState::Streaming);
    Ok(())
}

#[tokio::test]
async fn test_malformed_response_fails_session() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![ok_response(), vec![0x11, 0x90]]);
    let closed = transport.closed.clone();
    let mut session = StreamingSession::new(test_config(), transport)?;

    session.start().await?;
    let err = session.send_chunk(&chunk(0, b"a", false)).await.unwrap_err();
    assert!(matches!(err, AsrError::Decode(_)));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(closed.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_gzip_body_fails_session() -> Result<()> {
    let corrupt = Frame::new(MessageType::ServerFullResponse, b"not gzip".to_vec()).encode();
    let transport = ScriptedTransport::frames(vec![corrupt]);
    let mut session = StreamingSession::new(test_config(), transport)?;

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, AsrError::Compression(_)));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test]
async fn test_response_timeout() -> Result<()> {
    let mut config = test_config();
    config.response_timeout_ms = 50;
    let transport = ScriptedTransport::new(vec![Scripted::Frame(ok_response()), Scripted::Hang]);
    let mut session = StreamingSession::new(config, transport)?;

    session.start().await?;
    let err = session.send_chunk(&chunk(0, b"a", true)).await.unwrap_err();
    assert!(matches!(
        err,
        AsrError::Transport(TransportError::Timeout(d)) if d == Duration::from_millis(50)
    ));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test]
async fn test_connection_drop_fails_session() -> Result<()> {
    let transport = ScriptedTransport::new(vec![
        Scripted::Frame(ok_response()),
        Scripted::Fail(TransportError::Receive("connection reset".to_string())),
    ]);
    let mut session = StreamingSession::new(test_config(), transport)?;

    session.start().await?;
    let err = session.send_chunk(&chunk(0, b"a", false)).await.unwrap_err();
    assert!(matches!(err, AsrError::Transport(TransportError::Receive(_))));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test]
async fn test_send_failure_fails_session() -> Result<()> {
    let mut transport = ScriptedTransport::frames(vec![ok_response()]);
    transport.fail_send = true;
    let mut session = StreamingSession::new(test_config(), transport)?;

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, AsrError::Transport(TransportError::Send(_))));
    assert_eq!(session.state(), SessionState::Failed);
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_rejected_before_io() {
    let mut config = test_config();
    config.app.token = String::new();
    let transport = ScriptedTransport::frames(vec![]);

    let err = StreamingSession::new(config, transport).err().unwrap();
    assert!(matches!(err, AsrError::Configuration(_)));
}

#[tokio::test]
async fn test_stop_skips_remaining_chunks() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![ok_response(), ok_response()]);
    let sent = transport.sent.clone();
    let closed = transport.closed.clone();

    let mut session = StreamingSession::new(test_config(), transport)?;
    let stop = session.stop_handle();
    stop.stop();
    assert!(stop.is_stopped());

    let audio = vec![0u8; 40];
    session
        .stream_file(Segmenter::new(&audio, 10)?, |_| {})
        .await?;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(sent.lock().unwrap().len(), 1, "handshake only");
    Ok(())
}

#[tokio::test]
async fn test_live_stream_until_producer_drops() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![
        ok_response(),
        utterance_response(&[("hi", false)]),
        utterance_response(&[("hi there", false)]),
        utterance_response(&[("hi there", true)]),
    ]);
    let sent = transport.sent.clone();

    let mut session = StreamingSession::new(test_config(), transport)?;
    let (producer, mut live) = live_channel(4, BackpressurePolicy::Block);

    producer.push(vec![1; 8]).await;
    producer.push(vec![2; 8]).await;
    drop(producer);

    let mut responses = 0;
    session.stream_live(&mut live, |_| responses += 1).await?;

    assert_eq!(responses, 4);
    assert_eq!(session.state(), SessionState::Closed);

    let frames = decoded_sent(&sent);
    assert_eq!(frames.len(), 4);
    let last = frames.last().unwrap();
    assert_eq!(last.flags, MessageFlags::NegativeSequence);
    assert!(payload::decompress(&last.payload, Compression::Gzip)?.is_empty());

    let snapshot = session.transcript().snapshot().await;
    assert_eq!(snapshot.finals, vec!["hi there".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_live_stream_stop() -> Result<()> {
    let transport = ScriptedTransport::frames(vec![ok_response(), ok_response()]);
    let sent = transport.sent.clone();
    let closed = transport.closed.clone();

    let mut session = StreamingSession::new(test_config(), transport)?;
    let (producer, mut live) = live_channel(4, BackpressurePolicy::Block);
    producer.push(vec![1; 8]).await;

    let stop = session.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();
    });

    // The producer stays alive, so only the stop ends the stream
    session.stream_live(&mut live, |_| {}).await?;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(sent.lock().unwrap().len(), 2, "handshake and one chunk");
    assert_eq!(producer.push(vec![3; 8]).await, streaming_asr::PushOutcome::Closed);
    Ok(())
}
