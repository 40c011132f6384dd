use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use streaming_asr::{
    live_channel, AudioFile, AudioFormat, Config, PushOutcome, RecognitionResult, ResultType,
    StreamingSession,
};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "streaming-asr", about = "Stream audio to a speech recognition service")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/streaming-asr")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognize a WAV or MP3 file
    File {
        path: PathBuf,

        /// Override format detection from the file extension
        #[arg(long)]
        format: Option<AudioFormat>,
    },
    /// Recognize raw PCM read from stdin until EOF or Ctrl-C
    Live,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let cfg = Config::load(&cli.config)?;
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::File { path, format } => run_file(cfg, path, format).await,
        Command::Live => run_live(cfg).await,
    }
}

async fn run_file(cfg: Config, path: PathBuf, format: Option<AudioFormat>) -> Result<()> {
    let audio = AudioFile::open(&path, format)?;

    let mut session_config = cfg.session;
    session_config.audio.format = audio.format;
    if let Some(wav) = audio.wav {
        session_config.audio.sample_rate = wav.sample_rate;
        session_config.audio.channels = wav.channels;
        session_config.audio.bits = wav.bits_per_sample;
    }

    // Chunk size policy is checked before connecting
    let segments = audio.segments(&session_config)?;

    let mut session = StreamingSession::connect(&cfg.service.endpoint, session_config)
        .await
        .context("Failed to open session")?;
    let on_result = printer(session.config().request.result_type);
    session.stream_file(segments, on_result).await?;

    finish(&session).await;
    Ok(())
}

async fn run_live(cfg: Config) -> Result<()> {
    let buffer_bytes = cfg.live_buffer_bytes();
    let (producer, mut live) = live_channel(cfg.live.queue_capacity, cfg.live.backpressure);

    let mut session_config = cfg.session;
    session_config.audio.format = AudioFormat::Raw;

    let mut session = StreamingSession::connect(&cfg.service.endpoint, session_config)
        .await
        .context("Failed to open session")?;

    let stop = session.stop_handle();
    let stopped = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            stop.stop();
        }
    });

    // Capture side: fixed-size buffers from stdin, dropped producer ends the stream
    let capture = tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        loop {
            let mut buffer = vec![0u8; buffer_bytes];
            let mut filled = 0;
            while filled < buffer.len() {
                match stdin.read(&mut buffer[filled..]).await {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) => {
                        warn!("Failed to read audio from stdin: {}", e);
                        break;
                    }
                }
            }
            if filled == 0 {
                break;
            }
            buffer.truncate(filled);
            if producer.push(buffer).await == PushOutcome::Closed {
                break;
            }
            if filled < buffer_bytes {
                break;
            }
        }
        producer.dropped()
    });

    let on_result = printer(session.config().request.result_type);
    let outcome = session.stream_live(&mut live, on_result).await;
    drop(live);

    // A stopped capture may still be parked in a blocking stdin read
    if stopped.is_stopped() {
        capture.abort();
    } else {
        let dropped = capture.await.unwrap_or_default();
        if dropped > 0 {
            warn!("{} audio buffers dropped under backpressure", dropped);
        }
    }

    outcome?;
    finish(&session).await;
    Ok(())
}

/// Console output: interim text redrawn in place, finals on their own line.
fn printer(result_type: ResultType) -> impl FnMut(&RecognitionResult) {
    let mut printed_finals = 0;
    move |result: &RecognitionResult| {
        let utterances = result.utterances();
        let fresh = match result_type {
            ResultType::Single => utterances,
            // Full responses repeat earlier finals
            ResultType::Full if !utterances.is_empty() => {
                let finals = utterances.iter().filter(|u| u.is_final).count();
                let skip = printed_finals.min(finals);
                printed_finals = finals;
                &utterances[skip..]
            }
            // Text-only responses carry the running transcript
            ResultType::Full => {
                if let RecognitionResult::Full(full) = result {
                    if !full.text.is_empty() {
                        print!("\r{}", full.text);
                        std::io::stdout().flush().ok();
                    }
                }
                utterances
            }
        };

        for utterance in fresh {
            if utterance.is_final {
                println!("\r{}", utterance.text);
            } else {
                print!("\r{}", utterance.text);
                std::io::stdout().flush().ok();
            }
        }
    }
}

async fn finish<T: streaming_asr::Transport>(session: &StreamingSession<T>) {
    let request = &session.config().request;
    if request.result_type == ResultType::Full && !request.show_utterances {
        // End the line the running text was redrawn on
        println!();
    }

    let transcript = session.transcript().snapshot().await;
    let stats = session.stats().await;
    info!(
        "Session {} {:?}: {} chunks, {} final utterances in {:.1}s",
        stats.request_id,
        stats.state,
        stats.chunks_sent,
        transcript.finals.len(),
        stats.duration_secs
    );
}
