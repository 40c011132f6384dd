pub mod file;
pub mod live;
pub mod segmenter;

pub use file::AudioFile;
pub use live::{live_channel, AudioProducer, BackpressurePolicy, LiveSegmenter, PushOutcome};
pub use segmenter::{chunk_size_for, AudioChunk, Segmenter, WavInfo};
