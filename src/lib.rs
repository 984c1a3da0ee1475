//! Clipscribe - download media from supported platforms and optionally
//! transcribe it with a local Whisper model.
//!
//! The pipeline resolves a URL to a platform, drives yt-dlp to fetch the
//! media with byte-level progress, splits long audio into fixed-duration
//! chunks with ffmpeg, and feeds each chunk in order to a loaded
//! speech-to-text engine before merging the texts into one transcript.

pub mod cli;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod segment;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use engine::{ModelSize, SpeechEngine, WhisperEngine};
pub use fetch::Mode;
pub use pipeline::{Job, Pipeline, TranscriptResult};
pub use platform::PlatformTag;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Typed job-level failures, tagged with the pipeline stage they occurred in.
///
/// Every stage-local error carries enough context (stage, chunk index where
/// applicable, underlying cause) by the time it reaches the caller; cleanup
/// has already run before one of these is surfaced.
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    /// The URL matched no supported platform. Non-fatal: batch callers
    /// skip the item and continue.
    #[error("could not detect platform from URL: {0}")]
    UnresolvedUrl(String),

    /// Network or extractor failure. Fatal to the job; never retried
    /// automatically. Any partially written target file is left in place
    /// for inspection.
    #[error("download failed: {cause}")]
    Fetch {
        #[source]
        cause: anyhow::Error,
    },

    /// ffmpeg failed to split the audio. Partial chunks have already been
    /// removed when this is returned.
    #[error("audio segmentation failed: {cause}")]
    Segment {
        #[source]
        cause: anyhow::Error,
    },

    /// The model failed on one chunk. Fatal to the job but not to the
    /// process: the loaded engine handle stays usable for later jobs.
    #[error("transcription failed on chunk {chunk_index}: {cause}")]
    Transcribe {
        chunk_index: usize,
        #[source]
        cause: anyhow::Error,
    },

    /// Engine initialization failure: unknown model size or weights that
    /// could not be fetched. Fatal to any job requesting that size.
    #[error("failed to load whisper model '{model_size}': {cause}")]
    ModelLoad {
        model_size: ModelSize,
        #[source]
        cause: anyhow::Error,
    },

    /// The transcript could not be written to disk.
    #[error("failed to write transcript: {cause}")]
    Output {
        #[source]
        cause: anyhow::Error,
    },
}
