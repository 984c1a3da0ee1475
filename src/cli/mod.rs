use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::ModelSize;
use crate::fetch::Mode;

#[derive(Parser)]
#[command(
    name = "clipscribe",
    about = "Download media from YouTube, Facebook, TikTok, and X - and transcribe it with a local Whisper model",
    version,
    long_about = "A CLI tool that fetches video or audio from supported platforms via yt-dlp and \
optionally transcribes the audio with a locally run Whisper model. Long audio is split into \
fixed-duration segments so memory stays bounded. Batch files process one URL at a time, in order."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download media from a URL
    Download {
        /// Video URL (YouTube, Facebook, TikTok, or X)
        #[arg(value_name = "URL")]
        url: Option<String>,

        /// Text file containing multiple URLs, one per line
        #[arg(long, value_name = "FILE", conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Download mode
        #[arg(short, long, value_enum, default_value_t = Mode::Video)]
        mode: Mode,

        /// Cookie file handed through to the extraction tool
        #[arg(long, value_name = "FILE")]
        cookies: Option<PathBuf>,
    },

    /// Download audio from a URL and transcribe it
    Transcribe {
        /// Video URL (YouTube, Facebook, TikTok, or X)
        #[arg(value_name = "URL")]
        url: Option<String>,

        /// Text file containing multiple URLs, one per line
        #[arg(long, value_name = "FILE", conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Whisper model size (defaults to the configured model)
        #[arg(short, long, value_enum)]
        model: Option<ModelSize>,

        /// Keep the intermediate audio file after transcription
        #[arg(long)]
        keep_audio: bool,

        /// Segment length in minutes for long-audio splitting
        #[arg(long, value_name = "MINUTES")]
        segment_minutes: Option<u64>,

        /// Cookie file handed through to the extraction tool
        #[arg(long, value_name = "FILE")]
        cookies: Option<PathBuf>,
    },

    /// List supported platforms
    Platforms,

    /// Show or locate the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
