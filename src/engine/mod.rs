use anyhow::Context;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::Result;

pub mod whisper;

pub use whisper::WhisperEngine;

/// GGML weights are published per size in the ggerganov/whisper.cpp
/// HuggingFace repository.
const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Whisper model size. Larger models trade speed for accuracy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }

    /// Filename of the GGML weights for this size.
    pub fn ggml_filename(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "ggml-tiny.bin",
            ModelSize::Base => "ggml-base.bin",
            ModelSize::Small => "ggml-small.bin",
            ModelSize::Medium => "ggml-medium.bin",
            ModelSize::Large => "ggml-large-v3.bin",
        }
    }

    pub fn weights_url(&self) -> String {
        format!("{}/{}", MODEL_BASE_URL, self.ggml_filename())
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The speech-to-text boundary.
///
/// A handle wraps one loaded model. Loading is expensive and intended to
/// happen at most once per size per process; callers reuse the handle across
/// all chunks of a job and across sequential jobs of the same size.
/// `transcribe_chunk` takes `&mut self`: the handle is single-threaded and
/// chunks must be fed strictly in sequence order.
pub trait SpeechEngine {
    fn model_size(&self) -> ModelSize;

    /// Blocking, synchronous transcription of one audio chunk.
    fn transcribe_chunk(&mut self, chunk_path: &Path) -> Result<String>;
}

/// Resolve the on-disk path for a model size, downloading the weights on
/// first use. Returns the verified path.
pub async fn ensure_model(size: ModelSize, models_dir: &Path) -> Result<PathBuf> {
    let model_path = models_dir.join(size.ggml_filename());
    if model_path.exists() {
        tracing::debug!("Model already present: {}", model_path.display());
        return Ok(model_path);
    }

    fs_err::create_dir_all(models_dir)?;
    tracing::info!(
        "Downloading whisper model '{}' to {}",
        size,
        model_path.display()
    );
    download_weights(&size.weights_url(), &model_path).await?;
    Ok(model_path)
}

/// Stream the weights to a `.downloading` sibling and rename on completion,
/// so an interrupted download never leaves a half-written model behind.
async fn download_weights(url: &str, output_path: &Path) -> Result<()> {
    let temp_path = output_path.with_extension("downloading");

    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to request {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("model download failed: HTTP {}", response.status());
    }

    let total = response.content_length().unwrap_or(0);
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap(),
    );
    bar.set_message("Downloading model weights");

    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .with_context(|| format!("failed to create {}", temp_path.display()))?;

    let mut stream = response.bytes_stream();
    while let Some(item) = stream.next().await {
        let chunk = item.context("error while downloading model weights")?;
        file.write_all(&chunk).await?;
        bar.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&temp_path, output_path)
        .await
        .context("failed to move downloaded model into place")?;
    bar.finish_with_message("Model ready");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ggml_filenames() {
        assert_eq!(ModelSize::Tiny.ggml_filename(), "ggml-tiny.bin");
        assert_eq!(ModelSize::Base.ggml_filename(), "ggml-base.bin");
        assert_eq!(ModelSize::Large.ggml_filename(), "ggml-large-v3.bin");
    }

    #[test]
    fn test_weights_url() {
        assert_eq!(
            ModelSize::Small.weights_url(),
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin"
        );
    }

    #[test]
    fn test_display_matches_cli_names() {
        assert_eq!(ModelSize::Medium.to_string(), "medium");
        assert_eq!(ModelSize::default(), ModelSize::Base);
    }

    #[tokio::test]
    async fn test_ensure_model_short_circuits_on_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ModelSize::Tiny.ggml_filename());
        fs_err::write(&path, b"weights").unwrap();

        let resolved = ensure_model(ModelSize::Tiny, dir.path()).await.unwrap();
        assert_eq!(resolved, path);
    }
}
