use anyhow::Context;
use std::path::Path;
use std::process::{Command, Stdio};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState};

use super::{ModelSize, SpeechEngine};
use crate::{Result, ScribeError};

/// Whisper expects 16 kHz mono input.
const WHISPER_SAMPLE_RATE: &str = "16000";

/// A loaded whisper.cpp model.
///
/// Holds the context (model weights) and a reusable decoding state, so
/// per-chunk calls allocate nothing model-sized. Not re-entrant; the
/// `&mut self` receiver keeps use single-threaded.
pub struct WhisperEngine {
    model_size: ModelSize,
    _context: WhisperContext,
    state: WhisperState,
    threads: i32,
    ffmpeg_path: String,
}

impl WhisperEngine {
    /// Load GGML weights from `model_path`. Expensive: call once per size
    /// per process and reuse the handle.
    pub fn load(model_size: ModelSize, model_path: &Path) -> std::result::Result<Self, ScribeError> {
        Self::load_inner(model_size, model_path).map_err(|cause| ScribeError::ModelLoad {
            model_size,
            cause,
        })
    }

    /// Resolve the weights for `model_size` (downloading on first use) and
    /// load them.
    pub async fn acquire(
        model_size: ModelSize,
        models_dir: &Path,
    ) -> std::result::Result<Self, ScribeError> {
        let model_path = super::ensure_model(model_size, models_dir)
            .await
            .map_err(|cause| ScribeError::ModelLoad { model_size, cause })?;
        Self::load(model_size, &model_path)
    }

    fn load_inner(model_size: ModelSize, model_path: &Path) -> Result<Self> {
        let model_path_str = model_path
            .to_str()
            .context("model path contains invalid UTF-8")?;

        tracing::info!("Loading whisper model '{}' from {}", model_size, model_path_str);

        let ctx_params = WhisperContextParameters::default();
        let context = WhisperContext::new_with_params(model_path_str, ctx_params)
            .map_err(|e| anyhow::anyhow!("failed to load GGML model: {:?}", e))?;

        let state = context
            .create_state()
            .map_err(|e| anyhow::anyhow!("failed to create whisper state: {:?}", e))?;

        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4) as i32;

        Ok(Self {
            model_size,
            _context: context,
            state,
            threads,
            ffmpeg_path: "ffmpeg".to_string(),
        })
    }

    /// Decode any audio container to 16 kHz mono f32 samples by piping PCM
    /// out of ffmpeg, so the model never sees container formats.
    fn decode_samples(&self, chunk_path: &Path) -> Result<Vec<f32>> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(chunk_path)
            .args(["-f", "s16le"])
            .args(["-acodec", "pcm_s16le"])
            .args(["-ar", WHISPER_SAMPLE_RATE])
            .args(["-ac", "1"])
            .arg("-")
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .context("failed to run ffmpeg for PCM decode")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "ffmpeg failed to decode {}: {}",
                chunk_path.display(),
                stderr.trim()
            );
        }

        let samples = pcm_s16le_to_f32(&output.stdout);
        if samples.is_empty() {
            anyhow::bail!("no audio samples decoded from {}", chunk_path.display());
        }
        Ok(samples)
    }
}

impl SpeechEngine for WhisperEngine {
    fn model_size(&self) -> ModelSize {
        self.model_size
    }

    fn transcribe_chunk(&mut self, chunk_path: &Path) -> Result<String> {
        let samples = self.decode_samples(chunk_path)?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads);
        params.set_language(Some("auto"));
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        self.state
            .full(params, &samples)
            .map_err(|e| anyhow::anyhow!("whisper inference failed: {:?}", e))?;

        let mut text = String::new();
        for segment in self.state.as_iter() {
            let segment_text = segment
                .to_str()
                .map_err(|e| anyhow::anyhow!("failed to extract segment text: {:?}", e))?;
            text.push_str(segment_text);
        }

        Ok(text)
    }
}

/// Little-endian signed 16-bit PCM to normalized f32. A trailing odd byte
/// (truncated pipe) is dropped.
fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_conversion_normalizes() {
        let bytes = [
            0x00, 0x00, // 0
            0xFF, 0x7F, // i16::MAX
            0x00, 0x80, // i16::MIN
        ];
        let samples = pcm_s16le_to_f32(&bytes);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - (32767.0 / 32768.0)).abs() < f32::EPSILON);
        assert_eq!(samples[2], -1.0);
    }

    #[test]
    fn test_pcm_conversion_drops_trailing_byte() {
        let samples = pcm_s16le_to_f32(&[0x00, 0x00, 0x12]);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_pcm_conversion_empty() {
        assert!(pcm_s16le_to_f32(&[]).is_empty());
    }
}
