use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::engine::SpeechEngine;
use crate::fetch::{FetchOrchestrator, Mode};
use crate::output;
use crate::platform::PlatformTag;
use crate::segment::{Segmenter, TranscriptChunk};
use crate::{ModelSize, ScribeError};

/// One request to fetch and optionally transcribe a single source URL.
/// Immutable once submitted; the coordinator holds no state across calls,
/// so resubmitting after a failure is a fresh, independent execution.
#[derive(Debug, Clone)]
pub struct Job {
    pub source_url: String,
    pub platform: PlatformTag,
    pub mode: Mode,
    pub transcribe: bool,
    pub model_size: ModelSize,
    pub keep_audio: bool,
    pub credential_file: Option<PathBuf>,
    pub segment_length: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Video,
    Audio,
    Transcript,
}

/// A file produced by the pipeline for the caller.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// Final transcript of a job: the ordered concatenation of every chunk's
/// text, written exactly once.
#[derive(Debug, Clone)]
pub struct TranscriptResult {
    pub full_text: String,
    pub output_path: PathBuf,
    /// The source audio, present only when the job kept it.
    pub audio_path: Option<PathBuf>,
}

impl TranscriptResult {
    /// The written transcript as a retained artifact.
    pub fn artifact(&self) -> Artifact {
        Artifact {
            path: self.output_path.clone(),
            kind: ArtifactKind::Transcript,
        }
    }
}

/// Composes fetch, segmentation, transcription, and cleanup into the two
/// job-level operations a caller invokes. Fully sequential: each stage is
/// one blocking external-process call, one job at a time.
pub struct Pipeline {
    output_root: PathBuf,
    insecure_transport: bool,
    segmenter: Segmenter,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            output_root: config.output.root.clone(),
            insecure_transport: config.network.insecure_transport,
            segmenter: Segmenter::new(),
        }
    }

    /// Fetch the media for `job` according to its mode. The artifact is the
    /// deliverable and is always retained.
    pub async fn download(&self, job: &Job) -> Result<Artifact, ScribeError> {
        let orchestrator = self.orchestrator(job);
        let dir = self.output_root.join(job.mode.subdir());

        let path = orchestrator
            .fetch(&job.source_url, job.platform, job.mode, &dir)
            .await
            .map_err(|cause| ScribeError::Fetch { cause })?;

        let kind = if job.mode.is_audio() {
            ArtifactKind::Audio
        } else {
            ArtifactKind::Video
        };
        Ok(Artifact { path, kind })
    }

    /// Fetch audio for `job`, segment it, transcribe every chunk in order,
    /// and write the merged transcript.
    ///
    /// The audio fetched here is an intermediate artifact: it is removed
    /// after the job finishes (successfully or not) unless `keep_audio` is
    /// set. Chunk files never outlive this call.
    pub async fn transcribe(
        &self,
        job: &Job,
        engine: &mut dyn SpeechEngine,
    ) -> Result<TranscriptResult, ScribeError> {
        let orchestrator = self.orchestrator(job);
        let audio_dir = self.output_root.join(Mode::Audio.subdir());

        // A fetch failure has nothing to clean: any partial target is left
        // in place for inspection.
        let audio_path = orchestrator
            .fetch(&job.source_url, job.platform, Mode::Audio, &audio_dir)
            .await
            .map_err(|cause| ScribeError::Fetch { cause })?;

        let mut outcome = self.transcribe_audio(job, engine, &audio_path).await;

        if job.keep_audio {
            if let Ok(result) = &mut outcome {
                result.audio_path = Some(audio_path);
            }
        } else {
            match fs_err::remove_file(&audio_path) {
                Ok(()) => tracing::info!("Removed intermediate audio: {}", audio_path.display()),
                Err(e) => tracing::warn!("Failed to remove {}: {}", audio_path.display(), e),
            }
        }

        outcome
    }

    async fn transcribe_audio(
        &self,
        job: &Job,
        engine: &mut dyn SpeechEngine,
        audio_path: &Path,
    ) -> Result<TranscriptResult, ScribeError> {
        // The SegmentSet owns the chunk working directory; it is removed
        // when `set` drops, on the error paths below included.
        let mut set = self
            .segmenter
            .segment(audio_path, job.segment_length)
            .await
            .map_err(|cause| ScribeError::Segment { cause })?;

        transcribe_chunks(engine, set.chunks_mut())?;

        let full_text = merge_chunk_texts(
            set.chunks()
                .iter()
                .map(|chunk| chunk.text.as_deref().unwrap_or_default()),
        );

        let transcribe_dir = self.output_root.join("transcribe");
        let output_path = transcribe_dir.join(transcript_filename(audio_path));
        output::write_transcript(&output_path, &full_text)
            .map_err(|cause| ScribeError::Output { cause })?;

        tracing::info!("Transcript saved: {}", output_path.display());

        Ok(TranscriptResult {
            full_text,
            output_path,
            audio_path: None,
        })
    }

    fn orchestrator(&self, job: &Job) -> FetchOrchestrator {
        FetchOrchestrator::new(job.credential_file.clone(), self.insecure_transport)
    }
}

/// Feed chunks to the engine strictly in sequence order, filling in their
/// text. The first failure aborts the job; the handle itself stays usable.
fn transcribe_chunks(
    engine: &mut dyn SpeechEngine,
    chunks: &mut [TranscriptChunk],
) -> Result<(), ScribeError> {
    let total = chunks.len();
    for chunk in chunks.iter_mut() {
        tracing::info!(
            "Transcribing chunk {}/{} ({})",
            chunk.sequence_index + 1,
            total,
            chunk.source_path.display()
        );
        let text = engine
            .transcribe_chunk(&chunk.source_path)
            .map_err(|cause| ScribeError::Transcribe {
                chunk_index: chunk.sequence_index,
                cause,
            })?;
        chunk.text = Some(text);
    }
    Ok(())
}

/// Concatenate chunk texts in sequence order: each trimmed, each followed by
/// one blank line.
fn merge_chunk_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    let mut merged = String::new();
    for text in texts {
        merged.push_str(text.trim());
        merged.push_str("\n\n");
    }
    merged
}

/// Transcript filename derived from the audio artifact's stem.
fn transcript_filename(audio_path: &Path) -> String {
    let stem = audio_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transcript");
    format!("{}.txt", stem)
}
