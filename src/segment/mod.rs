use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

use crate::Result;

/// Zero-padding width of the chunk sequence index. Three digits keeps
/// lexicographic and chronological order identical for any realistic job.
const INDEX_WIDTH: usize = 3;
const CHUNK_PREFIX: &str = "part_";

/// One bounded-duration audio segment, in production order.
#[derive(Debug)]
pub struct TranscriptChunk {
    /// 0-based, gapless across the set.
    pub sequence_index: usize,
    pub source_path: PathBuf,
    /// Filled in by the transcription engine, in the same order.
    pub text: Option<String>,
}

/// The ordered chunks of one segmented audio file.
///
/// Owns the temporary working directory; dropping the set removes every
/// chunk file, so cleanup happens on success and on every failure path.
#[derive(Debug)]
pub struct SegmentSet {
    chunks: Vec<TranscriptChunk>,
    _workdir: TempDir,
}

impl SegmentSet {
    pub fn chunks(&self) -> &[TranscriptChunk] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [TranscriptChunk] {
        &mut self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Cuts one audio artifact into fixed-duration chunks with ffmpeg,
/// stream-copying so no re-encode happens and memory stays flat.
pub struct Segmenter {
    ffmpeg_path: String,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }

    /// Split `audio_path` into consecutive chunks of at most
    /// `segment_length` each. On success the returned set is non-empty and
    /// densely indexed from 0; on error no chunk files are left behind.
    pub async fn segment(&self, audio_path: &Path, segment_length: Duration) -> Result<SegmentSet> {
        let ext = audio_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_string();

        let workdir = tempfile::Builder::new()
            .prefix("clipscribe-segments-")
            .tempdir()
            .context("failed to create segment working directory")?;

        let template = workdir
            .path()
            .join(format!("{}%0{}d.{}", CHUNK_PREFIX, INDEX_WIDTH, ext));

        tracing::info!(
            "Splitting {} into {}s segments",
            audio_path.display(),
            segment_length.as_secs()
        );

        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(audio_path)
            .args(["-f", "segment"])
            .args(["-segment_time", &segment_length.as_secs().to_string()])
            .args(["-c", "copy"])
            .arg(&template)
            .stdin(Stdio::null())
            .output()
            .await
            .context("failed to run ffmpeg")?;

        if !output.status.success() {
            // workdir drops here, removing any partial chunks.
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg exited with {}: {}", output.status, stderr.trim());
        }

        let chunks = collect_chunks(workdir.path(), &ext)?;
        tracing::info!("Produced {} chunk(s)", chunks.len());

        Ok(SegmentSet {
            chunks,
            _workdir: workdir,
        })
    }
}

/// Enumerate chunk files and order them by their zero-padded sequence index,
/// independent of filesystem listing order. A gap, a foreign index, or an
/// empty directory is an error.
fn collect_chunks(dir: &Path, ext: &str) -> Result<Vec<TranscriptChunk>> {
    let suffix = format!(".{}", ext);
    let mut indexed: Vec<(usize, PathBuf)> = Vec::new();

    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(index_str) = name
            .strip_prefix(CHUNK_PREFIX)
            .and_then(|s| s.strip_suffix(&suffix))
        else {
            continue;
        };
        let index: usize = index_str
            .parse()
            .with_context(|| format!("unexpected chunk filename: {}", name))?;
        indexed.push((index, entry.path()));
    }

    if indexed.is_empty() {
        anyhow::bail!("ffmpeg produced no chunks in {}", dir.display());
    }

    indexed.sort_by(|a, b| a.0.cmp(&b.0));

    for (expected, (index, path)) in indexed.iter().enumerate() {
        if *index != expected {
            anyhow::bail!(
                "chunk sequence has a gap: expected index {}, found {} ({})",
                expected,
                index,
                path.display()
            );
        }
    }

    Ok(indexed
        .into_iter()
        .map(|(sequence_index, source_path)| TranscriptChunk {
            sequence_index,
            source_path,
            text: None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs_err::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_collect_chunks_ordered_and_dense() {
        let dir = tempfile::tempdir().unwrap();
        // Created out of order on purpose; collection must sort by index.
        touch(dir.path(), "part_002.mp3");
        touch(dir.path(), "part_000.mp3");
        touch(dir.path(), "part_001.mp3");

        let chunks = collect_chunks(dir.path(), "mp3").unwrap();
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert!(chunk.source_path.ends_with(format!("part_00{}.mp3", i)));
            assert!(chunk.text.is_none());
        }
    }

    #[test]
    fn test_collect_chunks_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "part_000.mp3");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "part_001.mp3");

        let chunks = collect_chunks(dir.path(), "mp3").unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_collect_chunks_rejects_gap() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "part_000.mp3");
        touch(dir.path(), "part_002.mp3");

        let err = collect_chunks(dir.path(), "mp3").unwrap_err();
        assert!(err.to_string().contains("gap"));
    }

    #[test]
    fn test_collect_chunks_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_chunks(dir.path(), "mp3").is_err());
    }

    #[test]
    fn test_segment_set_removes_workdir_on_drop() {
        let workdir = tempfile::Builder::new()
            .prefix("clipscribe-segments-")
            .tempdir()
            .unwrap();
        touch(workdir.path(), "part_000.mp3");
        let dir_path = workdir.path().to_path_buf();

        let set = SegmentSet {
            chunks: collect_chunks(&dir_path, "mp3").unwrap(),
            _workdir: workdir,
        };
        assert_eq!(set.len(), 1);
        drop(set);

        assert!(!dir_path.exists());
    }
}
