use anyhow::Context;
use console::style;
use std::path::Path;

use crate::pipeline::{Artifact, ArtifactKind, TranscriptResult};
use crate::Result;

/// Write the merged transcript as UTF-8 plain text, creating the transcribe
/// directory on first use. Called exactly once per job.
pub fn write_transcript(path: &Path, full_text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs_err::write(path, full_text)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Console line for one retained artifact.
pub fn print_artifact(artifact: &Artifact) {
    let noun = match artifact.kind {
        ArtifactKind::Video => "Video",
        ArtifactKind::Audio => "Audio",
        ArtifactKind::Transcript => "Transcript",
    };
    println!(
        "{} {} saved: {}",
        style("✓").green().bold(),
        noun,
        artifact.path.display()
    );
}

/// Console summary for a finished transcription job.
pub fn print_transcript_summary(result: &TranscriptResult, kept_audio: Option<&Path>) {
    print_artifact(&result.artifact());
    if let Some(audio) = kept_audio {
        println!("  Audio kept at: {}", audio.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_transcript_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcribe").join("clip.txt");

        write_transcript(&path, "hello\n\nworld\n\n").unwrap();

        assert_eq!(fs_err::read_to_string(&path).unwrap(), "hello\n\nworld\n\n");
    }

    #[test]
    fn test_write_transcript_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.txt");

        write_transcript(&path, "first").unwrap();
        write_transcript(&path, "second").unwrap();

        assert_eq!(fs_err::read_to_string(&path).unwrap(), "second");
    }
}
