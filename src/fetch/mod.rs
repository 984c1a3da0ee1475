use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::platform::PlatformTag;
use crate::utils;
use crate::Result;

pub mod progress;

use progress::{DownloadProgress, ProgressPhase, ProgressState, PROGRESS_MARKER};

/// What the fetch should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// Best available video+audio combination, merged to mp4
    #[default]
    Video,
    /// Audio-only stream, re-encoded to mp3
    Audio,
    /// Single best combined stream, remuxed into mp4 without re-encoding
    Best,
}

impl Mode {
    /// Output subdirectory under the output root.
    pub fn subdir(&self) -> &'static str {
        match self {
            Mode::Video | Mode::Best => "video",
            Mode::Audio => "audio",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Mode::Video | Mode::Best => "mp4",
            Mode::Audio => "mp3",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Mode::Audio)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Video => write!(f, "video"),
            Mode::Audio => write!(f, "audio"),
            Mode::Best => write!(f, "best"),
        }
    }
}

/// Drives yt-dlp for one URL at a time: title probe, format selection per
/// mode, byte progress, and verification of the produced artifact.
///
/// One orchestrator serves every platform; per-platform differences live in
/// the `PlatformTag` passed to `fetch`.
pub struct FetchOrchestrator {
    yt_dlp_path: String,
    cookie_file: Option<PathBuf>,
    insecure_transport: bool,
}

impl FetchOrchestrator {
    pub fn new(cookie_file: Option<PathBuf>, insecure_transport: bool) -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            cookie_file,
            insecure_transport,
        }
    }

    /// Metadata-only probe for the remote title. No media is transferred.
    pub async fn probe_title(&self, url: &str) -> Result<Option<String>> {
        tracing::debug!("Probing metadata for: {}", url);

        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.args(["--dump-json", "--no-playlist"]);
        self.add_transport_args(&mut cmd);
        cmd.arg(url).stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = cmd.output().await.context("failed to run yt-dlp")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp metadata probe failed: {}", stderr.trim());
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .context("failed to parse yt-dlp metadata JSON")?;
        Ok(title_from_metadata(&info))
    }

    /// Fetch the media for `url` into `output_dir` according to `mode`.
    ///
    /// Returns the verified final artifact path. A non-zero exit is an
    /// error and is never retried; whatever yt-dlp partially wrote is left
    /// in place for inspection.
    pub async fn fetch(
        &self,
        url: &str,
        platform: PlatformTag,
        mode: Mode,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        fs_err::create_dir_all(output_dir)?;

        let title = match self.probe_title(url).await {
            Ok(Some(title)) => title,
            Ok(None) => platform.name().to_string(),
            Err(e) => {
                tracing::warn!("Title probe failed ({}), using platform name", e);
                platform.name().to_string()
            }
        };

        let filename =
            utils::timestamped_filename(&title, chrono::Local::now().naive_local(), mode.extension());
        let final_path = output_dir.join(&filename);
        // yt-dlp substitutes the real extension during post-processing, so
        // the template uses the stem only.
        let stem = filename
            .strip_suffix(&format!(".{}", mode.extension()))
            .unwrap_or(&filename);
        let outtmpl = output_dir.join(format!("{}.%(ext)s", stem));

        let args = build_download_args(mode, &outtmpl.to_string_lossy());

        tracing::info!("Downloading [{}] {} -> {}", platform, url, final_path.display());

        let mut cmd = Command::new(&self.yt_dlp_path);
        cmd.args(&args);
        self.add_transport_args(&mut cmd);
        cmd.arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        let mut child = cmd.spawn().context("failed to spawn yt-dlp")?;

        // One live ProgressState per in-flight fetch; reset here by
        // construction, never shared across jobs.
        let mut state = ProgressState::default();
        let mut reporter = DownloadProgress::new(platform.name());

        let stdout = child
            .stdout
            .take()
            .context("yt-dlp stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("yt-dlp stderr was not captured")?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("yt-dlp stderr: {}", line);
                collected.push(line);
            }
            collected
        });

        let pump_result =
            pump_progress(BufReader::new(stdout), &mut state, &mut reporter).await;

        if let Err(e) = pump_result {
            state.phase = ProgressPhase::Failed;
            reporter.abandon();
            // The process must not outlive this call; kill() also reaps it.
            child.kill().await.ok();
            stderr_task.await.ok();
            return Err(e).context("failed while reading yt-dlp output");
        }

        let status = child.wait().await.context("failed to wait for yt-dlp")?;
        let stderr_lines = stderr_task.await.unwrap_or_default();

        if !status.success() {
            state.phase = ProgressPhase::Failed;
            reporter.abandon();
            anyhow::bail!(
                "yt-dlp exited with {}: {}",
                status,
                stderr_lines.join("\n").trim()
            );
        }

        if fs_err::metadata(&final_path).is_err() {
            anyhow::bail!(
                "yt-dlp reported success but expected artifact is missing: {}",
                final_path.display()
            );
        }

        tracing::info!(
            "Download complete: {} ({})",
            final_path.display(),
            utils::format_file_size(state.downloaded_bytes)
        );

        Ok(final_path)
    }

    fn add_transport_args(&self, cmd: &mut Command) {
        if let Some(cookie_file) = &self.cookie_file {
            cmd.arg("--cookies").arg(cookie_file);
        }
        // Opt-in only; disabling certificate checks is never a default.
        if self.insecure_transport {
            cmd.arg("--no-check-certificate");
        }
    }
}

/// Drain progress lines from yt-dlp stdout, feeding each event to the state
/// and the reporter. Returns the first read error; every line seen before it
/// has already been applied.
async fn pump_progress(
    reader: impl tokio::io::AsyncBufRead + Unpin,
    state: &mut ProgressState,
    reporter: &mut DownloadProgress,
) -> std::io::Result<()> {
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(event) = progress::parse_progress_line(&line) {
            state.apply(&event);
            reporter.observe(&event);
        } else {
            tracing::debug!("yt-dlp: {}", line);
        }
    }
    Ok(())
}

/// Arguments for the transfer itself, minus transport options and the URL.
fn build_download_args(mode: Mode, outtmpl: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--no-playlist".into(),
        "--progress-template".into(),
        format!(
            "download:{}|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s",
            PROGRESS_MARKER
        ),
        "-o".into(),
        outtmpl.into(),
    ];

    match mode {
        Mode::Audio => {
            args.extend([
                "-f".into(),
                "bestaudio/best".into(),
                "--extract-audio".into(),
                "--audio-format".into(),
                "mp3".into(),
                "--audio-quality".into(),
                "192K".into(),
            ]);
        }
        Mode::Best => {
            // The best combined stream can arrive in any container (webm
            // included); remuxing pins the extension the caller is promised
            // without touching the codec.
            args.extend([
                "-f".into(),
                "best".into(),
                "--remux-video".into(),
                "mp4".into(),
            ]);
        }
        Mode::Video => {
            args.extend([
                "-f".into(),
                "bestvideo+bestaudio/best".into(),
                "--merge-output-format".into(),
                "mp4".into(),
            ]);
        }
    }

    args
}

fn title_from_metadata(info: &Value) -> Option<String> {
    info["title"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_subdirs_and_extensions() {
        assert_eq!(Mode::Video.subdir(), "video");
        assert_eq!(Mode::Best.subdir(), "video");
        assert_eq!(Mode::Audio.subdir(), "audio");
        assert_eq!(Mode::Video.extension(), "mp4");
        assert_eq!(Mode::Audio.extension(), "mp3");
        assert!(Mode::Audio.is_audio());
        assert!(!Mode::Best.is_audio());
    }

    #[test]
    fn test_audio_args_reencode_to_mp3() {
        let args = build_download_args(Mode::Audio, "out/audio/x.%(ext)s");
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "bestaudio/best"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--audio-format" && w[1] == "mp3"));
    }

    #[test]
    fn test_video_args_merge_without_reencode() {
        let args = build_download_args(Mode::Video, "out/video/x.%(ext)s");
        assert!(!args.contains(&"--extract-audio".to_string()));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "-f" && w[1] == "bestvideo+bestaudio/best"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--merge-output-format" && w[1] == "mp4"));
    }

    #[test]
    fn test_best_args_single_stream() {
        let args = build_download_args(Mode::Best, "out/video/x.%(ext)s");
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "best"));
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn test_best_args_pin_the_promised_container() {
        // A webm best-stream would otherwise land beside a predicted .mp4
        // path and fail the post-download existence check.
        let args = build_download_args(Mode::Best, "out/video/x.%(ext)s");
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--remux-video" && w[1] == Mode::Best.extension()));
    }

    #[test]
    fn test_args_always_carry_progress_template() {
        for mode in [Mode::Video, Mode::Audio, Mode::Best] {
            let args = build_download_args(mode, "x.%(ext)s");
            let template_pos = args
                .iter()
                .position(|a| a == "--progress-template")
                .expect("progress template missing");
            assert!(args[template_pos + 1].starts_with("download:clipscribe|"));
            assert!(args.contains(&"--no-playlist".to_string()));
        }
    }

    #[tokio::test]
    async fn test_pump_progress_surfaces_read_errors() {
        struct BrokenPipe {
            data: &'static [u8],
            pos: usize,
        }

        impl tokio::io::AsyncRead for BrokenPipe {
            fn poll_read(
                mut self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                if self.pos < self.data.len() {
                    let n = buf.remaining().min(self.data.len() - self.pos);
                    let start = self.pos;
                    buf.put_slice(&self.data[start..start + n]);
                    self.pos += n;
                    std::task::Poll::Ready(Ok(()))
                } else {
                    std::task::Poll::Ready(Err(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "lost pipe",
                    )))
                }
            }
        }

        let reader = BufReader::new(BrokenPipe {
            data: b"clipscribe|downloading|10|100|NA\n",
            pos: 0,
        });
        let mut state = ProgressState::default();
        let mut reporter = DownloadProgress::hidden("youtube");

        let err = pump_progress(reader, &mut state, &mut reporter)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        // The line read before the break was applied, nothing was lost.
        assert_eq!(state.downloaded_bytes, 10);
        assert_eq!(reporter.position(), Some(10));
        // The caller tears the bar down without claiming completion.
        reporter.abandon();
        assert_eq!(reporter.position(), None);
    }

    #[test]
    fn test_title_from_metadata() {
        let info: Value = serde_json::json!({"title": "  My Clip  ", "id": "abc"});
        assert_eq!(title_from_metadata(&info), Some("My Clip".to_string()));

        let no_title: Value = serde_json::json!({"id": "abc"});
        assert_eq!(title_from_metadata(&no_title), None);

        let empty: Value = serde_json::json!({"title": "   "});
        assert_eq!(title_from_metadata(&empty), None);
    }
}
