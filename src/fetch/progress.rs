use indicatif::{ProgressBar, ProgressStyle};

/// Marker prepended to our `--progress-template` so progress lines can be
/// told apart from the rest of yt-dlp's output.
pub const PROGRESS_MARKER: &str = "clipscribe";

/// One byte-progress event reported by the extraction tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
}

/// Lifecycle of one in-flight fetch. Owned by a single fetch call and reset
/// at its start; never shared across jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressPhase {
    #[default]
    NotStarted,
    InProgress,
    Finished,
    Failed,
}

/// Byte-level download state, mutated only by the fetch loop's event parser.
#[derive(Debug, Default)]
pub struct ProgressState {
    pub total_bytes: Option<u64>,
    pub downloaded_bytes: u64,
    pub phase: ProgressPhase,
}

impl ProgressState {
    pub fn apply(&mut self, event: &ProgressEvent) {
        match event.status {
            ProgressStatus::Downloading => {
                self.phase = ProgressPhase::InProgress;
                if self.total_bytes.is_none() {
                    self.total_bytes = event.total_bytes;
                }
                if let Some(downloaded) = event.downloaded_bytes {
                    // Stale events from retried fragments may report fewer
                    // bytes; downloaded_bytes never goes backwards.
                    self.downloaded_bytes = self.downloaded_bytes.max(downloaded);
                }
            }
            ProgressStatus::Finished => {
                self.phase = ProgressPhase::Finished;
                if let Some(total) = self.total_bytes {
                    self.downloaded_bytes = total;
                }
            }
        }
    }
}

/// Parse one line of yt-dlp output produced by our progress template:
/// `clipscribe|<status>|<downloaded_bytes>|<total_bytes>|<total_bytes_estimate>`
/// with `NA` standing in for unknown fields. Non-progress lines yield `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?.strip_prefix('|')?;
    let mut fields = rest.split('|');

    let status = match fields.next()? {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        _ => return None,
    };

    let downloaded_bytes = parse_bytes(fields.next()?);
    let total_bytes = parse_bytes(fields.next()?);
    // Fall back to yt-dlp's estimate when the exact total is unknown.
    let total_estimate = fields.next().and_then(parse_bytes);

    Some(ProgressEvent {
        status,
        downloaded_bytes,
        total_bytes: total_bytes.or(total_estimate),
    })
}

fn parse_bytes(field: &str) -> Option<u64> {
    // yt-dlp renders estimates as floats.
    field.trim().parse::<f64>().ok().map(|b| b as u64)
}

/// Turns raw progress events into a UI-safe progress bar.
///
/// The bar is created lazily on the first `downloading` event whose total is
/// known, its position never decreases, and it is forced to 100% and released
/// on `finished`. If the total is never known no bar appears at all and the
/// caller only sees phase transitions (degraded mode, not an error).
pub struct DownloadProgress {
    bar: Option<ProgressBar>,
    label: String,
    hidden: bool,
}

impl DownloadProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            bar: None,
            label: label.into(),
            hidden: false,
        }
    }

    /// A reporter that tracks positions without drawing, for tests.
    pub fn hidden(label: impl Into<String>) -> Self {
        Self {
            bar: None,
            label: label.into(),
            hidden: true,
        }
    }

    pub fn observe(&mut self, event: &ProgressEvent) {
        match event.status {
            ProgressStatus::Downloading => {
                if self.bar.is_none() {
                    if let Some(total) = event.total_bytes {
                        self.bar = Some(self.make_bar(total));
                    }
                }
                if let (Some(bar), Some(downloaded)) = (&self.bar, event.downloaded_bytes) {
                    bar.set_position(bar.position().max(downloaded));
                }
            }
            ProgressStatus::Finished => {
                if let Some(bar) = self.bar.take() {
                    bar.set_position(bar.length().unwrap_or(0));
                    bar.finish_with_message("Download complete");
                }
            }
        }
    }

    /// Tear the bar down without claiming completion.
    pub fn abandon(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon_with_message("Download failed");
        }
    }

    /// Current displayed byte position, if a bar was ever created.
    pub fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(|bar| bar.position())
    }

    fn make_bar(&self, total: u64) -> ProgressBar {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total)
        };
        bar.set_length(total);
        if !self.hidden {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                    )
                    .unwrap(),
            );
            bar.set_message(format!("Downloading {}", self.label));
        }
        bar
    }
}
