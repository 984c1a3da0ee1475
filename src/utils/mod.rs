use anyhow::Result;
use chrono::NaiveDateTime;
use std::path::Path;
use url::Url;

/// Validate a URL and return normalized version
pub fn validate_and_normalize_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed.to_string())
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize a media title for safe filesystem usage. Everything outside
/// `[alnum._-]` becomes an underscore.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build the artifact filename for a title: sanitized title, an underscore,
/// a `YYYYMMDD-HHMMSS` timestamp, then a short random suffix.
///
/// Timestamps have second resolution, so two jobs finishing within the same
/// second would otherwise collide on equal titles; the suffix disambiguates.
pub fn timestamped_filename(title: &str, now: NaiveDateTime, extension: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}-{}.{}",
        sanitize_title(title),
        now.format("%Y%m%d-%H%M%S"),
        &id[..6],
        extension
    )
}

/// Check if a file exists and is readable
pub fn check_file_accessible(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("Path is not a file: {}", path.display());
    }

    fs_err::metadata(path)
        .map_err(|e| anyhow::anyhow!("Cannot access file {}: {}", path.display(), e))?;

    Ok(())
}

/// Check if the current environment has required tools
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available("yt-dlp").await {
        missing.push("yt-dlp - required for media extraction".to_string());
    }

    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required for audio segmentation and decoding".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
