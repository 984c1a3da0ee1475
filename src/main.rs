use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipscribe::cli::{Cli, Commands};
use clipscribe::config::Config;
use clipscribe::engine::{SpeechEngine, WhisperEngine};
use clipscribe::pipeline::{Job, Pipeline};
use clipscribe::{fetch::Mode, output, platform, utils, ScribeError};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "clipscribe=debug"
    } else {
        "clipscribe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Download {
            url,
            file,
            mode,
            cookies,
        } => {
            warn_missing_dependencies().await;
            let config = Config::load().await?;
            let urls = gather_urls(url, file)?;
            let pipeline = Pipeline::new(&config);
            let cookies = cookies.or_else(|| config.network.cookie_file.clone());
            if let Some(cookie_file) = &cookies {
                utils::check_file_accessible(cookie_file)?;
            }

            let started = std::time::Instant::now();
            let mut failed = 0usize;
            for url in &urls {
                println!("{} Processing {}", style("▶").cyan().bold(), url);
                let outcome = match make_job(url, mode, false, &config, cookies.clone(), false, None)
                {
                    Ok(job) => match pipeline.download(&job).await {
                        Ok(artifact) => {
                            output::print_artifact(&artifact);
                            Ok(())
                        }
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e),
                };
                if let Err(e) = outcome {
                    eprintln!("{} {}", style("✗").red().bold(), e);
                    failed += 1;
                }
            }
            finish_batch(failed, urls.len(), started)
        }
        Commands::Transcribe {
            url,
            file,
            model,
            keep_audio,
            segment_minutes,
            cookies,
        } => {
            warn_missing_dependencies().await;
            let config = Config::load().await?;
            let urls = gather_urls(url, file)?;
            let pipeline = Pipeline::new(&config);
            let cookies = cookies.or_else(|| config.network.cookie_file.clone());
            if let Some(cookie_file) = &cookies {
                utils::check_file_accessible(cookie_file)?;
            }

            let model_size = model.unwrap_or(config.transcription.default_model);
            let keep_audio = keep_audio || config.transcription.keep_audio;
            let segment_minutes = segment_minutes.unwrap_or(config.transcription.segment_minutes);

            // One engine per model size per process; every job in the batch
            // reuses this handle, one chunk at a time.
            let mut engine = WhisperEngine::acquire(model_size, &config.models_dir()).await?;
            tracing::info!("Whisper model '{}' ready", engine.model_size());

            let started = std::time::Instant::now();
            let mut failed = 0usize;
            for url in &urls {
                println!("{} Processing {}", style("▶").cyan().bold(), url);
                let outcome = match make_job(
                    url,
                    Mode::Audio,
                    true,
                    &config,
                    cookies.clone(),
                    keep_audio,
                    Some(segment_minutes),
                ) {
                    Ok(mut job) => {
                        job.model_size = model_size;
                        match pipeline.transcribe(&job, &mut engine).await {
                            Ok(result) => {
                                output::print_transcript_summary(
                                    &result,
                                    result.audio_path.as_deref(),
                                );
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    }
                    Err(e) => Err(e),
                };
                if let Err(e) = outcome {
                    eprintln!("{} {}", style("✗").red().bold(), e);
                    failed += 1;
                }
            }
            finish_batch(failed, urls.len(), started)
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            for tag in platform::supported() {
                println!("  • {}", tag.name());
            }
            Ok(())
        }
        Commands::Config { show } => {
            if show {
                Config::load().await?.display();
            } else {
                Config::print_location()?;
            }
            Ok(())
        }
    }
}

/// Collect the batch input: either the single positional URL or one URL per
/// non-empty line of `--file`.
fn gather_urls(url: Option<String>, file: Option<PathBuf>) -> Result<Vec<String>> {
    if let Some(path) = file {
        let content = fs_err::read_to_string(&path)?;
        let urls: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        if urls.is_empty() {
            anyhow::bail!("no URLs found in {}", path.display());
        }
        Ok(urls)
    } else if let Some(url) = url {
        Ok(vec![url])
    } else {
        anyhow::bail!("provide a URL or use --file for a list of URLs");
    }
}

fn make_job(
    url: &str,
    mode: Mode,
    transcribe: bool,
    config: &Config,
    credential_file: Option<PathBuf>,
    keep_audio: bool,
    segment_minutes: Option<u64>,
) -> std::result::Result<Job, ScribeError> {
    let url = utils::validate_and_normalize_url(url)
        .map_err(|_| ScribeError::UnresolvedUrl(url.to_string()))?;
    let platform =
        platform::resolve(&url).ok_or_else(|| ScribeError::UnresolvedUrl(url.clone()))?;

    Ok(Job {
        source_url: url,
        platform,
        mode,
        transcribe,
        model_size: config.transcription.default_model,
        keep_audio,
        credential_file,
        segment_length: Duration::from_secs(segment_minutes.unwrap_or(30) * 60),
    })
}

fn finish_batch(failed: usize, total: usize, started: std::time::Instant) -> Result<()> {
    let elapsed = utils::format_duration(started.elapsed().as_secs_f64());
    if failed > 0 {
        anyhow::bail!("{} of {} job(s) failed after {}", failed, total, elapsed);
    }
    println!(
        "{} {} job(s) completed in {}",
        style("✓").green().bold(),
        total,
        elapsed
    );
    Ok(())
}

async fn warn_missing_dependencies() {
    let missing = utils::check_dependencies().await;
    if !missing.is_empty() {
        eprintln!("{} Dependency check warnings:", style("⚠").yellow().bold());
        for dep in missing {
            eprintln!("   • {}", dep);
        }
    }
}
