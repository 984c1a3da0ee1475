use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::ModelSize;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Output locations
    pub output: OutputConfig,

    /// Transcription defaults
    pub transcription: TranscriptionConfig,

    /// Network/transport settings
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for video/, audio/, and transcribe/ outputs
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Model size used when the CLI does not specify one
    pub default_model: ModelSize,

    /// Segment length for long-audio splitting, in minutes
    pub segment_minutes: u64,

    /// Keep intermediate audio files after transcription
    pub keep_audio: bool,

    /// Directory holding downloaded model weights; defaults to the user
    /// cache directory when unset
    pub models_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Cookie file handed through to the extraction tool
    pub cookie_file: Option<PathBuf>,

    /// Disable TLS certificate verification in the extraction tool.
    /// Off unless deliberately switched on.
    pub insecure_transport: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            default_model: ModelSize::Base,
            segment_minutes: 30,
            keep_audio: false,
            models_dir: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cookie_file: None,
            insecure_transport: false,
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("clipscribe").join("config.yaml"))
    }

    /// Where model weights live on disk.
    pub fn models_dir(&self) -> PathBuf {
        self.transcription
            .models_dir
            .clone()
            .unwrap_or_else(|| {
                dirs::cache_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("clipscribe")
                    .join("models")
            })
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.transcription.segment_minutes == 0 {
            anyhow::bail!("segment_minutes must be at least 1");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Output Root: {}", self.output.root.display());
        println!("  Default Model: {}", self.transcription.default_model);
        println!("  Segment Length: {} min", self.transcription.segment_minutes);
        println!("  Keep Audio: {}", self.transcription.keep_audio);
        println!("  Models Dir: {}", self.models_dir().display());
        if let Some(cookie_file) = &self.network.cookie_file {
            println!("  Cookie File: {}", cookie_file.display());
        }
        println!("  Insecure Transport: {}", self.network.insecure_transport);
    }

    /// Point the user at the config file for manual edits.
    pub fn print_location() -> Result<()> {
        println!("Configuration file:");
        println!("  {}", Self::config_path()?.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transcription.segment_minutes, 30);
        assert!(!config.network.insecure_transport);
    }

    #[test]
    fn test_zero_segment_minutes_rejected() {
        let mut config = Config::default();
        config.transcription.segment_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let mut config = Config::default();
        config.transcription.default_model = ModelSize::Small;
        config.network.insecure_transport = true;

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.transcription.default_model, ModelSize::Small);
        assert!(parsed.network.insecure_transport);
    }
}
