use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub meeting: MeetingConfig,
    pub audio: AudioConfig,
    pub capture: CaptureConfig,
    pub transcription: TranscriptionConfig,
    pub translation: TranslationConfig,
    pub summary: SummaryConfig,
    pub export: ExportConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingConfig {
    /// External browser-automation helper invoked to join/leave the meeting.
    /// Receives the meeting URL as its only argument.
    pub helper_command: String,
    /// How often the orchestrator polls meeting/capture status, in seconds.
    pub poll_interval_seconds: u64,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            helper_command: "meetdocs-join".to_string(),
            poll_interval_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device index; None selects the default device.
    pub device_index: Option<usize>,
    pub chunk_duration_seconds: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Directory where audio chunks are written.
    pub audio_dir: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_index: None,
            chunk_duration_seconds: 30,
            sample_rate: 44100,
            channels: 2,
            audio_dir: PathBuf::from("./audio"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_seconds: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_delay_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Path to the whisper CLI binary; None resolves from PATH.
    pub command_path: Option<String>,
    pub model: String,
    /// Language hint; None auto-detects per chunk.
    pub language: Option<String>,
    pub transcript_dir: PathBuf,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            command_path: None,
            model: "base".to_string(),
            language: None,
            transcript_dir: PathBuf::from("./transcripts"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Translation service endpoint; None disables remote translation and
    /// every segment passes through with a marker.
    pub endpoint: Option<String>,
    pub target_language: String,
    pub max_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            target_language: "en".to_string(),
            max_attempts: 3,
            retry_delay_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: String,
    pub max_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: None,
            model: "gemini-pro".to_string(),
            max_attempts: 3,
            retry_delay_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Hard cap on recording length, in seconds. None records until the
    /// meeting ends or the user interrupts.
    pub max_duration_seconds: Option<u64>,
}

const WHISPER_MODELS: &[&str] = &["tiny", "base", "small", "medium", "large"];

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => global::config_file()?,
        };

        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save(&config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Validate the configuration once at startup. Returns every problem
    /// found rather than stopping at the first.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.summary.api_key.trim().is_empty() {
            errors.push("summary.api_key is required".to_string());
        }

        if self.audio.chunk_duration_seconds == 0 {
            errors.push("audio.chunk_duration_seconds must be greater than zero".to_string());
        }

        if self.audio.sample_rate == 0 {
            errors.push("audio.sample_rate must be greater than zero".to_string());
        }

        if !(1..=2).contains(&self.audio.channels) {
            errors.push(format!(
                "audio.channels must be 1 (mono) or 2 (stereo), got {}",
                self.audio.channels
            ));
        }

        if !WHISPER_MODELS.contains(&self.transcription.model.as_str()) {
            errors.push(format!(
                "Invalid whisper model size '{}'. Supported: {}",
                self.transcription.model,
                WHISPER_MODELS.join(", ")
            ));
        }

        if self.meeting.helper_command.trim().is_empty() {
            errors.push("meeting.helper_command is required".to_string());
        }

        errors
    }

    /// Create every directory the pipeline writes into.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.audio.audio_dir,
            &self.transcription.transcript_dir,
            &self.export.output_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {:?}", dir))?;
        }
        Ok(())
    }
}
