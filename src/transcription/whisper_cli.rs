//! Transcription via a local whisper CLI binary.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

use crate::config::TranscriptionConfig;

use super::{ChunkTranscription, TranscriptionProvider};

const DEFAULT_COMMAND: &str = "whisper";

/// Runs the `whisper` command-line tool against one chunk file at a time.
pub struct WhisperCliProvider {
    command: String,
    model: String,
    language: Option<String>,
    timestamp_regex: Regex,
    language_regex: Regex,
}

impl WhisperCliProvider {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        let command = config
            .command_path
            .clone()
            .unwrap_or_else(|| DEFAULT_COMMAND.to_string());

        // Matches timestamps like [00:00:00.000 --> 00:00:03.280]
        let timestamp_regex =
            Regex::new(r"\[\d{2}:\d{2}(?::\d{2})?[:.]\d{3}\s*-->\s*\d{2}:\d{2}(?::\d{2})?[:.]\d{3}\]\s*")?;

        // whisper reports e.g. "Detected language: Hindi" or "detected language: hi"
        let language_regex = Regex::new(r"(?i)detected language:\s*(\w+)")?;

        Ok(Self {
            command,
            model: config.model.clone(),
            language: config.language.clone(),
            timestamp_regex,
            language_regex,
        })
    }

    /// Strip timestamp prefixes and collapse the CLI's line-per-segment
    /// output into one block of text.
    fn normalize(&self, raw_output: &str) -> String {
        let mut cleaned = String::new();

        for line in raw_output.lines() {
            let line_cleaned = self.timestamp_regex.replace_all(line, "");
            let line_trimmed = line_cleaned.trim();

            if !line_trimmed.is_empty() {
                if !cleaned.is_empty() {
                    cleaned.push(' ');
                }
                cleaned.push_str(line_trimmed);
            }
        }

        cleaned.trim().to_string()
    }

    fn detect_language(&self, stderr: &str) -> String {
        if let Some(caps) = self.language_regex.captures(stderr) {
            return caps[1].to_lowercase();
        }
        self.language.clone().unwrap_or_else(|| "unknown".to_string())
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperCliProvider {
    fn name(&self) -> &'static str {
        "whisper-cli"
    }

    fn is_available(&self) -> bool {
        which::which(&self.command).is_ok()
    }

    fn remediation(&self) -> String {
        format!(
            "The '{}' binary was not found on PATH. Install whisper \
             (pip install openai-whisper) or set transcription.command_path \
             in the config to the binary's location.",
            self.command
        )
    }

    async fn transcribe(&self, audio_path: &Path) -> Result<ChunkTranscription> {
        if !audio_path.exists() {
            bail!("Audio file not found: {:?}", audio_path);
        }

        info!(
            "Transcribing {:?} with model {}",
            audio_path.file_name().unwrap_or_default(),
            self.model
        );

        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--task")
            .arg("transcribe")
            .arg("--output_format")
            .arg("txt")
            .arg("--output_dir")
            .arg(audio_path.parent().unwrap_or_else(|| Path::new(".")));
        if let Some(language) = &self.language {
            cmd.arg("--language").arg(language);
        }

        let output = cmd
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.command))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let text = self.normalize(&stdout);
        let language = self.detect_language(&stderr);

        debug!(
            "Transcribed {:?}: {} chars, language {}",
            audio_path.file_name().unwrap_or_default(),
            text.len(),
            language
        );

        Ok(ChunkTranscription { text, language })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> WhisperCliProvider {
        WhisperCliProvider::new(&TranscriptionConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_strips_timestamps() {
        let input = "[00:00:00.000 --> 00:00:03.280] This is me talking\n\
                     [00:00:03.280 --> 00:00:05.000] And more text";
        assert_eq!(provider().normalize(input), "This is me talking And more text");
    }

    #[test]
    fn test_normalize_keeps_plain_lines() {
        let input = "hello\n\nworld";
        assert_eq!(provider().normalize(input), "hello world");
    }

    #[test]
    fn test_detect_language_from_stderr() {
        let p = provider();
        assert_eq!(p.detect_language("Detected language: Hindi"), "hindi");
        assert_eq!(p.detect_language("detected language: en"), "en");
    }

    #[test]
    fn test_detect_language_falls_back_to_config() {
        let mut config = TranscriptionConfig::default();
        config.language = Some("mr".to_string());
        let p = WhisperCliProvider::new(&config).unwrap();
        assert_eq!(p.detect_language("no language line here"), "mr");
    }

    #[test]
    fn test_detect_language_unknown_without_hint() {
        assert_eq!(provider().detect_language(""), "unknown");
    }

    #[tokio::test]
    async fn test_transcribe_missing_file_fails() {
        let err = provider()
            .transcribe(Path::new("/nonexistent/chunk.wav"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_remediation_names_command() {
        let remediation = provider().remediation();
        assert!(remediation.contains("whisper"));
        assert!(remediation.contains("command_path"));
    }
}
