//! Translation collaborator boundary.
//!
//! Translation never fails the run: segments that cannot be translated
//! pass through in their original language with an explicit marker.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TranslationConfig;

/// Marker prefixed to segments that could not be translated.
pub const PASS_THROUGH_MARKER: &str = "[translation unavailable]";

/// A translation backend for one text segment at a time.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct TranslatePayload<'a> {
    q: &'a str,
    target: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// HTTP translation client (LibreTranslate-compatible endpoint).
pub struct HttpTranslationProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranslationProvider {
    pub fn new(endpoint: String) -> Self {
        info!("Initialized translation provider with endpoint: {}", endpoint);
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    fn name(&self) -> &'static str {
        "http-translate"
    }

    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let body = TranslatePayload {
            q: text,
            target: target_language,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("Translation request failed")?;

        if !response.status().is_success() {
            bail!("Translation service returned {}", response.status());
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .context("Failed to parse translation response")?;

        Ok(parsed.translated_text)
    }
}

/// Translates a transcript segment by segment with bounded retry, degrading
/// to marked pass-through on exhaustion.
pub struct TranscriptTranslator {
    provider: Option<Box<dyn TranslationProvider>>,
    target_language: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl TranscriptTranslator {
    pub fn new(provider: Option<Box<dyn TranslationProvider>>, config: &TranslationConfig) -> Self {
        Self {
            provider,
            target_language: config.target_language.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
        }
    }

    /// Translate a full transcript line by line. Never fails: untranslatable
    /// lines keep their original text behind [`PASS_THROUGH_MARKER`].
    pub async fn process_transcript(&self, transcript: &str) -> String {
        if transcript.trim().is_empty() {
            warn!("Empty transcript provided for translation");
            return transcript.to_string();
        }

        let segments: Vec<&str> = transcript
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        info!("Translating transcript: {} segments", segments.len());

        let mut translated = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            debug!("Translating segment {}/{}", index + 1, segments.len());
            translated.push(self.translate_segment(segment).await);
        }

        translated.join("\n")
    }

    async fn translate_segment(&self, segment: &str) -> String {
        let Some(provider) = &self.provider else {
            return format!("{PASS_THROUGH_MARKER} {segment}");
        };

        for attempt in 1..=self.max_attempts {
            match provider.translate(segment, &self.target_language).await {
                Ok(text) => return text,
                Err(e) => {
                    warn!(
                        "Translation attempt {}/{} failed: {}",
                        attempt, self.max_attempts, e
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        warn!("Translation exhausted retries, passing original text through");
        format!("{PASS_THROUGH_MARKER} {segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedProvider;

    #[async_trait]
    impl TranslationProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn translate(&self, text: &str, _target: &str) -> Result<String> {
            Ok(format!("EN:{text}"))
        }
    }

    struct FailingProvider {
        calls: std::sync::Arc<AtomicU32>,
    }

    #[async_trait]
    impl TranslationProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn translate(&self, _text: &str, _target: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            bail!("service unreachable")
        }
    }

    fn fast_config() -> TranslationConfig {
        TranslationConfig {
            endpoint: None,
            target_language: "en".to_string(),
            max_attempts: 3,
            retry_delay_seconds: 0,
        }
    }

    #[tokio::test]
    async fn test_segments_translated_line_by_line() {
        let translator = TranscriptTranslator::new(Some(Box::new(FixedProvider)), &fast_config());
        let result = translator.process_transcript("hello\n\nworld").await;
        assert_eq!(result, "EN:hello\nEN:world");
    }

    #[tokio::test]
    async fn test_failure_degrades_to_marked_pass_through() {
        let provider = FailingProvider {
            calls: Default::default(),
        };
        let translator = TranscriptTranslator::new(Some(Box::new(provider)), &fast_config());

        let result = translator.process_transcript("namaste").await;
        assert_eq!(result, format!("{PASS_THROUGH_MARKER} namaste"));
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let calls = std::sync::Arc::new(AtomicU32::new(0));
        let translator = TranscriptTranslator::new(
            Some(Box::new(FailingProvider {
                calls: std::sync::Arc::clone(&calls),
            })),
            &fast_config(),
        );

        // One segment, exactly max_attempts calls, then degrade.
        let result = translator.process_transcript("text").await;
        assert!(result.starts_with(PASS_THROUGH_MARKER));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_provider_passes_everything_through() {
        let translator = TranscriptTranslator::new(None, &fast_config());
        let result = translator.process_transcript("line one\nline two").await;
        assert_eq!(
            result,
            format!("{PASS_THROUGH_MARKER} line one\n{PASS_THROUGH_MARKER} line two")
        );
    }

    #[tokio::test]
    async fn test_empty_transcript_returned_unchanged() {
        let translator = TranscriptTranslator::new(Some(Box::new(FixedProvider)), &fast_config());
        assert_eq!(translator.process_transcript("  \n ").await, "  \n ");
    }
}
