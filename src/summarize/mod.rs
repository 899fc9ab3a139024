//! Summarization collaborator boundary.
//!
//! Produces the structured meeting summary, or a fallback wrapping the raw
//! transcript when the service is unreachable. Never fails the run.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SummaryConfig;

/// Structured meeting summary with the sections the exporter renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MeetingSummary {
    pub title: String,
    pub participants: Vec<String>,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub decisions: Vec<String>,
    pub follow_ups: Vec<String>,
}

impl Default for MeetingSummary {
    fn default() -> Self {
        Self {
            title: "Meeting Summary".to_string(),
            participants: Vec::new(),
            key_points: Vec::new(),
            action_items: Vec::new(),
            decisions: Vec::new(),
            follow_ups: Vec::new(),
        }
    }
}

impl MeetingSummary {
    /// Minimal summary used when the service is unavailable: points the
    /// reader at the raw transcript instead of losing the run's work.
    pub fn fallback(transcript: &str) -> Self {
        info!("Generating fallback summary");

        Self {
            title: "Meeting Summary (Auto-generated)".to_string(),
            participants: extract_participant_names(transcript),
            key_points: vec![
                "AI summarization was unavailable".to_string(),
                "Please review the transcript manually".to_string(),
            ],
            action_items: vec!["Review transcript and extract action items manually".to_string()],
            decisions: vec!["Review transcript and extract decisions manually".to_string()],
            follow_ups: vec!["Review transcript and identify follow-up tasks".to_string()],
        }
    }
}

/// Pull likely participant names out of the transcript: capitalized names
/// directly followed by a speech verb. Rough, but good enough for the
/// fallback document.
fn extract_participant_names(transcript: &str) -> Vec<String> {
    let Ok(pattern) = Regex::new(
        r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\s+(?:said|mentioned|asked|stated|replied|responded)",
    ) else {
        return Vec::new();
    };

    const STOP_WORDS: &[&str] = &[
        "The", "This", "That", "These", "Those", "What", "When", "Where", "Why", "How", "Who",
        "Which", "There", "Here",
    ];

    let mut names: Vec<String> = Vec::new();
    for caps in pattern.captures_iter(transcript) {
        let name = caps[1].to_string();
        if !STOP_WORDS.contains(&name.as_str()) && !names.contains(&name) {
            names.push(name);
        }
    }

    names.truncate(10);
    names
}

/// A summarization backend turning a transcript into a [`MeetingSummary`].
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(&self, transcript: &str) -> Result<MeetingSummary>;
}

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini-backed summary provider.
pub struct GeminiSummaryProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GeminiSummaryProvider {
    pub fn new(config: &SummaryConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            bail!("Summary API key cannot be empty");
        }

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        info!("Initialized summarizer: model {}", config.model);

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            endpoint,
            model: config.model.clone(),
        })
    }

    fn build_prompt(transcript: &str) -> String {
        format!(
            "Analyze the following meeting transcript and provide a structured summary.\n\n\
             TRANSCRIPT:\n{transcript}\n\n\
             Provide:\n\
             1. Meeting Title: inferred from the discussion topics\n\
             2. Participants: names mentioned in the transcript\n\
             3. Key Discussion Points: main topics and themes\n\
             4. Action Items: tasks with responsible parties if mentioned\n\
             5. Decisions Taken: key decisions made\n\
             6. Follow-up Tasks: next steps needed\n\n\
             Format the response as JSON:\n\
             {{\n\
             \t\"title\": \"Meeting title here\",\n\
             \t\"participants\": [\"Name 1\"],\n\
             \t\"key_points\": [\"Point 1\"],\n\
             \t\"action_items\": [\"Action 1\"],\n\
             \t\"decisions\": [\"Decision 1\"],\n\
             \t\"follow_ups\": [\"Follow-up 1\"]\n\
             }}\n\n\
             Use empty lists for sections with no information. Ensure the JSON is valid."
        )
    }

    /// Models often wrap JSON in markdown code fences; strip them.
    fn strip_code_fences(text: &str) -> &str {
        let trimmed = text.trim();
        let Some(inner) = trimmed.strip_prefix("```") else {
            return trimmed;
        };
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        inner.strip_suffix("```").unwrap_or(inner).trim()
    }

    fn parse_response(text: &str) -> Result<MeetingSummary> {
        let json_text = Self::strip_code_fences(text);
        let summary: MeetingSummary =
            serde_json::from_str(json_text).context("Summary response was not valid JSON")?;
        Ok(summary)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

#[async_trait]
impl SummaryProvider for GeminiSummaryProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn summarize(&self, transcript: &str) -> Result<MeetingSummary> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );

        let body = json!({
            "contents": [{
                "parts": [{ "text": Self::build_prompt(transcript) }]
            }]
        });

        debug!("Requesting summary from {}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Summary request failed")?;

        if !response.status().is_success() {
            bail!("Summary service returned {}", response.status());
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse summary service response")?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .context("Summary response contained no candidates")?;

        Self::parse_response(text)
    }
}

/// Summarize with bounded retry and fixed backoff, degrading to the
/// fallback summary on exhaustion. Never fails.
pub async fn summarize_or_fallback(
    provider: &dyn SummaryProvider,
    transcript: &str,
    config: &SummaryConfig,
) -> MeetingSummary {
    if transcript.trim().is_empty() {
        warn!("Empty transcript provided for summarization");
        return MeetingSummary::fallback(transcript);
    }

    let max_attempts = config.max_attempts.max(1);
    let retry_delay = Duration::from_secs(config.retry_delay_seconds);

    for attempt in 1..=max_attempts {
        match provider.summarize(transcript).await {
            Ok(summary) => {
                info!("Meeting summary generated by {}", provider.name());
                return summary;
            }
            Err(e) => {
                warn!(
                    "Summary attempt {}/{} failed: {}",
                    attempt, max_attempts, e
                );
                if attempt < max_attempts {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    warn!("Summarization exhausted retries, falling back to raw transcript");
    MeetingSummary::fallback(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_parse_plain_json_response() {
        let text = r#"{"title": "Standup", "participants": ["Asha"], "key_points": ["Release"],
                       "action_items": [], "decisions": [], "follow_ups": []}"#;
        let summary = GeminiSummaryProvider::parse_response(text).unwrap();
        assert_eq!(summary.title, "Standup");
        assert_eq!(summary.participants, vec!["Asha"]);
    }

    #[test]
    fn test_parse_fenced_json_response() {
        let text = "```json\n{\"title\": \"Planning\"}\n```";
        let summary = GeminiSummaryProvider::parse_response(text).unwrap();
        assert_eq!(summary.title, "Planning");
        // Missing sections default to empty lists.
        assert!(summary.key_points.is_empty());
    }

    #[test]
    fn test_parse_invalid_json_fails() {
        assert!(GeminiSummaryProvider::parse_response("not json at all").is_err());
    }

    #[test]
    fn test_fallback_wraps_transcript_guidance() {
        let summary = MeetingSummary::fallback("Asha said we ship Friday.");
        assert!(summary.title.contains("Auto-generated"));
        assert_eq!(summary.participants, vec!["Asha"]);
        assert!(!summary.action_items.is_empty());
    }

    #[test]
    fn test_participant_extraction_filters_stop_words() {
        let names =
            extract_participant_names("This said nothing. Ravi mentioned the deadline. Ravi said more.");
        assert_eq!(names, vec!["Ravi"]);
    }

    struct FlakyProvider {
        calls: Arc<AtomicU32>,
        succeed_on: u32,
    }

    #[async_trait]
    impl SummaryProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn summarize(&self, _transcript: &str) -> Result<MeetingSummary> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(MeetingSummary {
                    title: "Real Summary".to_string(),
                    ..Default::default()
                })
            } else {
                bail!("transient failure")
            }
        }
    }

    fn fast_config() -> SummaryConfig {
        SummaryConfig {
            api_key: "key".to_string(),
            endpoint: None,
            model: "gemini-pro".to_string(),
            max_attempts: 3,
            retry_delay_seconds: 0,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let provider = FlakyProvider {
            calls: Arc::new(AtomicU32::new(0)),
            succeed_on: 2,
        };
        let summary = summarize_or_fallback(&provider, "transcript", &fast_config()).await;
        assert_eq!(summary.title, "Real Summary");
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_fallback() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = FlakyProvider {
            calls: Arc::clone(&calls),
            succeed_on: u32::MAX,
        };
        let summary = summarize_or_fallback(&provider, "transcript", &fast_config()).await;
        assert!(summary.title.contains("Auto-generated"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_transcript_skips_service() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = FlakyProvider {
            calls: Arc::clone(&calls),
            succeed_on: 1,
        };
        let summary = summarize_or_fallback(&provider, "   ", &fast_config()).await;
        assert!(summary.title.contains("Auto-generated"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let mut config = fast_config();
        config.api_key = "  ".to_string();
        assert!(GeminiSummaryProvider::new(&config).is_err());
    }
}
