//! Speech-to-text collaborator boundary.
//!
//! The pipeline hands each chunk file to a provider independently and
//! reassembles the results afterward; providers know nothing about chunk
//! ordering.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub mod whisper_cli;

pub use whisper_cli::WhisperCliProvider;

/// Text produced for a single audio chunk.
#[derive(Debug, Clone)]
pub struct ChunkTranscription {
    pub text: String,
    pub language: String,
}

/// A speech-to-text backend transcribing one WAV file at a time.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend can run at all (binary present, model loadable).
    /// A provider that is not available makes the transcribe stage fatal.
    fn is_available(&self) -> bool;

    /// Remediation instructions shown when the provider is unavailable.
    fn remediation(&self) -> String;

    async fn transcribe(&self, audio_path: &Path) -> Result<ChunkTranscription>;
}
