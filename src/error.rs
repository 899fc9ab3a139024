//! Error types for the meetdocs pipeline.

use thiserror::Error;

/// Errors raised by the audio capture subsystem.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The capture device could not be opened, or a stream read failed.
    /// Recoverable via bounded reconnection inside the capture loop.
    #[error("Audio device unavailable: {message}")]
    Device { message: String },

    /// A chunk could not be persisted. Surfaced, never retried internally.
    #[error("Failed to write audio chunk {sequence}: {message}")]
    Write { sequence: u64, message: String },
}

impl CaptureError {
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    pub fn write(sequence: u64, message: impl Into<String>) -> Self {
        Self::Write {
            sequence,
            message: message.into(),
        }
    }
}

/// Fatal pipeline failures, attributed to the stage they occurred in.
///
/// Degradable failures (translation, summarization) and single-chunk
/// transcription failures never become a `StageError`; they are handled
/// where they occur. Everything here aborts the run.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to join meeting: {0}")]
    Join(String),

    #[error("Audio capture failed: {0}")]
    Capture(String),

    #[error("Transcription unavailable: {0}")]
    Transcription(String),

    #[error("Failed to export summary document: {0}")]
    Export(String),

    #[error("Run interrupted by user during {stage} stage")]
    Interrupted { stage: &'static str },
}

impl StageError {
    /// Name of the stage this failure is attributed to.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Capture(_) => "capture",
            Self::Transcription(_) => "transcribe",
            Self::Export(_) => "export",
            Self::Interrupted { stage } => stage,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}
