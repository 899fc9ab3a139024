//! Transcript data model: per-chunk transcription results and the
//! consolidated, chronologically-ordered document built from them.

pub mod assembler;

pub use assembler::TranscriptAssembler;

use serde::{Deserialize, Serialize};

/// Outcome of transcribing one audio chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub sequence: u64,
    pub text: String,
    pub language: String,
    pub success: bool,
}

impl TranscriptionResult {
    pub fn success(sequence: u64, text: String, language: String) -> Self {
        Self {
            sequence,
            text,
            language,
            success: true,
        }
    }

    /// A per-chunk failure. Tolerated: it becomes a marked gap in the
    /// consolidated transcript, never a dropped position.
    pub fn failure(sequence: u64) -> Self {
        Self {
            sequence,
            text: String::new(),
            language: String::new(),
            success: false,
        }
    }
}

/// One position in the consolidated transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Transcribed {
        sequence: u64,
        text: String,
        language: String,
    },
    /// The chunk at this position failed to transcribe or never produced a
    /// result. Kept so downstream consumers can see the document is
    /// incomplete rather than silently truncated.
    Gap { sequence: u64 },
}

impl TranscriptEntry {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Transcribed { sequence, .. } => *sequence,
            Self::Gap { sequence } => *sequence,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Gap { .. })
    }
}

/// The single ordered document assembled from all chunk-level results.
///
/// Append-only during assembly, read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedTranscript {
    entries: Vec<TranscriptEntry>,
}

impl ConsolidatedTranscript {
    pub(crate) fn new(entries: Vec<TranscriptEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn gap_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_gap()).count()
    }

    /// Render the transcript as chunk-tagged text. Deterministic: the same
    /// transcript always renders to byte-identical output.
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry {
                TranscriptEntry::Transcribed {
                    sequence,
                    text,
                    language,
                } => {
                    lines.push(format!("[Chunk {:03}] [{}]\n{}\n", sequence, language, text));
                }
                TranscriptEntry::Gap { sequence } => {
                    lines.push(format!(
                        "[Chunk {:03}] [transcription unavailable]\n",
                        sequence
                    ));
                }
            }
        }
        lines.join("\n")
    }
}
