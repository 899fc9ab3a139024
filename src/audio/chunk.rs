//! Audio chunk records produced by the capture engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One persisted segment of captured audio.
///
/// Immutable once written. The filename, not write order, is the source of
/// truth for chronology: sequence numbers are zero-padded so lexicographic
/// order equals numeric order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    pub sequence: u64,
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub is_partial: bool,
}

/// Filename for a chunk: `audio_chunk_0000.wav`, `audio_chunk_0001.wav`, ...
pub fn chunk_filename(sequence: u64) -> String {
    format!("audio_chunk_{:04}.wav", sequence)
}
