//! Merges unordered per-chunk transcription results into one
//! chronologically-ordered transcript.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{ConsolidatedTranscript, TranscriptEntry, TranscriptionResult};

/// Assembles chunk results into a [`ConsolidatedTranscript`].
///
/// Chunk processing may complete out of order under concurrent or retried
/// execution, so output order is a pure function of sequence number,
/// independent of arrival order. Failed or absent sequences inside the
/// dense range become marked gaps. Pure and idempotent: no I/O, and the
/// same input set always yields byte-identical output.
pub struct TranscriptAssembler;

impl TranscriptAssembler {
    pub fn assemble(results: &[TranscriptionResult]) -> ConsolidatedTranscript {
        if results.is_empty() {
            return ConsolidatedTranscript::new(Vec::new());
        }

        // BTreeMap keys give the sequence ordering for free. First result
        // per sequence wins; duplicates indicate a retried chunk and are
        // dropped.
        let mut by_sequence: BTreeMap<u64, &TranscriptionResult> = BTreeMap::new();
        for result in results {
            match by_sequence.entry(result.sequence) {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(result);
                }
                std::collections::btree_map::Entry::Occupied(_) => {
                    warn!(
                        "Duplicate transcription result for chunk {}, keeping the first",
                        result.sequence
                    );
                }
            }
        }

        // Chunk numbering starts at zero and is dense, so any sequence
        // absent below the maximum is a chunk that never produced a result.
        let max_sequence = *by_sequence.keys().next_back().unwrap();

        let mut entries = Vec::with_capacity(max_sequence as usize + 1);
        for sequence in 0..=max_sequence {
            let entry = match by_sequence.get(&sequence) {
                Some(result) if result.success => TranscriptEntry::Transcribed {
                    sequence,
                    text: result.text.clone(),
                    language: result.language.clone(),
                },
                _ => TranscriptEntry::Gap { sequence },
            };
            entries.push(entry);
        }

        debug!(
            "Assembled transcript: {} entries, {} gaps",
            entries.len(),
            entries.iter().filter(|e| e.is_gap()).count()
        );

        ConsolidatedTranscript::new(entries)
    }
}
