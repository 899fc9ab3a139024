//! Serializes sample buffers into sequentially-named WAV chunk files.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::PathBuf;
use tracing::info;

use crate::error::CaptureError;

use super::chunk::{chunk_filename, AudioChunk};

/// Writes one WAV file per call into a fixed chunk directory.
///
/// Pure and synchronous: no shared state, no retries. A write failure is
/// surfaced as [`CaptureError::Write`]; whether that is fatal is the
/// caller's decision.
pub struct ChunkWriter {
    dir: PathBuf,
}

impl ChunkWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Persist `samples` (interleaved f32 PCM) as the chunk for `sequence`.
    ///
    /// Creates the destination directory if absent. Accepts an empty buffer
    /// and produces a valid zero-length WAV for it.
    pub fn write(
        &self,
        samples: &[f32],
        sequence: u64,
        sample_rate: u32,
        channels: u16,
        is_partial: bool,
    ) -> Result<AudioChunk, CaptureError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CaptureError::write(sequence, e.to_string()))?;

        let path = self.dir.join(chunk_filename(sequence));

        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let mut writer = WavWriter::create(&path, spec)
            .map_err(|e| CaptureError::write(sequence, e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| CaptureError::write(sequence, e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::write(sequence, e.to_string()))?;

        let duration_seconds = samples.len() as f64 / (sample_rate as f64 * channels as f64);

        info!(
            "Saved audio chunk {}: {:?} ({:.2}s{})",
            sequence,
            path.file_name().unwrap_or_default(),
            duration_seconds,
            if is_partial { ", partial" } else { "" }
        );

        Ok(AudioChunk {
            sequence,
            path,
            duration_seconds,
            sample_rate,
            channels,
            is_partial,
        })
    }
}
