//! Drives the six-stage pipeline and owns its error/retry policy.
//!
//! Stage policy:
//! - join: fatal on failure
//! - capture: device loss ends the stage early; the run continues with
//!   whatever chunks exist (zero chunks is fatal: nothing to document)
//! - transcribe: per-chunk failures become gaps; total failure is fatal
//! - translate / summarize: always degrade, never fatal
//! - export: fatal
//!
//! Cleanup runs on every exit path exactly once: capture stopped with
//! buffers flushed, meeting session handle released.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audio::{AudioCaptureEngine, AudioChunk, CaptureState, DeviceSelector};
use crate::config::{Config, SummaryConfig};
use crate::error::StageError;
use crate::export::Exporter;
use crate::meet::MeetSession;
use crate::summarize::{summarize_or_fallback, SummaryProvider};
use crate::transcript::{ConsolidatedTranscript, TranscriptAssembler, TranscriptionResult};
use crate::transcription::TranscriptionProvider;
use crate::translate::TranscriptTranslator;

use super::{PipelineRun, Stage};

/// Validated configuration the orchestrator needs, extracted once at
/// construction time.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub device: DeviceSelector,
    pub transcript_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_duration: Option<Duration>,
    pub summary_retry: SummaryConfig,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        let device = match config.audio.device_index {
            Some(index) => DeviceSelector::Index(index),
            None => DeviceSelector::Default,
        };

        Self {
            device,
            transcript_dir: config.transcription.transcript_dir.clone(),
            poll_interval: Duration::from_secs(config.meeting.poll_interval_seconds),
            max_duration: config.limits.max_duration_seconds.map(Duration::from_secs),
            summary_retry: config.summary.clone(),
        }
    }
}

/// Final report of a pipeline run.
pub struct PipelineOutcome {
    pub run: PipelineRun,
    pub document_path: Option<PathBuf>,
    pub transcript_path: Option<PathBuf>,
    pub chunks_preserved: usize,
    pub error: Option<StageError>,
}

impl PipelineOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct PipelineOrchestrator {
    session: Option<Box<dyn MeetSession>>,
    capture: AudioCaptureEngine,
    transcription: Box<dyn TranscriptionProvider>,
    translator: TranscriptTranslator,
    summarizer: Box<dyn SummaryProvider>,
    exporter: Box<dyn Exporter>,
    settings: OrchestratorSettings,
    cancel: CancellationToken,
    run: PipelineRun,
    transcript_path: Option<PathBuf>,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Box<dyn MeetSession>,
        capture: AudioCaptureEngine,
        transcription: Box<dyn TranscriptionProvider>,
        translator: TranscriptTranslator,
        summarizer: Box<dyn SummaryProvider>,
        exporter: Box<dyn Exporter>,
        settings: OrchestratorSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session: Some(session),
            capture,
            transcription,
            translator,
            summarizer,
            exporter,
            settings,
            cancel,
            run: PipelineRun::new(),
            transcript_path: None,
        }
    }

    /// Execute the full pipeline. Cleanup is guaranteed on every exit path
    /// (success, stage failure, or user interrupt) and runs exactly once.
    pub async fn run(&mut self, meet_url: &str) -> PipelineOutcome {
        info!("Starting pipeline run for {}", meet_url);

        let result = self.run_stages(meet_url).await;
        self.finalize().await;

        let chunks_preserved = self.capture.list_chunks().len();

        match result {
            Ok(document_path) => {
                self.run.finish();
                info!("Pipeline completed successfully: {:?}", document_path);
                PipelineOutcome {
                    run: self.run.clone(),
                    document_path: Some(document_path),
                    transcript_path: self.transcript_path.clone(),
                    chunks_preserved,
                    error: None,
                }
            }
            Err(e) => {
                let stage = e.stage();
                self.run.fail(stage, e.to_string());
                error!("Pipeline failed during {} stage: {}", stage, e);
                if chunks_preserved > 0 {
                    info!(
                        "Partial artifacts preserved: {} audio chunks{}",
                        chunks_preserved,
                        if self.transcript_path.is_some() {
                            " and a transcript"
                        } else {
                            ""
                        }
                    );
                }
                PipelineOutcome {
                    run: self.run.clone(),
                    document_path: None,
                    transcript_path: self.transcript_path.clone(),
                    chunks_preserved,
                    error: Some(e),
                }
            }
        }
    }

    async fn run_stages(&mut self, meet_url: &str) -> Result<PathBuf, StageError> {
        // Stage 1: Join
        self.check_cancelled()?;
        info!("Stage 1: joining meeting");
        self.session
            .as_mut()
            .ok_or_else(|| StageError::Join("meeting session already released".to_string()))?
            .join(meet_url)
            .await
            .map_err(|e| StageError::Join(e.to_string()))?;

        // Stage 2: Capture
        self.run.advance(Stage::Capture);
        self.check_cancelled()?;
        info!("Stage 2: capturing audio");
        if let Err(e) = self.capture.start(self.settings.device) {
            // Stage ends early; whether the run can continue depends on
            // whether any chunks exist (below).
            error!("Audio capture failed to start: {}", e);
        }

        let interrupted = self.wait_for_capture_end().await;
        let chunks = self.capture.stop();
        info!("Capture finished: {} chunks", chunks.len());
        let failed_writes = self.capture.failed_sequences();
        if !failed_writes.is_empty() {
            warn!(
                "{} chunk writes failed and are missing from the transcript: {:?}",
                failed_writes.len(),
                failed_writes
            );
        }

        // The meeting is over for us either way; release the browser
        // session before the heavy processing stages.
        self.release_session().await;

        if interrupted {
            return Err(StageError::Interrupted { stage: "capture" });
        }

        if chunks.is_empty() {
            return Err(StageError::Capture(
                "no audio chunks were captured".to_string(),
            ));
        }

        // Stage 3: Transcribe
        self.run.advance(Stage::Transcribe);
        self.check_cancelled()?;
        let transcript = self.run_transcribe(&chunks).await?;
        let rendered = transcript.render();
        self.persist_transcript(&rendered)?;

        // Stage 4: Translate (degrades, never fatal)
        self.run.advance(Stage::Translate);
        self.check_cancelled()?;
        info!("Stage 4: translating transcript");
        let english = self.translator.process_transcript(&rendered).await;
        let translated_path = self
            .settings
            .transcript_dir
            .join("meeting_transcript_english.txt");
        if let Err(e) = std::fs::write(&translated_path, &english) {
            warn!("Failed to save translated transcript: {}", e);
        }

        // Stage 5: Summarize (degrades, never fatal)
        self.run.advance(Stage::Summarize);
        self.check_cancelled()?;
        info!("Stage 5: generating summary");
        let summary = summarize_or_fallback(
            self.summarizer.as_ref(),
            &english,
            &self.settings.summary_retry,
        )
        .await;

        // Stage 6: Export
        self.run.advance(Stage::Export);
        self.check_cancelled()?;
        info!("Stage 6: exporting document");
        let document_path = self
            .exporter
            .export(&summary)
            .map_err(|e| StageError::Export(e.to_string()))?;

        Ok(document_path)
    }

    /// Wait until the meeting ends, the duration limit is hit, the capture
    /// session errors out, or the user interrupts. Returns whether the exit
    /// was an interrupt.
    async fn wait_for_capture_end(&mut self) -> bool {
        let started = Instant::now();
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("User requested stop");
                    return true;
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {
                    match self.capture.state() {
                        CaptureState::Capturing => {}
                        CaptureState::Errored => {
                            warn!("Capture device failed permanently; continuing with captured chunks");
                            return false;
                        }
                        // start() failed or capture already ended.
                        _ => return false,
                    }

                    if let Some(max) = self.settings.max_duration {
                        if started.elapsed() >= max {
                            info!("Maximum recording duration reached");
                            return false;
                        }
                    }

                    let in_meeting = match self.session.as_mut() {
                        Some(session) => session.is_in_meeting().await,
                        None => false,
                    };
                    if !in_meeting {
                        info!("Meeting ended");
                        return false;
                    }
                }
            }
        }
    }

    async fn run_transcribe(
        &mut self,
        chunks: &[AudioChunk],
    ) -> Result<ConsolidatedTranscript, StageError> {
        if !self.transcription.is_available() {
            return Err(StageError::Transcription(self.transcription.remediation()));
        }

        info!("Stage 3: transcribing {} chunks", chunks.len());

        let mut results = Vec::with_capacity(chunks.len());
        let mut successes = 0usize;

        for chunk in chunks {
            match self.transcription.transcribe(&chunk.path).await {
                Ok(t) => {
                    successes += 1;
                    results.push(TranscriptionResult::success(
                        chunk.sequence,
                        t.text,
                        t.language,
                    ));
                }
                Err(e) => {
                    warn!("Failed to transcribe chunk {}: {}", chunk.sequence, e);
                    results.push(TranscriptionResult::failure(chunk.sequence));
                }
            }
        }

        if successes == 0 {
            return Err(StageError::Transcription(format!(
                "every chunk failed to transcribe with {}",
                self.transcription.name()
            )));
        }

        Ok(TranscriptAssembler::assemble(&results))
    }

    fn persist_transcript(&mut self, rendered: &str) -> Result<(), StageError> {
        std::fs::create_dir_all(&self.settings.transcript_dir)
            .map_err(|e| StageError::Transcription(e.to_string()))?;

        let path = self.settings.transcript_dir.join("meeting_transcript.txt");
        std::fs::write(&path, rendered).map_err(|e| StageError::Transcription(e.to_string()))?;

        info!("Transcript saved to {:?}", path);
        self.transcript_path = Some(path);
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), StageError> {
        if self.cancel.is_cancelled() {
            return Err(StageError::Interrupted {
                stage: self.run.stage.as_str(),
            });
        }
        Ok(())
    }

    /// Release held resources. Runs after every exit path; each resource is
    /// released at most once, and a failure in one step never skips the
    /// others.
    async fn finalize(&mut self) {
        info!("Cleaning up resources...");

        if matches!(
            self.capture.state(),
            CaptureState::Capturing | CaptureState::Stopping
        ) {
            info!("Stopping audio capture...");
            let _ = self.capture.stop();
        }

        self.release_session().await;

        info!("Cleanup complete");
    }

    async fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.leave().await {
                warn!("Error leaving meeting: {}", e);
            }
            if let Err(e) = session.close().await {
                warn!("Error closing meeting session: {}", e);
            }
        }
    }
}
