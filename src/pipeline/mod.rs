//! Pipeline run state machine.

pub mod orchestrator;

pub use orchestrator::{OrchestratorSettings, PipelineOrchestrator, PipelineOutcome};

use serde::{Deserialize, Serialize};

/// The six sequential stages of a run, plus the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Join,
    Capture,
    Transcribe,
    Translate,
    Summarize,
    Export,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Capture => "capture",
            Self::Transcribe => "transcribe",
            Self::Translate => "translate",
            Self::Summarize => "summarize",
            Self::Export => "export",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Record of one pipeline run. Owned by the orchestrator; transitions
/// strictly forward through the stage order, with Failed terminal from any
/// stage.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub stage: Stage,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed: Vec<Stage>,
    pub failed_stage: Option<&'static str>,
    pub failure: Option<String>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            stage: Stage::Join,
            started_at: chrono::Utc::now(),
            completed: Vec::new(),
            failed_stage: None,
            failure: None,
        }
    }

    /// Move to the next stage, recording the current one as completed.
    /// Transitions only run forward; a stale `advance` is ignored.
    pub fn advance(&mut self, next: Stage) {
        if next <= self.stage || matches!(self.stage, Stage::Done | Stage::Failed) {
            return;
        }
        self.completed.push(self.stage);
        self.stage = next;
    }

    pub fn finish(&mut self) {
        self.completed.push(self.stage);
        self.stage = Stage::Done;
    }

    pub fn fail(&mut self, failed_stage: &'static str, message: String) {
        self.failed_stage = Some(failed_stage);
        self.failure = Some(message);
        self.stage = Stage::Failed;
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
