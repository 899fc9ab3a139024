//! Meeting session collaborator boundary.
//!
//! The orchestrator only needs an "in meeting" signal and a handle it can
//! release later; all browser automation lives behind this seam in an
//! external helper process.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

/// Hosts accepted as Google Meet URLs.
const MEET_HOSTS: &[&str] = &["meet.google.com", "meet.google.co.in"];

/// Validate a meeting URL before the pipeline starts.
pub fn validate_meet_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .with_context(|| format!("Invalid Google Meet URL: {url}"))?;

    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));

    if !MEET_HOSTS.contains(&host) || path.is_empty() {
        bail!(
            "Invalid Google Meet URL: {url}\n\
             Expected format: https://meet.google.com/xxx-xxxx-xxx"
        );
    }

    Ok(())
}

/// A joined meeting session the orchestrator can observe and release.
#[async_trait]
pub trait MeetSession: Send {
    /// Join the meeting. Failure here is fatal to the run.
    async fn join(&mut self, url: &str) -> Result<()>;

    /// Whether the session still appears to be in the meeting.
    async fn is_in_meeting(&mut self) -> bool;

    /// Leave the meeting politely. Best-effort.
    async fn leave(&mut self) -> Result<()>;

    /// Release the underlying session handle. Must be safe to call after
    /// `leave`, and exactly one release must reach the live handle.
    async fn close(&mut self) -> Result<()>;
}

/// Drives an external browser-automation helper. The helper joins the
/// meeting on launch, stays resident while in it, and exits when the
/// meeting ends or it receives a kill.
pub struct BrowserMeetSession {
    helper_command: String,
    child: Option<tokio::process::Child>,
}

impl BrowserMeetSession {
    pub fn new(helper_command: String) -> Self {
        Self {
            helper_command,
            child: None,
        }
    }
}

#[async_trait]
impl MeetSession for BrowserMeetSession {
    async fn join(&mut self, url: &str) -> Result<()> {
        if self.child.is_some() {
            bail!("Meeting session already active");
        }

        which::which(
            self.helper_command
                .split_whitespace()
                .next()
                .unwrap_or(&self.helper_command),
        )
        .with_context(|| format!("Join helper '{}' not found on PATH", self.helper_command))?;

        info!("Joining meeting via helper: {}", self.helper_command);

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(format!("{} {}", self.helper_command, url))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch join helper '{}'", self.helper_command))?;

        self.child = Some(child);
        info!("Meeting session started");
        Ok(())
    }

    async fn is_in_meeting(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    info!("Join helper exited with {}, meeting ended", status);
                    false
                }
                Err(e) => {
                    warn!("Failed to poll join helper: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    async fn leave(&mut self) -> Result<()> {
        if let Some(child) = self.child.as_mut() {
            info!("Leaving meeting");
            child.kill().await.context("Failed to stop join helper")?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                child.kill().await.context("Failed to stop join helper")?;
            }
            info!("Meeting session released");
        }
        Ok(())
    }
}
