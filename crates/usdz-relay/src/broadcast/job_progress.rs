//! Job event broadcaster for live progress reporting.
//!
//! Any UI layer can subscribe and render progress without polling the
//! scheduler. The channel is lossy: a receiver that falls behind by more than
//! the channel capacity skips the oldest events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{ConversionJob, JobId, JobState};

const DEFAULT_CAPACITY: usize = 256;

/// What happened to a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Queued,
    Started,
    /// A follow-up stage was launched.
    Stage,
    /// A line of process output.
    Output,
    Finished,
    Failed,
    /// Preview render outcome, reported after the job finished.
    Preview,
}

impl std::fmt::Display for JobEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobEventKind::Queued => write!(f, "Queued"),
            JobEventKind::Started => write!(f, "Started"),
            JobEventKind::Stage => write!(f, "Stage"),
            JobEventKind::Output => write!(f, "Output"),
            JobEventKind::Finished => write!(f, "Finished"),
            JobEventKind::Failed => write!(f, "Failed"),
            JobEventKind::Preview => write!(f, "Preview"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    pub kind: JobEventKind,
    /// Job state after the change.
    pub state: JobState,
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Published output (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobEvent {
    /// Creates an event describing the current state of `job`.
    pub fn from_job(job: &ConversionJob, kind: JobEventKind, message: impl Into<String>) -> Self {
        let output_path = (kind == JobEventKind::Finished)
            .then(|| job.out_file().to_string_lossy().into_owned());
        let error = (kind == JobEventKind::Failed).then(|| job.error_text().to_string());

        Self {
            job_id: job.id(),
            kind,
            state: job.state(),
            progress: job.progress(),
            message: message.into(),
            timestamp: Utc::now(),
            output_path,
            error,
        }
    }
}

/// Broadcasts job events to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
