use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::manifest::{FileEntry, Manifest, OUT_FILE, PREVIEW_FILE, SCENE_FILE};
use crate::sanitize;

pub type JobId = u64;

/// Progress reported once a job leaves the queue.
pub const STARTED_PROGRESS: u8 = 5;
/// Progress gained for every output line of a running stage.
pub const MESSAGE_PROGRESS_STEP: u8 = 15;
/// Highest progress a job can reach before it is finished.
pub const IN_FLIGHT_PROGRESS_CEILING: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    InProgress,
    PostProcessing,
    Finished,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::InProgress => "in_progress",
            JobState::PostProcessing => "post_processing",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "in_progress" => Ok(JobState::InProgress),
            "post_processing" => Ok(JobState::PostProcessing),
            "finished" => Ok(JobState::Finished),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state '{}'", other)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Job {job_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobState,
    pub to: JobState,
}

/// One conversion request and everything observed while running it.
///
/// Fields are readable by the crate but only change through the transition
/// methods, which enforce the state machine:
///
/// ```text
/// Queued -> InProgress -> [PostProcessing] -> Finished
///                 \              \
///                  +------------- +--------> Failed
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionJob {
    pub(crate) id: JobId,
    pub(crate) manifest: Manifest,
    pub(crate) option_args: Vec<String>,
    pub(crate) extra_args: String,
    pub(crate) state: JobState,
    pub(crate) progress: u8,
    pub(crate) messages: Vec<String>,
    pub(crate) error_text: String,
    pub(crate) completed: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn new(
        id: JobId,
        manifest: Manifest,
        option_args: Vec<String>,
        extra_args: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            manifest,
            option_args,
            extra_args: extra_args.into(),
            state: JobState::Queued,
            progress: 0,
            messages: Vec::new(),
            error_text: String::new(),
            completed: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn option_args(&self) -> &[String] {
        &self.option_args
    }

    pub fn extra_args(&self) -> &str {
        &self.extra_args
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn error_text(&self) -> &str {
        &self.error_text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Path of the input scene; empty when absent.
    pub fn scene_file(&self) -> &Path {
        self.path_or_empty(SCENE_FILE)
    }

    /// Path of the converter output; empty until the job has started.
    pub fn out_file(&self) -> &Path {
        self.path_or_empty(OUT_FILE)
    }

    /// Path of the rendered preview; empty unless a preview was published.
    pub fn preview_file(&self) -> &Path {
        self.path_or_empty(PREVIEW_FILE)
    }

    fn path_or_empty(&self, id: &str) -> &Path {
        self.manifest.path_of(id).unwrap_or_else(|| Path::new(""))
    }

    /// Lower-cased scene extension including the leading dot, e.g. `.abc`.
    pub fn scene_extension(&self) -> String {
        self.scene_file()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default()
    }

    /// Directory component used when publishing this job's outputs.
    ///
    /// Uses the name of the directory holding the scene file (uploads live in
    /// one directory per request) and falls back to `job_<id>`.
    pub fn publish_dir_name(&self) -> String {
        self.scene_file()
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .and_then(sanitize::secure_dir_name)
            .unwrap_or_else(|| format!("job_{}", self.id))
    }

    /// Cloned view of the job for rendering outside the scheduler lock.
    pub fn snapshot(&self) -> ConversionJob {
        self.clone()
    }

    pub fn set_in_progress(&mut self) -> Result<(), TransitionError> {
        self.ensure(&[JobState::Queued], JobState::InProgress)?;
        self.state = JobState::InProgress;
        self.progress = STARTED_PROGRESS;
        self.touch();
        Ok(())
    }

    pub fn set_post_processing(&mut self) -> Result<(), TransitionError> {
        self.ensure(&[JobState::InProgress], JobState::PostProcessing)?;
        self.state = JobState::PostProcessing;
        self.touch();
        Ok(())
    }

    /// Appends a line of process output.
    ///
    /// While the job is running every line advances progress by a fixed step,
    /// capped below 100 which only `set_complete` may reach. Lines appended
    /// after completion (preview output) leave progress untouched.
    pub fn append_message(&mut self, line: impl Into<String>) {
        self.messages.push(line.into());
        if !self.completed {
            let next = self
                .progress
                .saturating_add(MESSAGE_PROGRESS_STEP)
                .min(IN_FLIGHT_PROGRESS_CEILING);
            self.progress = self.progress.max(next);
        }
        self.touch();
    }

    pub fn set_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure(
            &[JobState::InProgress, JobState::PostProcessing],
            JobState::Failed,
        )?;
        self.state = JobState::Failed;
        self.progress = 0;
        self.error_text = reason.into();
        self.mark_completed();
        Ok(())
    }

    /// Marks the job finished with the already-published output path.
    pub fn set_complete(&mut self, published_out: impl Into<PathBuf>) -> Result<(), TransitionError> {
        self.ensure(
            &[JobState::InProgress, JobState::PostProcessing],
            JobState::Finished,
        )?;
        self.manifest.insert(FileEntry::new(OUT_FILE, published_out));
        self.state = JobState::Finished;
        self.progress = 100;
        self.mark_completed();
        Ok(())
    }

    pub fn assign_out_file(&mut self, path: impl Into<PathBuf>) {
        self.manifest.insert(FileEntry::new(OUT_FILE, path));
        self.touch();
    }

    pub fn set_preview_file(&mut self, path: impl Into<PathBuf>) {
        self.manifest.insert(FileEntry::new(PREVIEW_FILE, path));
        self.touch();
    }

    fn ensure(&self, allowed: &[JobState], to: JobState) -> Result<(), TransitionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(TransitionError {
                job_id: self.id,
                from: self.state,
                to,
            })
        }
    }

    fn mark_completed(&mut self) {
        let now = Utc::now();
        self.completed = true;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
