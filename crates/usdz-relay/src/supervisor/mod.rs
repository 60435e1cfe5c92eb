//! External process supervision.
//!
//! A [`ProcessSupervisor`] starts one process per call and reports back
//! through two sinks: every non-empty line of the combined stdout and stderr
//! stream goes to the line sink, in order, and the exit is reported to the
//! exit sink exactly once, after the last line. Starting never blocks the
//! caller.

pub mod native;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::convert::EnvMap;
use crate::error::SupervisorError;

pub use native::NativeSupervisor;

/// Receives decoded output lines. Called from reader threads.
pub type LineSink = Arc<dyn Fn(String) + Send + Sync>;

/// Receives the final outcome of a started process.
pub type ExitSink = Box<dyn FnOnce(ExitOutcome) + Send>;

/// Everything needed to start one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Complete environment of the child. Nothing else is inherited.
    pub env: EnvMap,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: EnvMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, env: EnvMap) -> Self {
        self.env = env;
        self
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("\"{}\"", a)
                } else {
                    a
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit code, or no code when ended by a signal.
    Failed { code: Option<i32> },
    /// Ended after [`ProcessHandle::kill`] was requested.
    Killed,
    /// The process never ran.
    StartFailed { reason: String },
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Success => write!(f, "exited successfully"),
            ExitOutcome::Failed { code: Some(code) } => write!(f, "exited with code {}", code),
            ExitOutcome::Failed { code: None } => write!(f, "terminated without exit code"),
            ExitOutcome::Killed => write!(f, "was terminated"),
            ExitOutcome::StartFailed { reason } => write!(f, "failed to start: {}", reason),
        }
    }
}

/// Handle to a started process.
pub trait ProcessHandle: Send + Sync {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Requests forced termination of the process and any helpers it
    /// started. Failures are logged, not returned.
    fn kill(&self);
}

pub trait ProcessSupervisor: Send + Sync {
    /// Starts `spec` and returns immediately.
    ///
    /// When the process cannot be started, `on_exit` receives
    /// [`ExitOutcome::StartFailed`] before the error is returned, so callers
    /// waiting on the exit sink are never left hanging.
    fn start(
        &self,
        spec: LaunchSpec,
        on_line: LineSink,
        on_exit: ExitSink,
    ) -> Result<Box<dyn ProcessHandle>, SupervisorError>;
}
