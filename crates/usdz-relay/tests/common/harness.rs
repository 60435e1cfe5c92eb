//! Test harness for isolated scheduler runs.
//!
//! The `TestHarness` struct provides:
//! - Temporary upload, publish and tool directories
//! - A `ScriptedSupervisor` that plays back canned process runs
//! - A `RecordingPublisher` that publishes for real and can be told to fail

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use usdz_relay::db::Database;
use usdz_relay::error::{PublishError, SupervisorError};
use usdz_relay::logging;
use usdz_relay::storage::{DirectoryPublisher, FilePublisher};
use usdz_relay::supervisor::{
    ExitOutcome, ExitSink, LaunchSpec, LineSink, ProcessHandle, ProcessSupervisor,
};
use usdz_relay::worker::{JobScheduler, SchedulerOptions, Toolchain};

use super::builders::{self, CONVERTER, POST_PROCESS};

/// Generous upper bound for anything the tests wait on.
pub const WAIT: Duration = Duration::from_secs(10);

/// One canned process run.
#[derive(Debug, Clone)]
pub struct Script {
    pub lines: Vec<String>,
    pub outcome: ExitOutcome,
    /// Write the file the stage is expected to produce before exiting.
    pub writes_output: bool,
    pub duration: Duration,
}

impl Script {
    pub fn success() -> Self {
        Self {
            lines: Vec::new(),
            outcome: ExitOutcome::Success,
            writes_output: true,
            duration: Duration::ZERO,
        }
    }

    pub fn fail(code: i32) -> Self {
        Self {
            outcome: ExitOutcome::Failed { code: Some(code) },
            writes_output: false,
            ..Self::success()
        }
    }

    pub fn start_failure(reason: &str) -> Self {
        Self {
            outcome: ExitOutcome::StartFailed {
                reason: reason.to_string(),
            },
            writes_output: false,
            ..Self::success()
        }
    }

    /// Runs until killed.
    pub fn hang() -> Self {
        Self::success().lasting(Duration::from_secs(60))
    }

    pub fn with_lines(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn without_output(mut self) -> Self {
        self.writes_output = false;
        self
    }
}

struct ScriptedHandle {
    killed: Arc<AtomicBool>,
}

impl ProcessHandle for ScriptedHandle {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }
}

/// Plays back queued scripts in launch order. Once the queue is empty every
/// launch succeeds immediately.
pub struct ScriptedSupervisor {
    scripts: Mutex<VecDeque<Script>>,
    launches: Mutex<Vec<LaunchSpec>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl ScriptedSupervisor {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            launches: Mutex::new(Vec::new()),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.lock().unwrap().clone()
    }

    /// Highest number of simultaneously running scripts.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

/// File a stage writes, derived from its command line.
fn produced_file(spec: &LaunchSpec) -> Option<PathBuf> {
    let program = spec.program.file_name()?.to_str()?;
    match program {
        CONVERTER => spec.args.get(1).map(PathBuf::from),
        POST_PROCESS => spec
            .args
            .first()
            .map(|p| Path::new(p).with_extension("usdz")),
        _ => spec.args.last().map(PathBuf::from),
    }
}

impl ProcessSupervisor for ScriptedSupervisor {
    fn start(
        &self,
        spec: LaunchSpec,
        on_line: LineSink,
        on_exit: ExitSink,
    ) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
        self.launches.lock().unwrap().push(spec.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Script::success);

        if let ExitOutcome::StartFailed { reason } = &script.outcome {
            on_exit(script.outcome.clone());
            return Err(SupervisorError::Spawn {
                program: spec.program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, reason.clone()),
            });
        }

        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        let killed = Arc::new(AtomicBool::new(false));
        let killed_flag = Arc::clone(&killed);
        let running = Arc::clone(&self.running);
        let produced = produced_file(&spec);

        let run = move || {
            for line in &script.lines {
                on_line(line.clone());
            }
            let deadline = Instant::now() + script.duration;
            while Instant::now() < deadline && !killed_flag.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(2));
            }

            let outcome = if killed_flag.load(Ordering::SeqCst) {
                ExitOutcome::Killed
            } else {
                if script.writes_output {
                    if let Some(path) = &produced {
                        std::fs::write(path, b"scripted output").unwrap();
                    }
                }
                script.outcome
            };
            running.fetch_sub(1, Ordering::SeqCst);
            on_exit(outcome);
        };

        if script.duration.is_zero() {
            run();
        } else {
            thread::spawn(run);
        }

        Ok(Box::new(ScriptedHandle { killed }))
    }
}

/// Real directory publisher that records what it published and can be told
/// to reject files by extension.
pub struct RecordingPublisher {
    inner: DirectoryPublisher,
    published: Mutex<Vec<PathBuf>>,
    fail_extensions: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: DirectoryPublisher::new(root),
            published: Mutex::new(Vec::new()),
            fail_extensions: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(&self, extension: &str) {
        self.fail_extensions
            .lock()
            .unwrap()
            .push(extension.to_string());
    }

    pub fn published(&self) -> Vec<PathBuf> {
        self.published.lock().unwrap().clone()
    }

    pub fn directory(&self) -> &DirectoryPublisher {
        &self.inner
    }
}

impl FilePublisher for RecordingPublisher {
    fn publish(&self, source: &Path, job_dir_name: &str) -> Result<PathBuf, PublishError> {
        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_extensions.lock().unwrap().contains(&extension) {
            return Err(PublishError::MoveFile {
                from: source.to_path_buf(),
                to: self.inner.root().join(job_dir_name),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }

        let published = self.inner.publish(source, job_dir_name)?;
        self.published.lock().unwrap().push(published.clone());
        Ok(published)
    }
}

/// Isolated environment for a scheduler test.
pub struct TestHarness {
    pub temp_dir: TempDir,
    pub uploads: PathBuf,
    pub publish_dir: PathBuf,
    pub tools: PathBuf,
    pub supervisor: Arc<ScriptedSupervisor>,
    pub publisher: Arc<RecordingPublisher>,
}

impl TestHarness {
    pub fn new() -> Self {
        logging::init_for_tests();

        let temp_dir = TempDir::new().unwrap();
        let uploads = temp_dir.path().join("uploads");
        let publish_dir = temp_dir.path().join("static").join("downloads");
        let tools = temp_dir.path().join("tools");
        for dir in [&uploads, &publish_dir, &tools] {
            std::fs::create_dir_all(dir).unwrap();
        }

        let publisher = Arc::new(RecordingPublisher::new(&publish_dir));

        Self {
            temp_dir,
            uploads,
            publish_dir,
            tools,
            supervisor: Arc::new(ScriptedSupervisor::new()),
            publisher,
        }
    }

    /// Writes a placeholder upload and returns its path.
    pub fn upload(&self, dir: &str, file: &str) -> PathBuf {
        let dir = self.uploads.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file);
        std::fs::write(&path, b"upload").unwrap();
        path
    }

    pub fn toolchain(&self) -> Toolchain {
        builders::toolchain(&self.tools)
    }

    pub fn scheduler(&self, toolchain: Toolchain) -> JobScheduler {
        self.scheduler_with(toolchain, SchedulerOptions::default())
    }

    pub fn scheduler_with(&self, toolchain: Toolchain, options: SchedulerOptions) -> JobScheduler {
        JobScheduler::with_options(
            toolchain,
            Arc::clone(&self.supervisor) as Arc<dyn ProcessSupervisor>,
            Arc::clone(&self.publisher) as Arc<dyn FilePublisher>,
            options,
        )
    }

    pub fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("data").join("jobs.db")
    }

    pub fn database(&self) -> Database {
        Database::open(&self.database_path()).unwrap()
    }

    /// Expected published location of a file.
    pub fn published(&self, dir: &str, file: &str) -> PathBuf {
        self.publish_dir.join(dir).join(file)
    }
}

/// Polls `condition` until it holds or `WAIT` elapses.
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
