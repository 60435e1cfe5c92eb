//! Single-slot FIFO job scheduler.
//!
//! Jobs run strictly one at a time in submission order. Every change to the
//! scheduler (a submission, an output line, a process exit) arrives as a
//! [`SchedulerEvent`] on one channel and is applied by a dispatcher thread
//! under a single lock, so stage chaining never races with submissions.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use tracing::info_span;

use crate::broadcast::{JobEvent, JobEventBroadcaster, JobEventKind};
use crate::convert::arguments;
use crate::db::{job_repo, Database, DatabaseError};
use crate::error::SchedulerError;
use crate::job::{ConversionJob, JobId, JobState, Manifest};
use crate::sanitize;
use crate::storage::FilePublisher;
use crate::supervisor::{
    ExitOutcome, ExitSink, LaunchSpec, LineSink, ProcessHandle, ProcessSupervisor,
};
use crate::worker::stage::{Stage, Toolchain};

/// Failure reason recorded for jobs that were running when the relay stopped.
pub const INTERRUPTED_REASON: &str = "interrupted by restart";

const DISPATCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Input to the dispatcher.
#[derive(Debug)]
pub enum SchedulerEvent {
    /// Start the next job if the slot is free.
    Wake,
    Line { launch_id: u64, line: String },
    Exited { launch_id: u64, outcome: ExitOutcome },
}

#[derive(Clone, Default)]
pub struct SchedulerOptions {
    pub broadcaster: Option<JobEventBroadcaster>,
    pub database: Option<Database>,
}

/// Counts from [`JobScheduler::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub completed: usize,
    pub requeued: usize,
    pub interrupted: usize,
    pub skipped: usize,
}

struct ActiveStage {
    launch_id: u64,
    job_id: JobId,
    stage: Stage,
    handle: Option<Box<dyn ProcessHandle>>,
    preview_image: Option<PathBuf>,
}

struct SchedulerState {
    jobs: BTreeMap<JobId, ConversionJob>,
    queue: VecDeque<JobId>,
    active: Option<ActiveStage>,
    next_id: JobId,
    next_launch_id: u64,
}

impl SchedulerState {
    fn is_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    fn is_queued_or_active(&self, id: JobId) -> bool {
        self.queue.contains(&id) || self.active.as_ref().is_some_and(|a| a.job_id == id)
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    idle: Condvar,
    events: Sender<SchedulerEvent>,
    toolchain: Toolchain,
    supervisor: Arc<dyn ProcessSupervisor>,
    publisher: Arc<dyn FilePublisher>,
    broadcaster: Option<JobEventBroadcaster>,
    database: Option<Database>,
    shutdown: AtomicBool,
}

pub struct JobScheduler {
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
    pub fn new(
        toolchain: Toolchain,
        supervisor: Arc<dyn ProcessSupervisor>,
        publisher: Arc<dyn FilePublisher>,
    ) -> Self {
        Self::with_options(toolchain, supervisor, publisher, SchedulerOptions::default())
    }

    pub fn with_options(
        toolchain: Toolchain,
        supervisor: Arc<dyn ProcessSupervisor>,
        publisher: Arc<dyn FilePublisher>,
        options: SchedulerOptions,
    ) -> Self {
        let (events, receiver) = unbounded();
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState {
                jobs: BTreeMap::new(),
                queue: VecDeque::new(),
                active: None,
                next_id: 1,
                next_launch_id: 1,
            }),
            idle: Condvar::new(),
            events,
            toolchain,
            supervisor,
            publisher,
            broadcaster: options.broadcaster,
            database: options.database,
            shutdown: AtomicBool::new(false),
        });

        let dispatcher_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || run_dispatcher(dispatcher_shared, receiver));

        info!("Job scheduler started");

        Self {
            shared,
            dispatcher: Mutex::new(Some(handle)),
        }
    }

    /// Creates a job from a validated manifest and queues it.
    pub fn submit(
        &self,
        manifest: Manifest,
        option_args: Vec<String>,
        extra_args: impl Into<String>,
    ) -> Result<JobId, SchedulerError> {
        self.ensure_running()?;

        let mut state = self.shared.lock_state();
        let id = state.next_id;
        state.next_id += 1;
        let job = ConversionJob::new(id, manifest, option_args, extra_args);
        self.shared.enqueue(&mut state, job);
        drop(state);

        self.shared.wake();
        Ok(id)
    }

    /// Queues a pre-built job.
    ///
    /// Returns `Ok(false)` without changes when the job is already queued or
    /// running, or when it is not in the `Queued` state.
    pub fn submit_job(&self, job: ConversionJob) -> Result<bool, SchedulerError> {
        self.ensure_running()?;

        let mut state = self.shared.lock_state();
        let id = job.id();
        if state.is_queued_or_active(id) {
            debug!("Job {} is already queued or running", id);
            return Ok(false);
        }
        if job.state() != JobState::Queued {
            warn!("Job {} is {}, only queued jobs can be submitted", id, job.state());
            return Ok(false);
        }

        state.next_id = state.next_id.max(id + 1);
        self.shared.enqueue(&mut state, job);
        drop(state);

        self.shared.wake();
        Ok(true)
    }

    /// Snapshot of a job.
    pub fn get_job(&self, id: JobId) -> Option<ConversionJob> {
        self.shared.lock_state().jobs.get(&id).map(ConversionJob::snapshot)
    }

    /// Snapshots of all known jobs in ascending id order.
    pub fn list_jobs(&self) -> Vec<ConversionJob> {
        self.shared
            .lock_state()
            .jobs
            .values()
            .map(ConversionJob::snapshot)
            .collect()
    }

    /// Ids waiting in the queue, head first.
    pub fn queued_jobs(&self) -> Vec<JobId> {
        self.shared.lock_state().queue.iter().copied().collect()
    }

    /// Job and stage currently holding the process slot.
    pub fn active_stage(&self) -> Option<(JobId, Stage)> {
        self.shared
            .lock_state()
            .active
            .as_ref()
            .map(|a| (a.job_id, a.stage))
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock_state().is_idle()
    }

    /// Removes a completed job and its stored row.
    pub fn remove_job(&self, id: JobId) -> Result<ConversionJob, SchedulerError> {
        let mut state = self.shared.lock_state();
        let completed = state
            .jobs
            .get(&id)
            .map(ConversionJob::is_completed)
            .ok_or(SchedulerError::NotFound(id))?;
        // A finished job may still hold the slot for its preview render.
        if !completed || state.is_queued_or_active(id) {
            return Err(SchedulerError::InProgress(id));
        }

        let job = state.jobs.remove(&id).ok_or(SchedulerError::NotFound(id))?;
        drop(state);

        if let Some(db) = &self.shared.database {
            if let Err(e) = job_repo::delete(db, id) {
                error!("Failed to delete stored job {}: {}", id, e);
            }
        }
        info!("Removed job {}", id);
        Ok(job)
    }

    /// Kills the process of the running stage. The exit is handled like any
    /// other failure. Returns whether a process was signalled.
    pub fn kill_active(&self) -> bool {
        let state = self.shared.lock_state();
        match state.active.as_ref() {
            Some(active) => match &active.handle {
                Some(handle) => {
                    info!(
                        "Killing {} stage of job {}",
                        active.stage, active.job_id
                    );
                    handle.kill();
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Blocks until no job is queued or running. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock_state();
        while !state.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.shared.idle.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => {
                    warn!("Scheduler state lock was poisoned, recovering");
                    poisoned.into_inner().0
                }
            };
        }
        true
    }

    /// Loads stored jobs.
    ///
    /// Completed jobs are listed as they are, queued jobs are queued again in
    /// id order and jobs that were running when the relay stopped are marked
    /// failed. New ids continue after the highest stored id.
    pub fn restore(&self) -> Result<RestoreSummary, DatabaseError> {
        let mut summary = RestoreSummary::default();
        let Some(db) = &self.shared.database else {
            return Ok(summary);
        };

        let rows = job_repo::list_all(db)?;
        let mut state = self.shared.lock_state();

        for row in rows {
            let row_id = row.id;
            let mut job = match row.into_job() {
                Ok(job) => job,
                Err(e) => {
                    warn!("Skipping stored job {}: {}", row_id, e);
                    summary.skipped += 1;
                    continue;
                }
            };
            let id = job.id();
            state.next_id = state.next_id.max(id + 1);
            if state.jobs.contains_key(&id) {
                debug!("Job {} already loaded", id);
                continue;
            }

            match job.state() {
                JobState::Queued => {
                    state.queue.push_back(id);
                    summary.requeued += 1;
                }
                JobState::InProgress | JobState::PostProcessing => {
                    if let Err(e) = job.set_failed(INTERRUPTED_REASON) {
                        warn!("Cannot fail interrupted job {}: {}", id, e);
                    }
                    self.shared.persist(&job);
                    summary.interrupted += 1;
                }
                JobState::Finished | JobState::Failed => summary.completed += 1,
            }
            state.jobs.insert(id, job);
        }
        drop(state);

        info!(
            "Restored jobs: {} completed, {} requeued, {} interrupted, {} skipped",
            summary.completed, summary.requeued, summary.interrupted, summary.skipped
        );
        self.shared.wake();
        Ok(summary)
    }

    /// Stops the dispatcher and kills the running process. Jobs left running
    /// are failed by the next [`JobScheduler::restore`].
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down job scheduler...");
        self.kill_active();
        self.shared.wake();

        let handle = match self.dispatcher.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => {
                warn!("Dispatcher handle lock was poisoned, recovering");
                poisoned.into_inner().take()
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Scheduler dispatcher panicked");
            }
        }
        info!("Job scheduler stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), SchedulerError> {
        if self.is_shutdown() {
            Err(SchedulerError::ShutDown)
        } else {
            Ok(())
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_dispatcher(shared: Arc<Shared>, events: Receiver<SchedulerEvent>) {
    debug!("Scheduler dispatcher started");

    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            debug!("Scheduler dispatcher received shutdown signal");
            break;
        }

        match events.recv_timeout(DISPATCH_POLL_INTERVAL) {
            Ok(event) => shared.handle_event(event),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Scheduler event channel disconnected");
                break;
            }
        }
    }

    debug!("Scheduler dispatcher stopped");
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Scheduler state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn wake(&self) {
        let _ = self.events.send(SchedulerEvent::Wake);
    }

    fn handle_event(&self, event: SchedulerEvent) {
        let mut state = self.lock_state();
        match event {
            SchedulerEvent::Wake => {
                if state.active.is_none() {
                    self.run_next(&mut state);
                }
            }
            SchedulerEvent::Line { launch_id, line } => self.on_line(&mut state, launch_id, line),
            SchedulerEvent::Exited { launch_id, outcome } => {
                self.on_exit(&mut state, launch_id, outcome)
            }
        }
        self.idle.notify_all();
    }

    fn enqueue(&self, state: &mut SchedulerState, job: ConversionJob) {
        let id = job.id();
        info!(
            "Queued job {} for {}",
            id,
            sanitize::redact_path(job.scene_file())
        );
        self.persist(&job);
        self.emit(&job, JobEventKind::Queued, "Job queued for conversion");
        state.jobs.insert(id, job);
        state.queue.push_back(id);
    }

    /// Starts queued jobs until one holds the slot or the queue is empty.
    fn run_next(&self, state: &mut SchedulerState) {
        while state.active.is_none() {
            let Some(job_id) = state.queue.pop_front() else {
                debug!("Queue is empty");
                return;
            };
            let Some(job) = state.jobs.get_mut(&job_id) else {
                warn!("Queued job {} no longer exists", job_id);
                continue;
            };
            if let Err(e) = job.set_in_progress() {
                warn!("Skipping queued job: {}", e);
                continue;
            }

            job.assign_out_file(self.toolchain.initial_out_file(job));
            let built = arguments::build(job);
            for entry in &built.skipped {
                warn!(
                    "Job {}: texture entry '{}' has no map type and was skipped",
                    job_id, entry
                );
            }
            let spec = self.toolchain.convert_launch(job, built.args);

            self.persist(job);
            self.emit(job, JobEventKind::Started, "Conversion started");
            self.launch(state, job_id, Stage::Convert, spec, None);
        }
    }

    fn launch(
        &self,
        state: &mut SchedulerState,
        job_id: JobId,
        stage: Stage,
        spec: LaunchSpec,
        preview_image: Option<PathBuf>,
    ) {
        let launch_id = state.next_launch_id;
        state.next_launch_id += 1;

        let scene = state
            .jobs
            .get(&job_id)
            .map(|j| sanitize::redact_path(j.scene_file()))
            .unwrap_or_default();
        let _span = info_span!("stage", job_id, stage = %stage, scene = %scene).entered();
        info!("Starting {} for job {}: {}", stage, job_id, spec.command_line());

        let lines = self.events.clone();
        let on_line: LineSink = Arc::new(move |line: String| {
            let _ = lines.send(SchedulerEvent::Line { launch_id, line });
        });
        let exits = self.events.clone();
        let on_exit: ExitSink = Box::new(move |outcome: ExitOutcome| {
            let _ = exits.send(SchedulerEvent::Exited { launch_id, outcome });
        });

        state.active = Some(ActiveStage {
            launch_id,
            job_id,
            stage,
            handle: None,
            preview_image,
        });

        match self.supervisor.start(spec, on_line, on_exit) {
            Ok(handle) => {
                if let Some(active) = state.active.as_mut() {
                    active.handle = Some(handle);
                }
            }
            // The supervisor reports the start failure as an exit event.
            Err(e) => error!("{} for job {} could not start: {}", stage.label(), job_id, e),
        }
    }

    fn on_line(&self, state: &mut SchedulerState, launch_id: u64, line: String) {
        let job_id = match state.active.as_ref() {
            Some(active) if active.launch_id == launch_id => active.job_id,
            _ => {
                debug!("Dropping output of stale launch {}", launch_id);
                return;
            }
        };
        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.append_message(line.clone());
            self.emit(job, JobEventKind::Output, line);
        }
    }

    fn on_exit(&self, state: &mut SchedulerState, launch_id: u64, outcome: ExitOutcome) {
        let is_current = state
            .active
            .as_ref()
            .is_some_and(|a| a.launch_id == launch_id);
        if !is_current {
            debug!("Ignoring exit of stale launch {}: {}", launch_id, outcome);
            return;
        }
        let Some(active) = state.active.take() else {
            return;
        };

        match active.stage {
            Stage::Convert | Stage::PostProcess if !outcome.is_success() => {
                self.fail(state, active.job_id, active.stage, &outcome);
                self.run_next(state);
            }
            Stage::Convert => self.on_convert_success(state, active.job_id),
            Stage::PostProcess => self.finalize(state, active.job_id),
            Stage::Preview => {
                self.on_preview_exit(state, active.job_id, outcome, active.preview_image);
                self.run_next(state);
            }
        }
    }

    fn on_convert_success(&self, state: &mut SchedulerState, job_id: JobId) {
        let Some(job) = state.jobs.get_mut(&job_id) else {
            self.run_next(state);
            return;
        };

        let post_process = if self.toolchain.needs_post_process(job) {
            self.toolchain.post_process_launch(job.out_file())
        } else {
            None
        };

        match post_process {
            Some(spec) => {
                if let Err(e) = job.set_post_processing() {
                    warn!("{}", e);
                }
                let product = Toolchain::post_process_product(job.out_file());
                job.assign_out_file(product);
                self.persist(job);
                self.emit(job, JobEventKind::Stage, "Material post-process started");
                self.launch(state, job_id, Stage::PostProcess, spec, None);
            }
            None => self.finalize(state, job_id),
        }
    }

    /// Publishes the output and completes the job, then starts the preview
    /// stage or the next job.
    fn finalize(&self, state: &mut SchedulerState, job_id: JobId) {
        let Some(job) = state.jobs.get_mut(&job_id) else {
            self.run_next(state);
            return;
        };

        match self.publisher.publish(job.out_file(), &job.publish_dir_name()) {
            Ok(published) => {
                if let Err(e) = job.set_complete(published) {
                    warn!("{}", e);
                }
                info!("Job {} finished: {:?}", job_id, job.out_file());
                self.persist(job);
                self.emit(job, JobEventKind::Finished, "Conversion finished");

                if let Some((spec, image)) = self.toolchain.preview_launch(job) {
                    self.launch(state, job_id, Stage::Preview, spec, Some(image));
                    return;
                }
            }
            Err(e) => {
                let reason = format!("Publishing output failed: {}", e);
                if job.set_failed(&reason).is_ok() {
                    error!("Job {} failed: {}", job_id, reason);
                    self.persist(job);
                    self.emit(job, JobEventKind::Failed, reason);
                }
            }
        }

        self.run_next(state);
    }

    fn fail(&self, state: &mut SchedulerState, job_id: JobId, stage: Stage, outcome: &ExitOutcome) {
        let Some(job) = state.jobs.get_mut(&job_id) else {
            return;
        };
        let reason = format!("{} {}", stage.label(), outcome);
        match job.set_failed(&reason) {
            Ok(()) => {
                warn!("Job {} failed: {}", job_id, reason);
                self.persist(job);
                self.emit(job, JobEventKind::Failed, reason);
            }
            Err(e) => warn!("{}", e),
        }
    }

    /// Preview results are informational only and never change job state.
    fn on_preview_exit(
        &self,
        state: &mut SchedulerState,
        job_id: JobId,
        outcome: ExitOutcome,
        image: Option<PathBuf>,
    ) {
        let Some(job) = state.jobs.get_mut(&job_id) else {
            return;
        };

        let message = match (outcome.is_success(), image) {
            (true, Some(image)) => match self.publisher.publish(&image, &job.publish_dir_name()) {
                Ok(published) => {
                    let message =
                        format!("Preview published: {}", sanitize::redact_path(&published));
                    info!("Job {}: {}", job_id, message);
                    job.set_preview_file(published);
                    message
                }
                Err(e) => {
                    let message = format!("Preview publish failed: {}", e);
                    warn!("Job {}: {}", job_id, message);
                    message
                }
            },
            _ => {
                let message = format!("{} {}", Stage::Preview.label(), outcome);
                warn!("Job {}: {}", job_id, message);
                message
            }
        };

        job.append_message(message.clone());
        self.persist(job);
        self.emit(job, JobEventKind::Preview, message);
    }

    fn persist(&self, job: &ConversionJob) {
        if let Some(db) = &self.database {
            if let Err(e) = job_repo::save(db, job) {
                error!("Failed to persist job {}: {}", job.id(), e);
            }
        }
    }

    fn emit(&self, job: &ConversionJob, kind: JobEventKind, message: impl Into<String>) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.send(JobEvent::from_job(job, kind, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PublishError, SupervisorError};
    use std::path::Path;

    /// Supervisor that exits immediately with a fixed outcome.
    struct InstantSupervisor {
        outcome: ExitOutcome,
        launches: Mutex<Vec<LaunchSpec>>,
    }

    struct NoopHandle;

    impl ProcessHandle for NoopHandle {
        fn id(&self) -> Option<u32> {
            None
        }

        fn kill(&self) {}
    }

    impl ProcessSupervisor for InstantSupervisor {
        fn start(
            &self,
            spec: LaunchSpec,
            on_line: LineSink,
            on_exit: ExitSink,
        ) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
            self.launches.lock().unwrap().push(spec);
            on_line("Input file: scene".to_string());
            on_exit(self.outcome.clone());
            Ok(Box::new(NoopHandle))
        }
    }

    struct EchoPublisher;

    impl FilePublisher for EchoPublisher {
        fn publish(&self, source: &Path, job_dir_name: &str) -> Result<PathBuf, PublishError> {
            let name = source.file_name().unwrap_or_default();
            Ok(Path::new("/static").join(job_dir_name).join(name))
        }
    }

    fn scheduler(outcome: ExitOutcome) -> (JobScheduler, Arc<InstantSupervisor>) {
        let supervisor = Arc::new(InstantSupervisor {
            outcome,
            launches: Mutex::new(Vec::new()),
        });
        let toolchain = Toolchain::new("/opt/usdzconvert/usdzconvert")
            .with_env(crate::convert::EnvMap::new());
        let scheduler = JobScheduler::new(
            toolchain,
            Arc::clone(&supervisor) as Arc<dyn ProcessSupervisor>,
            Arc::new(EchoPublisher),
        );
        (scheduler, supervisor)
    }

    #[test]
    fn test_submit_runs_to_completion() {
        let (scheduler, supervisor) = scheduler(ExitOutcome::Success);
        let id = scheduler
            .submit(Manifest::new("/up/up_1/chair.obj"), vec![], "")
            .unwrap();
        assert!(scheduler.wait_idle(Duration::from_secs(5)));

        let job = scheduler.get_job(id).unwrap();
        assert_eq!(job.state(), JobState::Finished);
        assert_eq!(job.progress(), 100);
        assert_eq!(job.out_file(), Path::new("/static/up_1/chair.usdz"));
        assert_eq!(job.messages(), ["Input file: scene"]);
        assert_eq!(supervisor.launches.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_exit_fails_job() {
        let (scheduler, _) = scheduler(ExitOutcome::Failed { code: Some(1) });
        let id = scheduler
            .submit(Manifest::new("/up/up_1/chair.obj"), vec![], "")
            .unwrap();
        assert!(scheduler.wait_idle(Duration::from_secs(5)));

        let job = scheduler.get_job(id).unwrap();
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(job.error_text(), "Conversion exited with code 1");
    }

    #[test]
    fn test_ids_are_monotonic() {
        let (scheduler, _) = scheduler(ExitOutcome::Success);
        let a = scheduler.submit(Manifest::new("/up/a/a.obj"), vec![], "").unwrap();
        let b = scheduler.submit(Manifest::new("/up/b/b.obj"), vec![], "").unwrap();
        assert!(b > a);
        assert!(scheduler.wait_idle(Duration::from_secs(5)));
        let ids: Vec<_> = scheduler.list_jobs().iter().map(|j| j.id()).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let (scheduler, _) = scheduler(ExitOutcome::Success);
        scheduler.shutdown();
        assert!(scheduler.is_shutdown());
        assert_eq!(
            scheduler.submit(Manifest::new("/up/a/a.obj"), vec![], ""),
            Err(SchedulerError::ShutDown)
        );
    }

    #[test]
    fn test_remove_job_errors() {
        let (scheduler, _) = scheduler(ExitOutcome::Success);
        assert_eq!(
            scheduler.remove_job(99).unwrap_err(),
            SchedulerError::NotFound(99)
        );

        let id = scheduler.submit(Manifest::new("/up/a/a.obj"), vec![], "").unwrap();
        assert!(scheduler.wait_idle(Duration::from_secs(5)));
        let removed = scheduler.remove_job(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(scheduler.get_job(id).is_none());
    }
}
