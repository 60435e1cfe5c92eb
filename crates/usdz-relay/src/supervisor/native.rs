//! [`ProcessSupervisor`] backed by `std::process`.
//!
//! stdout and stderr share one pipe, read by a single thread, so lines arrive
//! in the order the process wrote them. A waiter thread blocks on the child,
//! lets the reader drain, then reports the exit after the last line.
//!
//! On Unix the child leads its own process group and a kill signals the whole
//! group, which also stops helpers the converter started.

use std::io::{self, BufRead, BufReader, PipeReader, PipeWriter};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use super::{ExitOutcome, ExitSink, LaunchSpec, LineSink, ProcessHandle, ProcessSupervisor};
use crate::error::SupervisorError;

/// Log target for lines printed by supervised processes.
pub const PROCESS_LOG_TARGET: &str = "usdz_relay::process";

/// How long the exit report waits for output still held open by processes
/// that outlived the child.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const IDLE_PRIORITY_CLASS: u32 = 0x0000_0040;

/// Converters are long running and CPU heavy. On Windows they run without a
/// console window at idle priority so the host stays responsive. On Unix they
/// get their own process group so [`kill_tree`] can reach their helpers.
trait BackgroundExt {
    fn background(&mut self) -> &mut Self;
}

impl BackgroundExt for Command {
    fn background(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW | IDLE_PRIORITY_CLASS);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            self.process_group(0);
        }
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSupervisor;

impl NativeSupervisor {
    pub fn new() -> Self {
        Self
    }
}

/// Shared one-shot slot for the exit sink.
type ExitSlot = Arc<Mutex<Option<ExitSink>>>;

fn fire_exit(slot: &ExitSlot, outcome: ExitOutcome) {
    let sink = lock_recover(slot, "exit sink").take();
    match sink {
        Some(sink) => sink(outcome),
        None => debug!("Exit already reported, dropping {:?}", outcome),
    }
}

fn lock_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

fn start_failed(slot: &ExitSlot, reason: impl ToString) {
    fire_exit(
        slot,
        ExitOutcome::StartFailed {
            reason: reason.to_string(),
        },
    );
}

/// One pipe with a writer for each of stdout and stderr.
fn output_pipe() -> io::Result<(PipeReader, PipeWriter, PipeWriter)> {
    let (reader, writer) = io::pipe()?;
    let stderr = writer.try_clone()?;
    Ok((reader, writer, stderr))
}

impl ProcessSupervisor for NativeSupervisor {
    fn start(
        &self,
        spec: LaunchSpec,
        on_line: LineSink,
        on_exit: ExitSink,
    ) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
        let exit_slot: ExitSlot = Arc::new(Mutex::new(Some(on_exit)));

        if spec.program.as_os_str().is_empty() {
            start_failed(&exit_slot, SupervisorError::MissingProgram);
            return Err(SupervisorError::MissingProgram);
        }

        let (output, stdout, stderr) = match output_pipe() {
            Ok(pipe) => pipe,
            Err(e) => {
                error!("Failed to create output pipe for {:?}: {}", spec.program, e);
                start_failed(&exit_slot, &e);
                return Err(SupervisorError::OutputPipe(e));
            }
        };

        debug!("Starting process: {}", spec.command_line());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .env_clear()
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .background();
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let spawned = command.spawn();
        // Closes our copies of the write end; the reader sees EOF once every
        // process holding it is gone.
        drop(command);

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to start {:?}: {}", spec.program, e);
                start_failed(&exit_slot, &e);
                return Err(SupervisorError::Spawn {
                    program: spec.program,
                    source: e,
                });
            }
        };

        let pid = child.id();
        info!("Process {} started: {:?}", pid, spec.program);

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        if let Err(e) = spawn_reader(pid, output, on_line, done_tx) {
            error!("Failed to start output reader for process {}: {}", pid, e);
            if let Err(e) = kill_tree(pid) {
                warn!("Failed to kill process {}: {}", pid, e);
            }
            let _ = child.wait();
            start_failed(&exit_slot, &e);
            return Err(SupervisorError::ReaderThread(e));
        }

        let handle = NativeHandle {
            pid,
            killed: Arc::new(AtomicBool::new(false)),
            exited: Arc::new(AtomicBool::new(false)),
        };
        let killed = Arc::clone(&handle.killed);
        let exited = Arc::clone(&handle.exited);
        let waiter_slot = Arc::clone(&exit_slot);

        let spawned = thread::Builder::new()
            .name(format!("process-{}-wait", pid))
            .spawn(move || {
                let outcome = wait_for_exit(pid, child, &killed, &exited);
                await_output(pid, &done_rx);
                info!("Process {} {}", pid, outcome);
                fire_exit(&waiter_slot, outcome);
            });

        if let Err(e) = spawned {
            error!("Failed to start waiter for process {}: {}", pid, e);
            handle.kill();
            start_failed(&exit_slot, &e);
            return Err(SupervisorError::ReaderThread(e));
        }

        Ok(Box::new(handle))
    }
}

/// Reads the merged output until every writer has closed. Dropping `done`
/// tells the waiter the stream is drained.
fn spawn_reader(
    pid: u32,
    output: PipeReader,
    on_line: LineSink,
    done: Sender<()>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("process-{}-output", pid))
        .spawn(move || {
            let _done = done;
            let mut reader = BufReader::new(output);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        if let Some(line) = decode_line(&buf) {
                            info!(target: PROCESS_LOG_TARGET, "{}", line);
                            on_line(line);
                        }
                    }
                    Err(e) => {
                        warn!("Reading output of process {} failed: {}", pid, e);
                        break;
                    }
                }
            }
            debug!("Process {} output ended", pid);
        })
}

fn await_output(pid: u32, done: &Receiver<()>) {
    if let Err(RecvTimeoutError::Timeout) = done.recv_timeout(OUTPUT_DRAIN_TIMEOUT) {
        warn!(
            "Output of process {} still open {:?} after exit, reporting exit anyway",
            pid, OUTPUT_DRAIN_TIMEOUT
        );
    }
}

/// Decodes one raw output line. Returns `None` for blank lines.
///
/// Invalid UTF-8 is logged and replaced rather than dropped.
pub(crate) fn decode_line(raw: &[u8]) -> Option<String> {
    let line = match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!("Error decoding process output: {}", e);
            String::from_utf8_lossy(raw).into_owned()
        }
    };
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

fn wait_for_exit(
    pid: u32,
    mut child: Child,
    killed: &AtomicBool,
    exited: &AtomicBool,
) -> ExitOutcome {
    let status = child.wait();
    exited.store(true, Ordering::SeqCst);
    match status {
        Ok(status) => classify(status, killed.load(Ordering::SeqCst)),
        Err(e) => {
            error!("Failed to wait for process {}: {}", pid, e);
            ExitOutcome::Failed { code: None }
        }
    }
}

fn classify(status: ExitStatus, kill_requested: bool) -> ExitOutcome {
    if status.success() {
        ExitOutcome::Success
    } else if kill_requested {
        ExitOutcome::Killed
    } else {
        ExitOutcome::Failed {
            code: status.code(),
        }
    }
}

/// Kills the process group led by `pid`.
#[cfg(unix)]
fn kill_tree(pid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // Safety: kill(2) only takes plain integers; a negative pid addresses the group.
    let ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Kills `pid` and every process it started.
#[cfg(not(unix))]
fn kill_tree(pid: u32) -> io::Result<()> {
    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .background()
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill {}", status)))
    }
}

struct NativeHandle {
    pid: u32,
    killed: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
}

impl ProcessHandle for NativeHandle {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn kill(&self) {
        // A reaped pid may already belong to someone else.
        if self.exited.load(Ordering::SeqCst) {
            debug!("Process {} already exited, nothing to kill", self.pid);
            return;
        }
        self.killed.store(true, Ordering::SeqCst);
        info!("Attempting to kill process {} and its group", self.pid);
        if let Err(e) = kill_tree(self.pid) {
            warn!("Failed to kill process {}: {}", self.pid, e);
        }
    }
}
