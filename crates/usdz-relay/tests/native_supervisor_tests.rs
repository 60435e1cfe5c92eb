//! Real child processes through `NativeSupervisor`.

#![cfg(unix)]

mod common;

use std::ffi::OsString;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{TestHarness, WAIT};
use usdz_relay::convert::environment;
use usdz_relay::job::{JobState, Manifest};
use usdz_relay::storage::DirectoryPublisher;
use usdz_relay::supervisor::{
    ExitOutcome, LaunchSpec, LineSink, NativeSupervisor, ProcessHandle, ProcessSupervisor,
};
use usdz_relay::worker::{JobScheduler, Toolchain};

struct Run {
    lines: Arc<Mutex<Vec<String>>>,
    exit: mpsc::Receiver<ExitOutcome>,
    handle: Option<Box<dyn ProcessHandle>>,
}

impl Run {
    fn outcome(&self) -> ExitOutcome {
        self.exit.recv_timeout(WAIT).unwrap()
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

fn shell(script: &str) -> LaunchSpec {
    LaunchSpec::new("/bin/sh")
        .arg("-c")
        .arg(script)
        .env(environment::inherited())
}

fn start(spec: LaunchSpec) -> Run {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = Arc::clone(&lines);
    let on_line: LineSink = Arc::new(move |line: String| sink_lines.lock().unwrap().push(line));
    let (tx, exit) = mpsc::channel();
    let handle = NativeSupervisor::new()
        .start(
            spec,
            on_line,
            Box::new(move |outcome: ExitOutcome| {
                let _ = tx.send(outcome);
            }),
        )
        .ok();
    Run {
        lines,
        exit,
        handle,
    }
}

#[test]
fn test_streams_stdout_and_stderr_lines() {
    let run = start(shell("echo first; echo; echo second 1>&2; printf 'third\\r\\n'"));
    assert_eq!(run.outcome(), ExitOutcome::Success);
    assert_eq!(run.lines(), vec!["first", "second", "third"]);
    assert!(run.handle.is_some());
}

#[test]
fn test_interleaved_streams_keep_write_order() {
    let expected: Vec<String> = (1..=8)
        .flat_map(|i| [format!("out{}", i), format!("err{}", i)])
        .collect();
    for _ in 0..10 {
        let run = start(shell(
            "for i in 1 2 3 4 5 6 7 8; do echo out$i; echo err$i 1>&2; done",
        ));
        assert_eq!(run.outcome(), ExitOutcome::Success);
        assert_eq!(run.lines(), expected);
    }
}

#[test]
fn test_nonzero_exit_code_is_reported() {
    let run = start(shell("echo failing; exit 3"));
    assert_eq!(run.outcome(), ExitOutcome::Failed { code: Some(3) });
    assert_eq!(run.lines(), vec!["failing"]);
}

#[test]
fn test_child_receives_environment_map() {
    let mut env = environment::inherited();
    env.insert(OsString::from("RELAY_TEST_MARKER"), OsString::from("chair"));
    let run = start(
        LaunchSpec::new("/bin/sh")
            .arg("-c")
            .arg("echo \"marker=$RELAY_TEST_MARKER\"; echo \"home=${RELAY_UNSET_VAR:-none}\"")
            .env(env),
    );
    assert_eq!(run.outcome(), ExitOutcome::Success);

    let mut lines = run.lines();
    lines.sort();
    assert_eq!(lines, vec!["home=none", "marker=chair"]);
}

#[test]
fn test_runs_in_requested_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let run = start(shell("pwd -P").current_dir(temp_dir.path()));
    assert_eq!(run.outcome(), ExitOutcome::Success);

    let expected = temp_dir.path().canonicalize().unwrap();
    assert_eq!(run.lines(), vec![expected.to_string_lossy().into_owned()]);
}

#[test]
fn test_missing_program_fails_to_start() {
    let run = start(LaunchSpec::new("/definitely/not/a/converter").env(environment::inherited()));
    assert!(run.handle.is_none());
    assert!(matches!(run.outcome(), ExitOutcome::StartFailed { .. }));
    assert!(run.lines().is_empty());
}

#[test]
fn test_kill_terminates_process() {
    let run = start(shell("echo started; exec sleep 30"));
    let handle = run.handle.as_ref().unwrap();
    assert!(handle.id().is_some());

    assert!(common::wait_until(|| run.lines() == vec!["started"]));
    handle.kill();
    assert_eq!(run.outcome(), ExitOutcome::Killed);
}

#[test]
fn test_kill_reaches_processes_started_by_the_child() {
    let run = start(shell("echo started; sleep 30; echo done"));
    let handle = run.handle.as_ref().unwrap();

    assert!(common::wait_until(|| run.lines() == vec!["started"]));
    handle.kill();
    assert_eq!(
        run.exit.recv_timeout(Duration::from_secs(5)),
        Ok(ExitOutcome::Killed)
    );
    assert_eq!(run.lines(), vec!["started"]);
}

#[test]
fn test_exit_reported_while_helper_holds_output_open() {
    let run = start(shell("echo parent; sleep 6 & echo leaving"));
    assert_eq!(
        run.exit.recv_timeout(Duration::from_secs(5)),
        Ok(ExitOutcome::Success)
    );
    assert_eq!(run.lines(), vec!["parent", "leaving"]);
}

#[test]
fn test_scheduler_with_shell_converter() {
    let harness = TestHarness::new();
    let script = harness.tools.join("usdzconvert.sh");
    std::fs::write(
        &script,
        "echo \"Input file: $1\"\necho \"Output file: $2\"\ncp \"$1\" \"$2\"\n",
    )
    .unwrap();
    let scene = harness.upload("u1", "chair.obj");

    let toolchain = Toolchain::new(&script)
        .with_interpreter("/bin/sh")
        .with_env(environment::inherited());
    let scheduler = JobScheduler::new(
        toolchain,
        Arc::new(NativeSupervisor::new()),
        Arc::new(DirectoryPublisher::new(&harness.publish_dir)),
    );
    let id = scheduler.submit(Manifest::new(&scene), vec![], "").unwrap();
    assert!(scheduler.wait_idle(WAIT + Duration::from_secs(5)));

    let job = scheduler.get_job(id).unwrap();
    assert_eq!(job.state(), JobState::Finished, "{}", job.error_text());
    let published = harness.published("u1", "chair.usdz");
    assert_eq!(job.out_file(), published);
    assert_eq!(std::fs::read(&published).unwrap(), b"upload");
    assert_eq!(job.messages().len(), 2);
    assert!(job.messages()[0].starts_with("Input file: "));
}
