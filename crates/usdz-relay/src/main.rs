use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;

use usdz_relay::{
    load_config, logging, Database, DirectoryPublisher, JobEventBroadcaster, JobEventKind,
    JobRequest, JobScheduler, JobState, NativeSupervisor, RelayError, SchedulerOptions, Toolchain,
};

const USAGE: &str = "usage: usdz-relay <config.json> <job.json>...";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((config_path, requests)) = args.split_first() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    match run(Path::new(config_path), requests) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("usdz-relay: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every job submitted by this run finished.
fn run(config_path: &Path, requests: &[String]) -> Result<bool, RelayError> {
    let config = load_config(config_path)?;
    logging::init_logging(&config.log_level);

    info!("Starting usdz-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Publishing to {:?}", config.publish_directory);

    let database = match config.database_path() {
        Some(path) => match Database::open(&path) {
            Ok(db) => {
                info!("Job store: {:?}", path);
                Some(db)
            }
            Err(e) => {
                warn!("Job store unavailable at {:?}: {}", path, e);
                None
            }
        },
        None => None,
    };

    let broadcaster = JobEventBroadcaster::default();
    spawn_progress_printer(&broadcaster);

    let publisher = Arc::new(DirectoryPublisher::new(&config.publish_directory));
    let scheduler = Arc::new(JobScheduler::with_options(
        Toolchain::from_config(&config),
        Arc::new(NativeSupervisor::new()),
        publisher.clone(),
        SchedulerOptions {
            broadcaster: Some(broadcaster),
            database,
        },
    ));
    scheduler.restore()?;

    let handler_scheduler = Arc::clone(&scheduler);
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupted, stopping the active conversion");
        handler_scheduler.shutdown();
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let mut submitted = Vec::new();
    let mut all_accepted = true;
    for request_path in requests {
        let request = match JobRequest::load(request_path) {
            Ok(request) => request,
            Err(e) => {
                error!("{}", e);
                all_accepted = false;
                continue;
            }
        };
        match scheduler.submit(request.files, request.options, request.extra_args) {
            Ok(id) => submitted.push(id),
            Err(e) => {
                error!("Could not submit {}: {}", request_path, e);
                all_accepted = false;
            }
        }
    }

    while !scheduler.wait_idle(Duration::from_millis(500)) {
        if scheduler.is_shutdown() {
            break;
        }
    }

    let mut all_finished = all_accepted;
    println!();
    for job in scheduler.list_jobs() {
        let detail = match job.state() {
            JobState::Finished => job.out_file().display().to_string(),
            JobState::Failed => job.error_text().to_string(),
            _ => String::new(),
        };
        println!("{:>5}  {:<16} {}", job.id(), job.state(), detail);
        if submitted.contains(&job.id()) && job.state() != JobState::Finished {
            all_finished = false;
        }
    }

    match publisher.list_published() {
        Ok(listing) if !listing.is_empty() => {
            println!("\nPublished in {}:", publisher.root().display());
            for (dir, files) in listing {
                for file in files {
                    let name = file.file_name().unwrap_or_default().to_string_lossy();
                    println!("  {}/{}", dir, name);
                }
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Could not list published files: {}", e),
    }

    scheduler.shutdown();
    Ok(all_finished)
}

fn spawn_progress_printer(broadcaster: &JobEventBroadcaster) {
    let mut events = broadcaster.subscribe();
    thread::spawn(move || loop {
        match events.blocking_recv() {
            Ok(event) if event.kind == JobEventKind::Output => {}
            Ok(event) => println!(
                "[job {}] {:>3}% {:<9} {}",
                event.job_id, event.progress, event.kind, event.message
            ),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Progress display skipped {} events", skipped)
            }
            Err(RecvError::Closed) => break,
        }
    });
}
