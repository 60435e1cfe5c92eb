use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobId;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Process error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Invalid job request '{path}': {message}")]
    Request { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Launch spec has no program to run")]
    MissingProgram,

    #[error("Failed to create output pipe: {0}")]
    OutputPipe(#[source] std::io::Error),

    #[error("Failed to start output reader thread: {0}")]
    ReaderThread(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Output file does not exist: {0}")]
    MissingSource(PathBuf),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {0} has not completed yet")]
    InProgress(JobId),

    #[error("Scheduler has been shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, RelayError>;
