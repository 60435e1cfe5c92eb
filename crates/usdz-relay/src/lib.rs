pub mod broadcast;
pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod job;
pub mod logging;
pub mod sanitize;
pub mod storage;
pub mod supervisor;
pub mod worker;

pub use broadcast::{JobEvent, JobEventBroadcaster, JobEventKind};
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{
    ConfigError, PublishError, RelayError, Result, SchedulerError, SupervisorError,
};
pub use job::{ConversionJob, JobId, JobRequest, JobState, Manifest};
pub use storage::{DirectoryPublisher, FilePublisher};
pub use supervisor::{NativeSupervisor, ProcessSupervisor};
pub use worker::{JobScheduler, SchedulerOptions, Toolchain};
