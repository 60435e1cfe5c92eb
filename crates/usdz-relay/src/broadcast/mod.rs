//! Broadcasting of job events for real-time progress streaming.

pub mod job_progress;

pub use job_progress::{JobEvent, JobEventBroadcaster, JobEventKind};
