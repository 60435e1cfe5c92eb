pub mod filesystem;

use std::path::{Path, PathBuf};

use crate::error::PublishError;

pub use filesystem::DirectoryPublisher;

/// Moves finished job outputs to where clients can download them.
pub trait FilePublisher: Send + Sync {
    /// Moves `source` into the download area under `job_dir_name` and returns
    /// the published path.
    fn publish(&self, source: &Path, job_dir_name: &str) -> Result<PathBuf, PublishError>;
}
