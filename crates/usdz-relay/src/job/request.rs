//! Job request files accepted by the relay binary.

use std::path::Path;

use serde::Deserialize;

use crate::error::RelayError;
use crate::job::{FileEntry, Manifest};

/// `{ "files": [...], "options": [...], "extra_args": "" }`
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub files: Manifest,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub extra_args: String,
}

impl JobRequest {
    /// Reads a request file. Relative file paths are resolved against the
    /// directory containing it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let invalid = |message: String| RelayError::Request {
            path: path.to_path_buf(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let request: JobRequest =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        request.resolved(base).map_err(invalid)
    }

    fn resolved(mut self, base: &Path) -> Result<Self, String> {
        let entries: Vec<FileEntry> = self
            .files
            .entries()
            .iter()
            .cloned()
            .map(|mut entry| {
                if entry.path.is_relative() && !entry.path.as_os_str().is_empty() {
                    entry.path = base.join(&entry.path);
                }
                entry
            })
            .collect();
        self.files = Manifest::from_entries(entries).map_err(|e| e.to_string())?;
        Ok(self)
    }
}
