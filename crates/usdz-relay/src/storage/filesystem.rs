use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::FilePublisher;
use crate::error::PublishError;
use crate::sanitize;

/// Directory used when a caller passes a name with no usable characters.
const FALLBACK_DIR_NAME: &str = "downloads";

/// Move a file from `src` to `dst`, replacing `dst`. Uses `rename` first and
/// falls back to copy + delete when the two paths are on different devices.
fn move_file(src: &Path, dst: &Path) -> Result<(), PublishError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| PublishError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| PublishError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Publishes files into `<root>/<job dir>/<file name>`.
///
/// The job directory name is sanitized so a crafted upload directory cannot
/// escape the download tree. Existing files with the same name are replaced,
/// which lets a re-run of the same upload refresh its download.
pub struct DirectoryPublisher {
    root: PathBuf,
}

impl DirectoryPublisher {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Published files grouped by job directory, both sorted by name.
    pub fn list_published(&self) -> Result<BTreeMap<String, Vec<PathBuf>>, PublishError> {
        let mut listing = BTreeMap::new();
        if !self.root.is_dir() {
            return Ok(listing);
        }

        for dir in read_dir(&self.root)? {
            if !dir.is_dir() {
                continue;
            }
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let mut files: Vec<PathBuf> = read_dir(&dir)?
                .into_iter()
                .filter(|p| p.is_file())
                .collect();
            files.sort();
            listing.insert(name.to_string(), files);
        }

        Ok(listing)
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), PublishError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| PublishError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

fn read_dir(path: &Path) -> Result<Vec<PathBuf>, PublishError> {
    let entries = std::fs::read_dir(path).map_err(|e| PublishError::ReadDirectory {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
}

impl FilePublisher for DirectoryPublisher {
    fn publish(&self, source: &Path, job_dir_name: &str) -> Result<PathBuf, PublishError> {
        if !source.is_file() {
            return Err(PublishError::MissingSource(source.to_path_buf()));
        }

        let dir_name = sanitize::secure_dir_name(job_dir_name).unwrap_or_else(|| {
            debug!(
                "Job directory name {:?} is unusable, publishing into {}",
                job_dir_name, FALLBACK_DIR_NAME
            );
            FALLBACK_DIR_NAME.to_string()
        });
        let target_dir = self.root.join(dir_name);
        self.ensure_directory(&target_dir)?;

        let file_name = source
            .file_name()
            .ok_or_else(|| PublishError::MissingSource(source.to_path_buf()))?;
        let target = target_dir.join(file_name);

        move_file(source, &target)?;
        info!(
            "Published {} to {:?}",
            sanitize::redact_path(source),
            target
        );

        Ok(target)
    }
}
