use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::relocation::backup_relocator::{original_name, unique_name};
use crate::relocation::domain::file_mover::FileMover;
use crate::relocation::domain::sleeper::Sleeper;
use crate::shared::config::CamrollConfig;

#[derive(Error, Debug)]
pub enum StagingError {
    /// The source vanished while we were waiting for it.
    #[error("{0} no longer exists")]
    Absent(PathBuf),
    #[error("{0} has no file name")]
    NoFileName(PathBuf),
    #[error("gave up staging {path} after {attempts} attempts: {source}")]
    GaveUp {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },
}

/// Takes exclusive ownership of a source image before it is decoded.
///
/// A camera may still be writing the file when a pass sees it, so the move
/// is retried with a doubling wait (capped at `max_delay`). Without an
/// attempt cap the queue waits indefinitely for a producer that holds the
/// file; with one, the file stays in the source directory and is picked up
/// again on a later pass.
pub struct StagingQueue {
    dir: PathBuf,
    mover: Box<dyn FileMover>,
    sleeper: Box<dyn Sleeper>,
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl StagingQueue {
    pub fn new(config: &CamrollConfig, mover: Box<dyn FileMover>, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            dir: config.staging_dir.clone(),
            mover,
            sleeper,
            initial_delay: config.staging_retry(),
            max_delay: config.staging_max_retry(),
            max_attempts: config.staging_max_attempts,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Moves `source` into the staging directory and returns its new path.
    ///
    /// If a file of the same name is already staged, the newcomer gets a
    /// unique suffix rather than waiting behind it.
    pub fn stage(&self, source: &Path) -> Result<PathBuf, StagingError> {
        let name = source
            .file_name()
            .ok_or_else(|| StagingError::NoFileName(source.to_path_buf()))?;
        let mut staged = self.dir.join(name);
        if staged.exists() {
            staged = self.dir.join(unique_name(&name.to_string_lossy()));
            log::warn!(
                "{} is already staged, staging {} as {}",
                name.to_string_lossy(),
                source.display(),
                staged.display()
            );
        }

        let mut delay = self.initial_delay;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let err = match self.mover.move_file(source, &staged) {
                Ok(()) => return Ok(staged),
                Err(e) => e,
            };

            if !source.exists() {
                return Err(StagingError::Absent(source.to_path_buf()));
            }
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(StagingError::GaveUp {
                    path: source.to_path_buf(),
                    attempts,
                    source: err,
                });
            }

            log::debug!(
                "{} is busy ({err}), retrying in {}ms",
                source.display(),
                delay.as_millis()
            );
            self.sleeper.sleep(delay);
            delay = (delay * 2).min(self.max_delay);
        }
    }

    /// Puts a staged file back where it came from, unconsumed.
    pub fn release(&self, staged: &Path, source: &Path) -> io::Result<()> {
        self.mover.move_file(staged, source)
    }

    /// Returns every file left in staging by an interrupted pass to
    /// `source_dir` under its original name, except those in `keep`. Files
    /// whose name is taken in `source_dir` stay staged until a later pass.
    pub fn recover_into(&self, source_dir: &Path, keep: &[PathBuf]) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot read staging directory {}: {e}", self.dir.display());
                return 0;
            }
        };

        let mut recovered = 0;
        for entry in entries.flatten() {
            let staged = entry.path();
            if !staged.is_file() || keep.contains(&staged) {
                continue;
            }
            let name = entry.file_name();
            let target = source_dir.join(original_name(&name.to_string_lossy()));
            if target.exists() {
                log::warn!(
                    "Leaving {} in staging: {} already exists",
                    staged.display(),
                    target.display()
                );
                continue;
            }
            match self.mover.move_file(&staged, &target) {
                Ok(()) => {
                    log::info!("Returned {} to {}", staged.display(), source_dir.display());
                    recovered += 1;
                }
                Err(e) => log::warn!("Failed to return {}: {e}", staged.display()),
            }
        }
        recovered
    }
}
