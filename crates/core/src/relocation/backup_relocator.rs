use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::relocation::domain::file_mover::FileMover;
use crate::relocation::domain::lock_inspector::{LockInspector, LockReport};
use crate::segment::domain::segment_key::{DateFormat, SourceFrame};
use crate::shared::config::CamrollConfig;

/// What happens when the backup bucket already holds a file of that name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Delete the existing backup and move again.
    Overwrite,
    /// Keep both: the newcomer becomes `{name}.{uuid}.{ext}`.
    UniqueSuffix,
}

#[derive(Error, Debug)]
pub enum RelocationError {
    #[error("failed to create backup bucket {path}: {source}")]
    Bucket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to backup {from} to {to} (held by {holders}): {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        holders: LockReport,
        #[source]
        source: io::Error,
    },
}

/// Moves consumed stills into `{root}/{date bucket}/{file name}`.
///
/// A failed move leaves the file where it is and is reported once, with
/// whatever the lock inspector can tell about who holds it.
pub struct BackupRelocator {
    root: PathBuf,
    date_format: DateFormat,
    policy: CollisionPolicy,
    mover: Box<dyn FileMover>,
    inspector: Box<dyn LockInspector>,
}

impl BackupRelocator {
    pub fn new(
        config: &CamrollConfig,
        mover: Box<dyn FileMover>,
        inspector: Box<dyn LockInspector>,
    ) -> Self {
        Self {
            root: config.backup_dir.clone(),
            date_format: config.date_format,
            policy: config.collision_policy,
            mover,
            inspector,
        }
    }

    /// Relocates `frame`, which currently lives at `current` (its staged
    /// path, or its source path). Returns the backup path.
    pub fn relocate(&self, frame: &SourceFrame, current: &Path) -> Result<PathBuf, RelocationError> {
        let bucket = self.root.join(frame.key.date_bucket(self.date_format));
        if let Err(source) = fs::create_dir_all(&bucket) {
            log::error!(
                "Failed to backup {} to {}: cannot create bucket: {source}",
                current.display(),
                bucket.display()
            );
            return Err(RelocationError::Bucket {
                path: bucket,
                source,
            });
        }

        let name = frame.file_name();
        let mut target = bucket.join(&name);
        let result = if target.exists() {
            match self.policy {
                CollisionPolicy::Overwrite => {
                    fs::remove_file(&target).and_then(|_| self.mover.move_file(current, &target))
                }
                CollisionPolicy::UniqueSuffix => {
                    target = bucket.join(unique_name(&name));
                    self.mover.move_file(current, &target)
                }
            }
        } else {
            self.mover.move_file(current, &target)
        };

        match result {
            Ok(()) => Ok(target),
            Err(source) => {
                let holders = self.inspector.inspect(current);
                log::error!(
                    "Failed to backup {} to {} because file is used by {}: {}",
                    current.display(),
                    target.display(),
                    holders,
                    source
                );
                Err(RelocationError::Move {
                    from: current.to_path_buf(),
                    to: target,
                    holders,
                    source,
                })
            }
        }
    }
}

/// `a.jpg` -> `a.jpg.<32 hex>.jpg`
pub(crate) fn unique_name(name: &str) -> String {
    let token = Uuid::new_v4().simple();
    match Path::new(name).extension() {
        Some(ext) => format!("{name}.{token}.{}", ext.to_string_lossy()),
        None => format!("{name}.{token}"),
    }
}

/// Inverse of [`unique_name`]: `a.jpg.<32 hex>.jpg` -> `a.jpg`. Other names
/// come back unchanged.
pub(crate) fn original_name(name: &str) -> &str {
    let is_token = |s: &str| s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit());
    let Some((rest, last)) = name.rsplit_once('.') else {
        return name;
    };
    if is_token(last) {
        return rest;
    }
    match rest.rsplit_once('.') {
        Some((base, token)) if is_token(token) && base.ends_with(&format!(".{last}")) => base,
        _ => name,
    }
}
