use std::fs;
use std::io;
use std::path::Path;

use crate::relocation::domain::file_mover::FileMover;

/// Renames within a filesystem; falls back to copy + delete when the rename
/// is refused (e.g. staging or backup on another volume).
///
/// The fallback never leaves two copies behind: if the source cannot be
/// deleted after copying, the copy is removed and the error returned.
pub struct FsFileMover;

impl FsFileMover {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FsFileMover {
    fn default() -> Self {
        Self::new()
    }
}

impl FileMover for FsFileMover {
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        let rename_err = match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !from.is_file() {
            return Err(rename_err);
        }

        fs::copy(from, to)?;
        if let Err(e) = fs::remove_file(from) {
            let _ = fs::remove_file(to);
            return Err(e);
        }
        Ok(())
    }
}
