use std::fs;
use std::path::{Path, PathBuf};

use crate::relocation::domain::lock_inspector::{LockHolder, LockInspector, LockReport};

/// Finds open handles by walking `/proc/<pid>/fd` (Linux).
///
/// Processes whose fd table is unreadable (exited, or owned by another
/// user) are skipped rather than failing the whole query.
pub struct ProcLockInspector {
    proc_root: PathBuf,
}

impl ProcLockInspector {
    pub fn new() -> Self {
        Self::with_root(Path::new("/proc"))
    }

    pub fn with_root(proc_root: &Path) -> Self {
        Self {
            proc_root: proc_root.to_path_buf(),
        }
    }

    fn holds(&self, pid_dir: &Path, target: &Path) -> bool {
        let Ok(fds) = fs::read_dir(pid_dir.join("fd")) else {
            return false;
        };
        fds.flatten()
            .filter_map(|fd| fs::read_link(fd.path()).ok())
            .any(|link| link == target)
    }
}

impl Default for ProcLockInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl LockInspector for ProcLockInspector {
    fn inspect(&self, path: &Path) -> LockReport {
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let Ok(entries) = fs::read_dir(&self.proc_root) else {
            return LockReport::Unknown;
        };

        let mut holders = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };

            let pid_dir = entry.path();
            if !self.holds(&pid_dir, &target) {
                continue;
            }

            // No comm file means the process exited after we saw its fd.
            if let Ok(comm) = fs::read_to_string(pid_dir.join("comm")) {
                holders.push(LockHolder {
                    pid,
                    name: comm.trim().to_string(),
                });
            }
        }

        holders.sort_by_key(|h| h.pid);
        LockReport::Holders(holders)
    }
}

/// Fallback for platforms without handle introspection.
pub struct UnknownLockInspector;

impl LockInspector for UnknownLockInspector {
    fn inspect(&self, _path: &Path) -> LockReport {
        LockReport::Unknown
    }
}

/// The best inspector available on this platform.
pub fn platform_lock_inspector() -> Box<dyn LockInspector> {
    if cfg!(target_os = "linux") && Path::new("/proc/self/fd").is_dir() {
        Box::new(ProcLockInspector::new())
    } else {
        Box::new(UnknownLockInspector)
    }
}
