use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::segment::infrastructure::directory_scanner::has_extension;

use super::pass_scheduler::PassTrigger;

/// Requests a pass whenever an image appears in the source directory.
///
/// Only creations and renames into the directory count; the scheduler's
/// debounce takes care of bursts. Activity inside `ignored` (the staging
/// directory) never triggers, and neither does a file leaving the directory,
/// otherwise every pass would schedule another.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    pub fn start(
        dir: &Path,
        recursive: bool,
        extensions: Vec<String>,
        ignored: PathBuf,
        trigger: PassTrigger,
    ) -> notify::Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_arrival(&event, &extensions, &ignored) {
                    trigger.request();
                }
            }
            Err(e) => log::warn!("File watcher error: {e}"),
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(dir, mode)?;
        log::info!("Watching {}", dir.display());

        Ok(Self { _watcher: watcher })
    }
}

fn is_arrival(event: &Event, extensions: &[String], ignored: &Path) -> bool {
    let wanted = |p: &Path| !p.starts_with(ignored) && has_extension(p, extensions);
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().any(|p| wanted(p))
        }
        // Paths are [from, to]; only the destination matters.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().is_some_and(|p| wanted(p))
        }
        // Backends that cannot tell the direction: arrived if it is there now.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().any(|p| wanted(p) && p.exists())
        }
        _ => false,
    }
}
