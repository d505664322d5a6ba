pub mod directory_watcher;
pub mod pass_scheduler;
