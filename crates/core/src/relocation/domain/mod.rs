pub mod file_mover;
pub mod lock_inspector;
pub mod sleeper;
