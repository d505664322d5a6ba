pub mod fs_file_mover;
pub mod proc_lock_inspector;
