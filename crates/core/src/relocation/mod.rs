pub mod backup_relocator;
pub mod domain;
pub mod infrastructure;
pub mod staging_queue;
