pub mod domain;
pub mod infrastructure;
pub mod segment_grouper;
