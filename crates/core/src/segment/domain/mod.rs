pub mod segment;
pub mod segment_key;
