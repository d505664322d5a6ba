pub mod config;
pub mod constants;
pub mod daily_log;
pub mod frame;
pub mod video_metadata;
