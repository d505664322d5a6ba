pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Frames per second of every segment video.
pub const DEFAULT_FRAME_RATE: f64 = 3.0;
pub const DEFAULT_CODEC: &str = "mpeg4";
/// Target encoder bit rate, bits per second.
pub const DEFAULT_BIT_RATE: usize = 400_000;

/// Label box drawn into the top-left corner of every appended frame.
pub const LABEL_BOX_HEIGHT: u32 = 20;
pub const LABEL_TEXT_OFFSET: (u32, u32) = (5, 2);

pub const DEFAULT_STAGING_RETRY_MS: u64 = 250;
pub const DEFAULT_STAGING_MAX_RETRY_MS: u64 = 5_000;
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 1_000;

/// Infix of the sibling file a segment video is written to before it
/// replaces the real output.
pub const PARTIAL_OUTPUT_INFIX: &str = "partial";

pub const CONFIG_DIR_NAME: &str = "camroll";
pub const CONFIG_FILE_NAME: &str = "config.json";
