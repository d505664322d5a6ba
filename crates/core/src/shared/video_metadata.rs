/// Stream parameters of a segment video.
///
/// Width and height are fixed for the whole file; every frame written must
/// match them.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    /// ffmpeg encoder name, e.g. `mpeg4`.
    pub codec: String,
}

impl VideoMetadata {
    pub fn for_output(width: u32, height: u32, fps: f64, codec: &str) -> Self {
        Self {
            width,
            height,
            fps,
            total_frames: 0,
            codec: codec.to_string(),
        }
    }

    /// Integral frame rate used for the encoder time base; non-positive
    /// rates fall back to the default.
    pub fn time_base_rate(&self) -> i32 {
        let rate = self.fps.round() as i32;
        if rate <= 0 {
            crate::shared::constants::DEFAULT_FRAME_RATE as i32
        } else {
            rate
        }
    }
}
