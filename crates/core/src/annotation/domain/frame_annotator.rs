use crate::shared::frame::Frame;

/// Burns a text label into a frame in place.
///
/// A failed annotation leaves the caller free to encode the raster as is.
pub trait FrameAnnotator: Send {
    fn annotate(&self, frame: &mut Frame, label: &str) -> Result<(), Box<dyn std::error::Error>>;
}
