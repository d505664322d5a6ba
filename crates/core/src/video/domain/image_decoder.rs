use std::path::Path;

use crate::shared::frame::Frame;

/// Loads one still image into an RGB raster.
pub trait ImageDecoder: Send {
    fn decode(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>>;
}
