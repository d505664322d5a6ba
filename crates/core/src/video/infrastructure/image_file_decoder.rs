use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_decoder::ImageDecoder;

/// Decodes stills with the `image` crate.
///
/// The format is sniffed from the file contents, so a mislabeled file still
/// decodes; truncated or garbage data is reported as an error.
pub struct ImageFileDecoder;

impl ImageFileDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for ImageFileDecoder {
    fn decode(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .to_rgb8();
        if img.width() == 0 || img.height() == 0 {
            return Err(format!("Image has no pixels: {}", path.display()).into());
        }
        Ok(Frame::from_rgb_image(img, 0))
    }
}
