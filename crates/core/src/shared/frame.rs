use ndarray::{ArrayView3, ArrayViewMut3};

/// A single raster: contiguous RGB bytes in row-major order.
///
/// Both decoded stills and frames recovered from an existing segment video
/// use this type; conversion to codec pixel formats happens at I/O
/// boundaries only.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps a decoded RGB image without copying its pixels.
    pub fn from_rgb_image(img: image::RgbImage, index: usize) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns a copy scaled to `width` x `height`.
    ///
    /// Only RGB frames can be scaled; anything else yields `None`.
    pub fn resized(&self, width: u32, height: u32) -> Option<Frame> {
        if self.channels != 3 {
            return None;
        }
        let img = image::RgbImage::from_raw(self.width, self.height, self.data.clone())?;
        let scaled =
            image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
        Some(Frame::from_rgb_image(scaled, self.index))
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.dimensions(), (2, 2));
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_from_rgb_image_keeps_pixels() {
        let mut img = image::RgbImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgb([10, 20, 30]));
        let frame = Frame::from_rgb_image(img, 7);
        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(frame.index(), 7);
        assert_eq!(frame.as_ndarray()[[1, 2, 1]], 20);
    }

    #[test]
    fn test_resized_changes_dimensions_and_keeps_index() {
        let frame = Frame::new(vec![200u8; 8 * 4 * 3], 8, 4, 3, 3);
        let scaled = frame.resized(4, 2).unwrap();
        assert_eq!(scaled.dimensions(), (4, 2));
        assert_eq!(scaled.index(), 3);
        assert!(scaled.data().iter().all(|&b| b == 200));
    }

    #[test]
    fn test_resized_rejects_non_rgb() {
        let frame = Frame::new(vec![0u8; 4], 2, 2, 1, 0);
        assert!(frame.resized(1, 1).is_none());
    }

    #[test]
    fn test_as_ndarray_mut_modification() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 3, 0);
        {
            let mut arr = frame.as_ndarray_mut();
            arr[[0, 1, 2]] = 128;
        }
        assert_eq!(frame.as_ndarray()[[0, 1, 2]], 128);
    }
}
