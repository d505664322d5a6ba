use ndarray::s;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::infrastructure::glyphs::{glyph, GLYPH_WIDTH};
use crate::shared::constants::{LABEL_BOX_HEIGHT, LABEL_TEXT_OFFSET};
use crate::shared::frame::Frame;

const BACKGROUND: u8 = 255;
const INK: u8 = 0;

/// Draws black text on a white box covering the left half of the top
/// `LABEL_BOX_HEIGHT` rows.
///
/// Short labels are drawn at double size; a label that would not fit at
/// double size drops to single size. Only what still overflows at single
/// size is clipped.
pub struct LabelAnnotator {
    max_scale: usize,
}

impl LabelAnnotator {
    pub fn new() -> Self {
        Self { max_scale: 2 }
    }

    fn scale_for(&self, label: &str, box_w: usize) -> usize {
        let chars = label.chars().count();
        (1..=self.max_scale)
            .rev()
            .find(|&scale| {
                LABEL_TEXT_OFFSET.0 as usize + chars * (GLYPH_WIDTH as usize + 1) * scale <= box_w
            })
            .unwrap_or(1)
    }
}

impl Default for LabelAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAnnotator for LabelAnnotator {
    fn annotate(&self, frame: &mut Frame, label: &str) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("Cannot label a {}-channel frame", frame.channels()).into());
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err("Cannot label an empty frame".into());
        }

        let box_w = (frame.width() / 2).max(1) as usize;
        let box_h = LABEL_BOX_HEIGHT.min(frame.height()) as usize;
        let scale = self.scale_for(label, box_w);
        let advance = (GLYPH_WIDTH as usize + 1) * scale;
        let (origin_x, origin_y) = (LABEL_TEXT_OFFSET.0 as usize, LABEL_TEXT_OFFSET.1 as usize);

        let mut pixels = frame.as_ndarray_mut();
        pixels.slice_mut(s![0..box_h, 0..box_w, ..]).fill(BACKGROUND);

        for (i, c) in label.chars().enumerate() {
            let x0 = origin_x + i * advance;
            if x0 >= box_w {
                break;
            }
            for (row, bits) in glyph(c).iter().enumerate() {
                for col in 0..GLYPH_WIDTH as usize {
                    if bits & (1 << (GLYPH_WIDTH as usize - 1 - col)) == 0 {
                        continue;
                    }
                    let y = origin_y + row * scale;
                    let x = x0 + col * scale;
                    if y >= box_h || x >= box_w {
                        continue;
                    }
                    let y_end = (y + scale).min(box_h);
                    let x_end = (x + scale).min(box_w);
                    pixels.slice_mut(s![y..y_end, x..x_end, ..]).fill(INK);
                }
            }
        }

        Ok(())
    }
}
