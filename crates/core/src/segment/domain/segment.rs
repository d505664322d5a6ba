use std::path::PathBuf;

use super::segment_key::{SegmentKey, SourceFrame};

/// Stills sharing a [`SegmentKey`], in ascending path order, plus the video
/// they are appended to. Lives for one pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub key: SegmentKey,
    pub output_path: PathBuf,
    pub frames: Vec<SourceFrame>,
}

impl Segment {
    pub fn new(key: SegmentKey, output_path: PathBuf) -> Self {
        Self {
            key,
            output_path,
            frames: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sort(&mut self) {
        self.frames.sort_by(|a, b| a.path.cmp(&b.path));
    }
}
