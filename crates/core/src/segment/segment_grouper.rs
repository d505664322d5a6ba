use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::segment::domain::segment::Segment;
use crate::segment::domain::segment_key::{DateFormat, SourceFrame};
use crate::segment::infrastructure::directory_scanner::scan_images;
use crate::shared::config::CamrollConfig;

/// Output video path -> segment, ordered by output path.
pub type SegmentMap = BTreeMap<PathBuf, Segment>;

/// Partitions the source directory into segments.
///
/// Has no side effects: files are only listed, never opened or moved.
pub struct SegmentGrouper {
    source_dir: PathBuf,
    output_dir: PathBuf,
    /// Never scanned, even when it lies inside `source_dir`.
    staging_dir: PathBuf,
    recursive: bool,
    image_extensions: Vec<String>,
    video_extension: String,
    date_format: DateFormat,
}

impl SegmentGrouper {
    pub fn new(config: &CamrollConfig) -> Self {
        Self {
            source_dir: config.source_dir.clone(),
            output_dir: config.output_dir.clone(),
            staging_dir: config.staging_dir.clone(),
            recursive: config.recursive,
            image_extensions: config.image_extensions.clone(),
            video_extension: config.video_extension.clone(),
            date_format: config.date_format,
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Scans the source directory and groups what it finds.
    pub fn scan(&self) -> std::io::Result<SegmentMap> {
        let mut files = scan_images(&self.source_dir, self.recursive, &self.image_extensions)?;
        if !self.staging_dir.as_os_str().is_empty() {
            files.retain(|path| !path.starts_with(&self.staging_dir));
        }
        Ok(self.group(&files))
    }

    /// Groups `paths` by segment key. Malformed names are logged and
    /// skipped; they never abort the rest of the batch.
    pub fn group(&self, paths: &[PathBuf]) -> SegmentMap {
        let mut segments = SegmentMap::new();

        for path in paths {
            let frame = match SourceFrame::parse(path) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Skipped malformed input {}: {e}", path.display());
                    continue;
                }
            };

            let output_path = self.output_path(&frame);
            segments
                .entry(output_path.clone())
                .or_insert_with(|| Segment::new(frame.key.clone(), output_path))
                .frames
                .push(frame);
        }

        for segment in segments.values_mut() {
            segment.sort();
        }
        segments
    }

    fn output_path(&self, frame: &SourceFrame) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            frame.key.stem(self.date_format),
            self.video_extension
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn grouper(source: &Path, date_format: DateFormat) -> SegmentGrouper {
        SegmentGrouper::new(&CamrollConfig {
            source_dir: source.to_path_buf(),
            output_dir: PathBuf::from("/out"),
            date_format,
            ..CamrollConfig::default()
        })
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/in").join(n)).collect()
    }

    #[test]
    fn test_two_frames_same_day_share_one_segment() {
        let g = grouper(Path::new("/in"), DateFormat::Compact);
        let map = g.group(&paths(&[
            "CAM01_1_0001_20150603191500_1000.jpg",
            "CAM01_1_0001_20150603183804_9999.jpg",
        ]));

        assert_eq!(map.len(), 1);
        let (output, segment) = map.iter().next().unwrap();
        assert_eq!(output, &PathBuf::from("/out/CAM01_1_0001_20150603.mp4"));
        assert_eq!(segment.key.stem(DateFormat::Compact), "CAM01_1_0001_20150603");
        let names: Vec<_> = segment.frames.iter().map(|f| f.file_name()).collect();
        assert_eq!(
            names,
            vec![
                "CAM01_1_0001_20150603183804_9999.jpg",
                "CAM01_1_0001_20150603191500_1000.jpg"
            ]
        );
    }

    #[test]
    fn test_dashed_date_policy_renders_output_name() {
        let g = grouper(Path::new("/in"), DateFormat::Dashed);
        let map = g.group(&paths(&["CAM01_1_0001_20150603183804_9999.jpg"]));
        assert!(map.contains_key(&PathBuf::from("/out/CAM01_1_0001_2015-06-03.mp4")));
    }

    #[test]
    fn test_keys_split_on_every_component() {
        let g = grouper(Path::new("/in"), DateFormat::Compact);
        let map = g.group(&paths(&[
            "CAM01_1_0001_20150603000000_1.jpg",
            "CAM01_2_0001_20150603000000_1.jpg",
            "CAM01_1_0002_20150603000000_1.jpg",
            "CAM01_1_0001_20150604000000_1.jpg",
            "CAM02_1_0001_20150603000000_1.jpg",
        ]));
        assert_eq!(map.len(), 5);
        assert!(map.values().all(|s| s.len() == 1));
    }

    #[test]
    fn test_malformed_names_are_skipped_not_fatal() {
        let g = grouper(Path::new("/in"), DateFormat::Compact);
        let map = g.group(&paths(&[
            "bad.jpg",
            "CAM01_1_0001_20150603183804_9999.jpg",
            "CAM01_1_0001_notadate_1.jpg",
        ]));
        assert_eq!(map.len(), 1);
        assert_eq!(map.values().next().unwrap().len(), 1);
    }

    #[test]
    fn test_recursive_scan_skips_staging() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join(".staging");
        fs::create_dir_all(tmp.path().join("cam1")).unwrap();
        fs::create_dir_all(&staging).unwrap();
        fs::write(tmp.path().join("cam1").join("CAM01_1_0001_20150603183804_1.jpg"), b"x").unwrap();
        fs::write(staging.join("CAM01_1_0001_20150603191500_2.jpg"), b"x").unwrap();

        let g = SegmentGrouper::new(&CamrollConfig {
            source_dir: tmp.path().to_path_buf(),
            output_dir: PathBuf::from("/out"),
            staging_dir: staging,
            recursive: true,
            ..CamrollConfig::default()
        });
        let map = g.scan().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.values().next().unwrap().len(), 1);
    }

    #[test]
    fn test_scan_is_repeatable_on_same_snapshot() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "CAM01_1_0001_20150603191500_1000.jpg",
            "CAM01_1_0001_20150603183804_9999.JPG",
            "CAM02_1_0001_20150603183804_9999.jpg",
            "bad.jpg",
            "notes.txt",
        ] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }

        let g = grouper(tmp.path(), DateFormat::Compact);
        let first = g.scan().unwrap();
        let second = g.scan().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        for segment in first.values() {
            let sorted = segment.frames.windows(2).all(|w| w[0].path <= w[1].path);
            assert!(sorted, "frames must be sorted by path");
        }
    }
}
