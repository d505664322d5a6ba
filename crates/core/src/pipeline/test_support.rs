//! In-memory collaborators shared by the pipeline tests.
//!
//! `FakeWriter` and `FakeReader` agree on a tiny container format so the
//! append-then-recover cycle can be exercised without ffmpeg: a magic line
//! followed by `width`, `height` (u32 LE) and raw RGB bytes per frame.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::relocation::domain::file_mover::FileMover;
use crate::relocation::domain::lock_inspector::{LockInspector, LockReport};
use crate::relocation::domain::sleeper::Sleeper;
use crate::shared::config::CamrollConfig;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_decoder::ImageDecoder;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

const MAGIC: &[u8] = b"FAKEVID\n";

pub struct FakeReader {
    frames: Vec<Frame>,
}

impl FakeReader {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }
}

impl VideoReader for FakeReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let bytes = fs::read(path)?;
        let mut rest = bytes.strip_prefix(MAGIC).ok_or("not a video")?;
        self.frames.clear();
        while !rest.is_empty() {
            if rest.len() < 8 {
                return Err("truncated header".into());
            }
            let w = u32::from_le_bytes(rest[0..4].try_into()?);
            let h = u32::from_le_bytes(rest[4..8].try_into()?);
            let len = (w * h * 3) as usize;
            if rest.len() < 8 + len {
                return Err("truncated frame".into());
            }
            let index = self.frames.len();
            self.frames
                .push(Frame::new(rest[8..8 + len].to_vec(), w, h, 3, index));
            rest = &rest[8 + len..];
        }
        let (width, height) = self.frames.first().map_or((0, 0), |f| f.dimensions());
        let mut metadata = VideoMetadata::for_output(width, height, 3.0, "fake");
        metadata.total_frames = self.frames.len();
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        Box::new(self.frames.drain(..).map(Ok))
    }

    fn close(&mut self) {
        self.frames.clear();
    }
}

#[derive(Clone, Default)]
pub struct WriterLog {
    pub opened: Arc<Mutex<Vec<(PathBuf, VideoMetadata)>>>,
    pub written: Arc<Mutex<Vec<Frame>>>,
    pub closed: Arc<Mutex<usize>>,
}

pub struct FakeWriter {
    file: Option<File>,
    fail_open: bool,
    fail_on: Option<usize>,
    writes: usize,
    log: WriterLog,
}

impl FakeWriter {
    pub fn new(log: WriterLog) -> Self {
        Self {
            file: None,
            fail_open: false,
            fail_on: None,
            writes: 0,
            log,
        }
    }

    pub fn failing_open(log: WriterLog) -> Self {
        Self {
            fail_open: true,
            ..Self::new(log)
        }
    }

    /// Rejects the `n`th (0-based) frame written, without writing it.
    pub fn failing_on(log: WriterLog, n: usize) -> Self {
        Self {
            fail_on: Some(n),
            ..Self::new(log)
        }
    }
}

impl VideoWriter for FakeWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.fail_open {
            return Err("encoder unavailable".into());
        }
        let mut file = File::create(path)?;
        file.write_all(MAGIC)?;
        self.file = Some(file);
        self.log
            .opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), metadata.clone()));
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let file = self.file.as_mut().ok_or("writer not open")?;
        let index = self.writes;
        self.writes += 1;
        if self.fail_on == Some(index) {
            return Err(format!("encoder rejected frame {index}").into());
        }
        file.write_all(&frame.width().to_le_bytes())?;
        file.write_all(&frame.height().to_le_bytes())?;
        file.write_all(frame.data())?;
        self.log.written.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        *self.log.closed.lock().unwrap() += 1;
        Ok(())
    }
}

/// "Decodes" a still by filling a `width` x `height` raster with its first
/// byte. Files starting with `bad` fail.
pub struct FakeDecoder {
    pub width: u32,
    pub height: u32,
}

impl ImageDecoder for FakeDecoder {
    fn decode(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let bytes = fs::read(path)?;
        if bytes.starts_with(b"bad") {
            return Err("corrupt JPEG".into());
        }
        let fill = bytes.first().copied().unwrap_or(0);
        let len = (self.width * self.height * 3) as usize;
        Ok(Frame::new(vec![fill; len], self.width, self.height, 3, 0))
    }
}

pub struct RecordingAnnotator {
    pub labels: Arc<Mutex<Vec<String>>>,
}

impl FrameAnnotator for RecordingAnnotator {
    fn annotate(&self, _frame: &mut Frame, label: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.labels.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

pub struct FailingAnnotator;

impl FrameAnnotator for FailingAnnotator {
    fn annotate(&self, _frame: &mut Frame, _label: &str) -> Result<(), Box<dyn std::error::Error>> {
        Err("no font".into())
    }
}

/// A backup target that never accepts a file, like a full or read-only disk.
pub struct RefusingMover;

impl FileMover for RefusingMover {
    fn move_file(&self, _from: &Path, _to: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }
}

pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: std::time::Duration) {}
}

pub struct NoInspector;

impl LockInspector for NoInspector {
    fn inspect(&self, _path: &Path) -> LockReport {
        LockReport::Unknown
    }
}

/// Real directories for source, output, backup and staging.
pub struct Dirs {
    pub _tmp: tempfile::TempDir,
    pub config: CamrollConfig,
}

impl Dirs {
    pub fn new() -> Self {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        for dir in ["jpeg", "mp4", "backup", "log"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        let config = CamrollConfig {
            source_dir: root.join("jpeg"),
            output_dir: root.join("mp4"),
            backup_dir: root.join("backup"),
            log_dir: root.join("log"),
            staging_retry_ms: 1,
            staging_max_retry_ms: 1,
            ..CamrollConfig::default()
        }
        .validate()
        .unwrap();
        Self { _tmp: tmp, config }
    }

    pub fn drop_image(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.config.source_dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn backup(&self, bucket: &str, name: &str) -> PathBuf {
        self.config.backup_dir.join(bucket).join(name)
    }
}
