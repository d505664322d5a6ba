use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::relocation::backup_relocator::BackupRelocator;
use crate::relocation::staging_queue::StagingQueue;
use crate::segment::domain::segment::Segment;
use crate::segment::domain::segment_key::SourceFrame;
use crate::shared::config::{CamrollConfig, DimensionPolicy};
use crate::shared::constants::PARTIAL_OUTPUT_INFIX;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_decoder::ImageDecoder;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_logger::PipelineLogger;

/// Write-side failures. Each one aborts the current segment only; the
/// previous output (if any) stays untouched.
#[derive(Error, Debug)]
pub enum AppendError {
    #[error("cannot open {path} for writing: {message}")]
    Open { path: PathBuf, message: String },
    #[error("failed to finish {path}: {message}")]
    Close { path: PathBuf, message: String },
    #[error("failed to replace {to} with {from}: {source}")]
    Finalize {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Encoding parameters shared by every segment of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendSettings {
    pub dimensions: DimensionPolicy,
    pub frame_rate: f64,
    pub codec: String,
}

impl AppendSettings {
    pub fn from_config(config: &CamrollConfig) -> Self {
        Self {
            dimensions: config.dimensions,
            frame_rate: config.frame_rate,
            codec: config.codec.clone(),
        }
    }

    /// Output size given the first frame that will be written.
    ///
    /// Odd sizes are rounded down since 4:2:0 encoders reject them.
    fn resolve(&self, first: (u32, u32)) -> (u32, u32) {
        match self.dimensions {
            DimensionPolicy::Fixed { width, height } => (width, height),
            DimensionPolicy::FirstFrame => ((first.0 & !1).max(2), (first.1 & !1).max(2)),
        }
    }
}

/// What happened to one segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendReport {
    /// Frames carried over from the previous output.
    pub recovered: usize,
    pub appended: usize,
    pub decode_failures: usize,
    pub write_failures: usize,
    pub relocated: usize,
    pub relocation_failures: usize,
    /// Inputs left in the source directory for a later pass (empty, vanished
    /// or never released by their producer).
    pub deferred: usize,
    /// Whether the output file was rewritten.
    pub rewritten: bool,
}

/// Appends the new stills of one segment to its video.
///
/// Videos cannot be appended to in place, so every call decodes the whole
/// existing output into memory, re-encodes it into a sibling partial file
/// followed by the new (annotated) frames, and renames that over the output.
/// A segment with a long history therefore costs memory proportional to its
/// full length.
///
/// Every staged still ends in the backup directory, whether or not it could
/// be decoded or encoded. When the backup move fails the still stays in
/// staging and its move is retried on later passes; it is never encoded a
/// second time.
pub struct AppendSegmentUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    decoder: Box<dyn ImageDecoder>,
    annotator: Box<dyn FrameAnnotator>,
    staging: StagingQueue,
    relocator: BackupRelocator,
    settings: AppendSettings,
    /// Consumed stills whose backup move failed, with their staged path.
    unrelocated: Vec<(SourceFrame, PathBuf)>,
}

/// Writer state for one segment. Opened lazily on the first frame so the
/// size can come from that frame.
struct OpenOutput {
    partial: PathBuf,
    width: u32,
    height: u32,
}

impl AppendSegmentUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        decoder: Box<dyn ImageDecoder>,
        annotator: Box<dyn FrameAnnotator>,
        staging: StagingQueue,
        relocator: BackupRelocator,
        settings: AppendSettings,
    ) -> Self {
        Self {
            reader,
            writer,
            decoder,
            annotator,
            staging,
            relocator,
            settings,
            unrelocated: Vec::new(),
        }
    }

    pub fn staging(&self) -> &StagingQueue {
        &self.staging
    }

    /// Stills already encoded but still waiting for their backup move.
    pub fn unrelocated(&self) -> usize {
        self.unrelocated.len()
    }

    /// Retries the backup move of every consumed still that failed to move
    /// before. Returns how many made it.
    pub fn retry_relocations(&mut self) -> usize {
        let pending = std::mem::take(&mut self.unrelocated);
        let mut relocated = 0;
        for (frame, staged) in pending {
            if !staged.exists() {
                log::warn!(
                    "{} left staging before its backup, dropping it",
                    staged.display()
                );
                continue;
            }
            match self.relocator.relocate(&frame, &staged) {
                Ok(target) => {
                    log::info!("Backed up {} to {}", frame.file_name(), target.display());
                    relocated += 1;
                }
                Err(_) => self.unrelocated.push((frame, staged)),
            }
        }
        relocated
    }

    /// Returns staging leftovers to `source_dir`, except stills already
    /// encoded that only wait for their backup.
    pub fn recover_staged(&self, source_dir: &Path) -> usize {
        let keep: Vec<PathBuf> = self
            .unrelocated
            .iter()
            .map(|(_, staged)| staged.clone())
            .collect();
        self.staging.recover_into(source_dir, &keep)
    }

    pub fn execute(
        &mut self,
        segment: &Segment,
        logger: &mut dyn PipelineLogger,
    ) -> Result<AppendReport, AppendError> {
        let mut report = AppendReport::default();

        let pending: Vec<&SourceFrame> = segment
            .frames
            .iter()
            .filter(|frame| {
                let ready = is_ready(&frame.path);
                if !ready {
                    report.deferred += 1;
                }
                ready
            })
            .collect();
        if pending.is_empty() {
            return Ok(report);
        }

        let output_path = &segment.output_path;
        let start = Instant::now();
        let recovered = self.recover(output_path);
        logger.timing("recover", start.elapsed().as_secs_f64() * 1000.0);
        report.recovered = recovered.len();

        let mut output: Option<OpenOutput> = None;
        let mut written = 0usize;

        for frame in recovered {
            if output.is_none() {
                output = Some(self.open_output(output_path, frame.dimensions())?);
            }
            let Some(open) = &output else { break };
            match self.write_conformed(open, frame) {
                Ok(()) => written += 1,
                Err(e) => {
                    log::warn!(
                        "Failed to rewrite recovered frame to {}: {e}",
                        output_path.display()
                    );
                    report.write_failures += 1;
                }
            }
        }

        for source in pending {
            let staged = match self.staging.stage(&source.path) {
                Ok(staged) => staged,
                Err(e) => {
                    log::warn!("Skipped {} for now: {e}", source.path.display());
                    report.deferred += 1;
                    continue;
                }
            };

            let name = source.file_name();
            let start = Instant::now();
            match self.decoder.decode(&staged) {
                Err(e) => {
                    log::error!(
                        "{name} > {} > FAILED: cannot decode: {e}",
                        output_path.display()
                    );
                    report.decode_failures += 1;
                }
                Ok(mut frame) => {
                    if output.is_none() {
                        match self.open_output(output_path, frame.dimensions()) {
                            Ok(open) => output = Some(open),
                            Err(e) => {
                                if let Err(release) = self.staging.release(&staged, &source.path) {
                                    log::error!(
                                        "Failed to return {} to {}: {release}",
                                        staged.display(),
                                        source.path.display()
                                    );
                                }
                                return Err(e);
                            }
                        }
                    }
                    if let Some(open) = &output {
                        if let Err(e) = self.annotator.annotate(&mut frame, &name) {
                            log::warn!("Writing {name} without label: {e}");
                        }
                        match self.write_conformed(open, frame) {
                            Ok(()) => {
                                log::info!("{name} > {} > OK", output_path.display());
                                written += 1;
                                report.appended += 1;
                            }
                            Err(e) => {
                                log::error!("{name} > {} > FAILED: {e}", output_path.display());
                                report.write_failures += 1;
                            }
                        }
                    }
                }
            }
            logger.timing("encode", start.elapsed().as_secs_f64() * 1000.0);

            let start = Instant::now();
            match self.relocator.relocate(source, &staged) {
                Ok(_) => report.relocated += 1,
                Err(_) => {
                    log::warn!("Keeping {name} in staging until its backup succeeds");
                    report.relocation_failures += 1;
                    self.unrelocated.push((source.clone(), staged));
                }
            }
            logger.timing("relocate", start.elapsed().as_secs_f64() * 1000.0);
        }

        if let Some(open) = output {
            self.finish(&open, output_path)?;
            log::info!("Written {written} frames back to {}", output_path.display());
            report.rewritten = true;
        }

        logger.metric("recovered_frames", report.recovered as f64);
        logger.metric("appended_frames", report.appended as f64);
        logger.metric("decode_failures", report.decode_failures as f64);
        logger.metric("relocated", report.relocated as f64);
        Ok(report)
    }

    /// Reads every frame of an existing output. A file that cannot be opened
    /// is treated as damaged and discarded; a read error part-way keeps the
    /// frames decoded so far.
    fn recover(&mut self, output_path: &Path) -> Vec<Frame> {
        if !output_path.exists() {
            return Vec::new();
        }

        if let Err(e) = self.reader.open(output_path) {
            log::warn!(
                "Discarding damaged output {}: {e}",
                output_path.display()
            );
            return Vec::new();
        }

        let mut frames = Vec::new();
        for result in self.reader.frames() {
            match result {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    log::warn!(
                        "Stopped reading {} after {} frames: {e}",
                        output_path.display(),
                        frames.len()
                    );
                    break;
                }
            }
        }
        self.reader.close();

        log::info!("Read {} frames from {}", frames.len(), output_path.display());
        frames
    }

    fn open_output(
        &mut self,
        output_path: &Path,
        first: (u32, u32),
    ) -> Result<OpenOutput, AppendError> {
        let (width, height) = self.settings.resolve(first);
        let partial = partial_path(output_path);
        let metadata = VideoMetadata::for_output(
            width,
            height,
            self.settings.frame_rate,
            &self.settings.codec,
        );
        if let Err(e) = self.writer.open(&partial, &metadata) {
            let _ = fs::remove_file(&partial);
            log::error!("Cannot open {} for writing: {e}", output_path.display());
            return Err(AppendError::Open {
                path: output_path.to_path_buf(),
                message: e.to_string(),
            });
        }
        Ok(OpenOutput {
            partial,
            width,
            height,
        })
    }

    fn write_conformed(
        &mut self,
        open: &OpenOutput,
        frame: Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if frame.dimensions() == (open.width, open.height) {
            return self.writer.write(&frame);
        }
        log::warn!(
            "Scaling {}x{} frame to {}x{}",
            frame.width(),
            frame.height(),
            open.width,
            open.height
        );
        let scaled = frame
            .resized(open.width, open.height)
            .ok_or("frame cannot be scaled")?;
        self.writer.write(&scaled)
    }

    fn finish(&mut self, open: &OpenOutput, output_path: &Path) -> Result<(), AppendError> {
        if let Err(e) = self.writer.close() {
            let _ = fs::remove_file(&open.partial);
            log::error!("Failed to finish {}: {e}", output_path.display());
            return Err(AppendError::Close {
                path: output_path.to_path_buf(),
                message: e.to_string(),
            });
        }
        fs::rename(&open.partial, output_path).map_err(|source| {
            log::error!(
                "Failed to replace {} with {}: {source}",
                output_path.display(),
                open.partial.display()
            );
            AppendError::Finalize {
                from: open.partial.clone(),
                to: output_path.to_path_buf(),
                source,
            }
        })
    }
}

/// `dir/x.mp4` -> `dir/x.partial.mp4` (the extension is kept so the muxer
/// still picks the right container).
pub fn partial_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output_path.extension() {
        Some(ext) => format!("{stem}.{PARTIAL_OUTPUT_INFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{PARTIAL_OUTPUT_INFIX}"),
    };
    output_path.with_file_name(name)
}

/// Zero-length files are still being created by their producer.
fn is_ready(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => true,
        Ok(_) => {
            log::debug!("Skipping empty {}", path.display());
            false
        }
        Err(e) => {
            log::debug!("Skipping {}: {e}", path.display());
            false
        }
    }
}
