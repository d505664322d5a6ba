use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::LevelFilter;

use camroll_core::annotation::infrastructure::label_annotator::LabelAnnotator;
use camroll_core::pipeline::append_segment_use_case::{AppendSegmentUseCase, AppendSettings};
use camroll_core::pipeline::infrastructure::directory_watcher::DirectoryWatcher;
use camroll_core::pipeline::infrastructure::pass_scheduler::PassScheduler;
use camroll_core::pipeline::pipeline_driver::{PassReport, PipelineDriver};
use camroll_core::pipeline::pipeline_logger::SummaryPipelineLogger;
use camroll_core::relocation::backup_relocator::{BackupRelocator, CollisionPolicy};
use camroll_core::relocation::domain::sleeper::ThreadSleeper;
use camroll_core::relocation::infrastructure::fs_file_mover::FsFileMover;
use camroll_core::relocation::infrastructure::proc_lock_inspector::platform_lock_inspector;
use camroll_core::relocation::staging_queue::StagingQueue;
use camroll_core::segment::domain::segment_key::DateFormat;
use camroll_core::segment::segment_grouper::SegmentGrouper;
use camroll_core::shared::config::{CamrollConfig, DimensionPolicy};
use camroll_core::shared::daily_log::DailyFileLogger;
use camroll_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use camroll_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use camroll_core::video::infrastructure::image_file_decoder::ImageFileDecoder;

/// Appends camera stills to per-segment videos and backs up the originals.
#[derive(Parser)]
#[command(name = "camroll")]
struct Cli {
    /// JSON config file (default: <config dir>/camroll/config.json if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory cameras drop stills into.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Directory holding the segment videos.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Root of the date-bucketed backup tree.
    #[arg(long)]
    backup: Option<PathBuf>,

    /// Private staging directory (default: <source>/.staging).
    #[arg(long)]
    staging: Option<PathBuf>,

    /// Directory for the daily log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Scan subdirectories of the source directory too.
    #[arg(long)]
    recursive: bool,

    /// Fixed output size as WIDTHxHEIGHT (default: size of the first frame).
    #[arg(long, value_parser = parse_size)]
    size: Option<(u32, u32)>,

    /// Date rendering in output names and backup buckets: compact or dashed.
    #[arg(long)]
    date_format: Option<String>,

    /// Backup name clash handling: overwrite or unique-suffix.
    #[arg(long)]
    collision: Option<String>,

    /// Keep running and process new stills as they arrive (quit with 'q').
    #[arg(long)]
    watch: bool,
}

fn main() {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = DailyFileLogger::new(&config.log_dir, LevelFilter::Info).init() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    if let Err(e) = run(config, cli.watch) {
        log::error!("{e}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<CamrollConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => CamrollConfig::load(path)?,
        None => match CamrollConfig::default_path().filter(|p| p.is_file()) {
            Some(path) => CamrollConfig::load(&path)?,
            None => CamrollConfig::default(),
        },
    };

    if let Some(dir) = &cli.source {
        config.source_dir = dir.clone();
    }
    if let Some(dir) = &cli.output {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &cli.backup {
        config.backup_dir = dir.clone();
    }
    if let Some(dir) = &cli.staging {
        config.staging_dir = dir.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.clone();
    }
    if cli.recursive {
        config.recursive = true;
    }
    if let Some((width, height)) = cli.size {
        config.dimensions = DimensionPolicy::Fixed { width, height };
    }
    if let Some(format) = &cli.date_format {
        config.date_format = parse_date_format(format)?;
    }
    if let Some(policy) = &cli.collision {
        config.collision_policy = parse_collision(policy)?;
    }

    Ok(config.validate()?)
}

fn run(config: CamrollConfig, watch: bool) -> Result<(), Box<dyn std::error::Error>> {
    let driver = Arc::new(build_driver(&config));

    log::info!("Processing {}", config.source_dir.display());
    let report = driver.run_pass(&mut SummaryPipelineLogger::default());
    log_report(&report);

    if !watch {
        return Ok(());
    }

    let pass_driver = driver.clone();
    let scheduler = PassScheduler::start(config.watch_debounce(), move || {
        let report = pass_driver.run_pass(&mut SummaryPipelineLogger::default());
        log_report(&report);
    });
    let _watcher = DirectoryWatcher::start(
        &config.source_dir,
        config.recursive,
        config.image_extensions.clone(),
        config.staging_dir.clone(),
        scheduler.trigger(),
    )?;

    eprintln!("Press 'q' and Enter to quit");
    for line in std::io::stdin().lock().lines() {
        if line?.trim().eq_ignore_ascii_case("q") {
            break;
        }
    }

    scheduler.shutdown();
    log::info!("Stopped watching {}", config.source_dir.display());
    Ok(())
}

fn build_driver(config: &CamrollConfig) -> PipelineDriver {
    let staging = StagingQueue::new(
        config,
        Box::new(FsFileMover::new()),
        Box::new(ThreadSleeper),
    );
    let relocator = BackupRelocator::new(
        config,
        Box::new(FsFileMover::new()),
        platform_lock_inspector(),
    );
    let appender = AppendSegmentUseCase::new(
        Box::new(FfmpegReader::new()),
        Box::new(FfmpegWriter::new().with_bit_rate(config.bit_rate)),
        Box::new(ImageFileDecoder::new()),
        Box::new(LabelAnnotator::new()),
        staging,
        relocator,
        AppendSettings::from_config(config),
    );
    PipelineDriver::new(SegmentGrouper::new(config), appender)
}

fn log_report(report: &PassReport) {
    if report.segments == 0 && report.restaged == 0 && report.backed_up_late == 0 {
        log::debug!("Nothing to do");
        return;
    }
    log::info!(
        "Pass done: {} segments ({} aborted), {} frames appended, {} relocated, {} deferred",
        report.segments,
        report.aborted,
        report.appended,
        report.relocated,
        report.deferred
    );
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    Ok((width, height))
}

fn parse_date_format(s: &str) -> Result<DateFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "compact" => Ok(DateFormat::Compact),
        "dashed" => Ok(DateFormat::Dashed),
        other => Err(format!("unknown date format '{other}' (compact, dashed)")),
    }
}

fn parse_collision(s: &str) -> Result<CollisionPolicy, String> {
    match s.to_ascii_lowercase().replace('-', "_").as_str() {
        "overwrite" => Ok(CollisionPolicy::Overwrite),
        "unique_suffix" => Ok(CollisionPolicy::UniqueSuffix),
        other => Err(format!(
            "unknown collision policy '{other}' (overwrite, unique-suffix)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x480"), Ok((640, 480)));
        assert_eq!(parse_size("1280X720"), Ok((1280, 720)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("ax480").is_err());
    }

    #[test]
    fn test_parse_policies() {
        assert_eq!(parse_date_format("Dashed"), Ok(DateFormat::Dashed));
        assert!(parse_date_format("iso").is_err());
        assert_eq!(
            parse_collision("unique-suffix"),
            Ok(CollisionPolicy::UniqueSuffix)
        );
        assert_eq!(parse_collision("overwrite"), Ok(CollisionPolicy::Overwrite));
        assert!(parse_collision("rename").is_err());
    }

    #[test]
    fn test_cli_flags_parse() {
        let cli = Cli::try_parse_from([
            "camroll",
            "--source",
            "/in",
            "--size",
            "640x480",
            "--collision",
            "overwrite",
            "--watch",
        ])
        .unwrap();
        assert_eq!(cli.source, Some(PathBuf::from("/in")));
        assert_eq!(cli.size, Some((640, 480)));
        assert!(cli.watch);
        assert!(!cli.recursive);
    }
}
