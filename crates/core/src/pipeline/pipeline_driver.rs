use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::segment::domain::segment_key::SegmentKey;
use crate::segment::segment_grouper::SegmentGrouper;

use super::append_segment_use_case::{AppendReport, AppendSegmentUseCase};
use super::pipeline_logger::PipelineLogger;

/// Where the driver currently is within a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Scanning,
    Appending(SegmentKey),
}

/// Totals for one pass over the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub segments: usize,
    /// Segments whose output could not be written.
    pub aborted: usize,
    /// Files moved back from staging before scanning.
    pub restaged: usize,
    /// Stills from earlier passes whose backup move finally succeeded.
    pub backed_up_late: usize,
    pub recovered: usize,
    pub appended: usize,
    pub decode_failures: usize,
    pub write_failures: usize,
    pub relocated: usize,
    pub relocation_failures: usize,
    pub deferred: usize,
}

impl PassReport {
    fn add(&mut self, segment: &AppendReport) {
        self.recovered += segment.recovered;
        self.appended += segment.appended;
        self.decode_failures += segment.decode_failures;
        self.write_failures += segment.write_failures;
        self.relocated += segment.relocated;
        self.relocation_failures += segment.relocation_failures;
        self.deferred += segment.deferred;
    }
}

/// Runs full passes: scan the source directory, then append each segment in
/// turn.
///
/// The appender lives behind the run lock, so at most one pass (and hence
/// one writer per output) runs at a time no matter how many threads ask.
/// No error ends the driver; failures are contained to a file or segment.
pub struct PipelineDriver {
    grouper: SegmentGrouper,
    appender: Mutex<AppendSegmentUseCase>,
    state: Mutex<PassState>,
}

impl PipelineDriver {
    pub fn new(grouper: SegmentGrouper, appender: AppendSegmentUseCase) -> Self {
        Self {
            grouper,
            appender: Mutex::new(appender),
            state: Mutex::new(PassState::Idle),
        }
    }

    pub fn state(&self) -> PassState {
        lock(&self.state).clone()
    }

    /// Runs one pass, waiting for a pass already in progress to finish.
    pub fn run_pass(&self, logger: &mut dyn PipelineLogger) -> PassReport {
        let mut appender = lock(&self.appender);
        self.pass(&mut appender, logger)
    }

    /// Runs one pass unless another is in progress, in which case `None`.
    pub fn try_run_pass(&self, logger: &mut dyn PipelineLogger) -> Option<PassReport> {
        let mut appender = match self.appender.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return None,
        };
        Some(self.pass(&mut appender, logger))
    }

    fn pass(
        &self,
        appender: &mut AppendSegmentUseCase,
        logger: &mut dyn PipelineLogger,
    ) -> PassReport {
        let start = Instant::now();
        let mut report = PassReport::default();
        self.set_state(PassState::Scanning);

        report.backed_up_late = appender.retry_relocations();
        report.restaged = appender.recover_staged(self.grouper.source_dir());

        let segments = match self.grouper.scan() {
            Ok(segments) => segments,
            Err(e) => {
                log::error!(
                    "Failed to scan {}: {e}",
                    self.grouper.source_dir().display()
                );
                self.set_state(PassState::Idle);
                return report;
            }
        };
        logger.timing("scan", start.elapsed().as_secs_f64() * 1000.0);

        let total = segments.len();
        report.segments = total;
        for (i, segment) in segments.values().enumerate() {
            self.set_state(PassState::Appending(segment.key.clone()));
            match appender.execute(segment, logger) {
                Ok(segment_report) => report.add(&segment_report),
                Err(e) => {
                    log::error!("Segment {} aborted: {e}", segment.key);
                    report.aborted += 1;
                }
            }
            logger.progress(i + 1, total);
        }

        self.set_state(PassState::Idle);
        if total > 0 {
            logger.summary();
        }
        report
    }

    fn set_state(&self, state: PassState) {
        *lock(&self.state) = state;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
