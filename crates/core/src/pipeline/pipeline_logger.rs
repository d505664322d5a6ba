use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting observer for pipeline passes.
///
/// Use cases report progress, stage timings and counters here instead of
/// formatting their own summaries, so the CLI, the watcher and tests can
/// each decide what to do with them.
pub trait PipelineLogger: Send {
    /// Report segment-level progress within a pass.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took (e.g. `recover`, `encode`).
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Add to a named counter (e.g. `appended_frames`).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-pass summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Collects stage timings and counters for one pass and logs a summary
/// through the `log` facade when the pass ends.
///
/// Progress lines are throttled to every `throttle_segments` segments.
pub struct SummaryPipelineLogger {
    throttle_segments: usize,
    timings: HashMap<String, Vec<f64>>,
    counters: HashMap<String, f64>,
    start_time: Instant,
    total_segments: usize,
}

impl SummaryPipelineLogger {
    pub fn new(throttle_segments: usize) -> Self {
        Self {
            throttle_segments: throttle_segments.max(1),
            timings: HashMap::new(),
            counters: HashMap::new(),
            start_time: Instant::now(),
            total_segments: 0,
        }
    }

    /// Returns the formatted summary, or `None` if the pass did nothing.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.counters.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Pass summary ({} segments, {:.1}s total):",
            self.total_segments,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                total_ms / durations.len() as f64
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({} calls)",
                durations.len()
            ));
        }

        let mut names: Vec<_> = self.counters.keys().collect();
        names.sort();
        for name in names {
            lines.push(format!("  {name}: {}", self.counters[name]));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }
}

impl Default for SummaryPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for SummaryPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.total_segments = total;
        if total > 0 && (current % self.throttle_segments == 0 || current == total) {
            log::debug!("Appending segment {current}/{total}");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        *self.counters.entry(name.to_string()).or_default() += value;
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}
