use std::collections::{BTreeMap, VecDeque};

/// Keep the most recent ticks only; long sessions would grow without bound
const MAX_SAMPLES: usize = 2_000;

/// Timing measurements for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickTiming {
    pub frame_us: f64,
    pub decode_us: f64,
    pub total_us: f64,
}

impl TickTiming {
    pub fn total_ms(&self) -> f64 {
        self.total_us / 1000.0
    }
}

/// mean, p50, p95, p99
pub type StageSummary = (f64, f64, f64, f64);

/// Per-session statistics: tick latency and which strategy found what
#[derive(Debug, Default)]
pub struct ScanStats {
    timings: VecDeque<TickTiming>,
    ticks: u64,
    hits: BTreeMap<&'static str, u64>,
    emitted: u64,
    suppressed: u64,
    rejected: u64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, timing: TickTiming) {
        if self.timings.len() == MAX_SAMPLES {
            self.timings.pop_front();
        }
        self.timings.push_back(timing);
        self.ticks += 1;
    }

    /// A strategy produced a result
    pub fn record_hit(&mut self, strategy: &'static str) {
        *self.hits.entry(strategy).or_insert(0) += 1;
    }

    pub fn record_emitted(&mut self) {
        self.emitted += 1;
    }

    /// Decoded but still cooling down
    pub fn record_suppressed(&mut self) {
        self.suppressed += 1;
    }

    /// Decoded but failed payload validation
    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn hits(&self, strategy: &str) -> u64 {
        self.hits.get(strategy).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.ticks == 0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Calculate percentile from sorted data
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx]
    }

    fn stage_stats(&self, extract: impl Fn(&TickTiming) -> f64) -> StageSummary {
        if self.timings.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }

        let mut values: Vec<f64> = self.timings.iter().map(extract).collect();
        values.sort_by(f64::total_cmp);

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        (
            mean,
            Self::percentile(&values, 50.0),
            Self::percentile(&values, 95.0),
            Self::percentile(&values, 99.0),
        )
    }

    pub fn total_summary(&self) -> StageSummary {
        self.stage_stats(|t| t.total_us)
    }

    /// Log a session summary
    pub fn log_report(&self) {
        if self.is_empty() {
            tracing::info!("No ticks recorded this session");
            return;
        }

        tracing::info!(
            "Scan session: {} ticks, {} emitted, {} suppressed, {} rejected",
            self.ticks,
            self.emitted,
            self.suppressed,
            self.rejected
        );

        for (name, stats) in [
            ("frame", self.stage_stats(|t| t.frame_us)),
            ("decode", self.stage_stats(|t| t.decode_us)),
            ("total", self.total_summary()),
        ] {
            tracing::info!(
                "  {:<6} mean {:>7.0} µs | p50 {:>7.0} µs | p95 {:>7.0} µs | p99 {:>7.0} µs",
                name,
                stats.0,
                stats.1,
                stats.2,
                stats.3
            );
        }

        for (strategy, count) in &self.hits {
            tracing::info!("  {} decoded {} frame(s)", strategy, count);
        }
    }
}
