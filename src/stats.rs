use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Throughput counters shared by all dispatch lanes
pub struct PredictStats {
    pub predictions: AtomicU64,
    pub start_time: Instant,
}

impl PredictStats {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Completed prediction count
    pub fn completed(&self) -> u64 {
        self.predictions.load(Ordering::Relaxed)
    }

    /// Add a worker's local batch to the shared counter
    pub fn add(&self, count: u64) {
        self.predictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Elapsed wall time since construction
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Cumulative throughput (addresses/sec)
    pub fn rate(&self) -> f64 {
        let completed = self.completed() as f64;
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            completed / elapsed
        } else {
            0.0
        }
    }

    /// Cumulative throughput formatted with units
    pub fn format_rate(&self) -> String {
        format!("{} addr/sec", format_speed(self.rate() as u64))
    }
}

impl Default for PredictStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot helper for progress lines: tracks the previous report point and
/// yields (cumulative, instantaneous) throughput
pub struct RateSnapshot {
    last_time: Instant,
    last_count: u64,
}

impl RateSnapshot {
    pub fn new() -> Self {
        Self {
            last_time: Instant::now(),
            last_count: 0,
        }
    }

    pub fn sample(&mut self, stats: &PredictStats) -> (f64, f64) {
        let now = Instant::now();
        let completed = stats.completed();
        let avg = stats.rate();

        let interval = now.duration_since(self.last_time).as_secs_f64();
        let current = if completed > self.last_count && interval > 0.0 {
            (completed - self.last_count) as f64 / interval
        } else {
            avg
        };

        self.last_time = now;
        self.last_count = completed;
        (avg, current)
    }
}

impl Default for RateSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with comma separators
pub fn format_number(n: u64) -> String {
    n.to_string()
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(std::str::from_utf8)
        .collect::<Result<Vec<&str>, _>>()
        .unwrap()
        .join(",")
}

/// Format a rate in human-readable form
pub fn format_speed(speed: u64) -> String {
    if speed >= 1_000_000 {
        format!("{:.2}M", speed as f64 / 1_000_000.0)
    } else if speed >= 1_000 {
        format!("{:.2}K", speed as f64 / 1_000.0)
    } else {
        format!("{}", speed)
    }
}

/// Format a duration as 1.2s / 3m4.5s / 1h2m3.4s
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();

    if total_secs < 60.0 {
        format!("{:.1}s", total_secs)
    } else if total_secs < 3600.0 {
        let mins = (total_secs / 60.0) as u32;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    } else {
        let hours = (total_secs / 3600.0) as u32;
        let mins = ((total_secs % 3600.0) / 60.0) as u32;
        let secs = total_secs % 60.0;
        format!("{}h{}m{:.1}s", hours, mins, secs)
    }
}
