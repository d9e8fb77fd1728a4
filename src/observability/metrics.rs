//! Thread-safe metrics collection
//!
//! Atomic counters for pipeline runs, tasks and output files, plus a bounded
//! window of generation durations for latency percentiles.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Generation durations kept for percentile calculation
const MAX_RECORDED_DURATIONS: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Thread-safe metrics collector using atomics and a mutex-protected window
pub struct MetricsCollector {
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,

    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    generation_timeouts: AtomicU64,

    files_written: AtomicU64,
    file_write_failures: AtomicU64,

    // in milliseconds
    generation_times: Mutex<Vec<u64>>,
    started_at: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            generation_timeouts: AtomicU64::new(0),
            files_written: AtomicU64::new(0),
            file_write_failures: AtomicU64::new(0),
            generation_times: Mutex::new(Vec::new()),
            started_at: AtomicU64::new(current_timestamp()),
        }
    }

    // Run metrics
    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    // Task metrics
    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation_timed_out(&self) {
        self.generation_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long one agent call took, successful or not
    pub fn record_generation_time(&self, duration: Duration) {
        if let Ok(mut times) = self.generation_times.lock() {
            times.push(duration.as_millis() as u64);
            if times.len() > MAX_RECORDED_DURATIONS {
                times.remove(0);
            }
        }
    }

    // Output file metrics
    pub fn file_written(&self) {
        self.files_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_write_failed(&self) {
        self.file_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.runs_started,
            &self.runs_completed,
            &self.runs_failed,
            &self.tasks_completed,
            &self.tasks_failed,
            &self.generation_timeouts,
            &self.files_written,
            &self.file_write_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut times) = self.generation_times.lock() {
            times.clear();
        }
        self.started_at
            .store(current_timestamp(), Ordering::Relaxed);
    }

    /// Average and percentiles of recorded generation times (pure function)
    fn generation_statistics(&self) -> GenerationMetrics {
        let mut sorted = self
            .generation_times
            .lock()
            .map(|times| times.clone())
            .unwrap_or_default();
        sorted.sort_unstable();

        let avg_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<u64>() as f64 / sorted.len() as f64
        };

        GenerationMetrics {
            samples: sorted.len(),
            timeouts: self.generation_timeouts.load(Ordering::Relaxed),
            avg_ms,
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
        }
    }

    /// Point-in-time copy of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = current_timestamp();

        MetricsSnapshot {
            runs: RunMetrics {
                started: self.runs_started.load(Ordering::Relaxed),
                completed: self.runs_completed.load(Ordering::Relaxed),
                failed: self.runs_failed.load(Ordering::Relaxed),
            },
            tasks: TaskMetrics {
                completed: self.tasks_completed.load(Ordering::Relaxed),
                failed: self.tasks_failed.load(Ordering::Relaxed),
            },
            files: FileMetrics {
                written: self.files_written.load(Ordering::Relaxed),
                failed: self.file_write_failures.load(Ordering::Relaxed),
            },
            generation: self.generation_statistics(),
            uptime_seconds: now.saturating_sub(self.started_at.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub runs: RunMetrics,
    pub tasks: TaskMetrics,
    pub files: FileMetrics,
    pub generation: GenerationMetrics,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskMetrics {
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMetrics {
    pub written: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetrics {
    pub samples: usize,
    pub timeouts: u64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;

    lower + (upper - lower) * index.fract()
}
