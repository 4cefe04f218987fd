//! Throughput and ETA tracking for long upload runs
//!
//! The tracker keeps two estimates: a short sliding window of instantaneous
//! rates (records/second) for the "how fast right now" figure, and a running
//! average duration per record for projecting time remaining. Records skipped
//! below the resume point bump the count but never feed the average.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Default number of samples in the rate window
pub const DEFAULT_WINDOW: usize = 10;

/// Reported in place of a rate until the window has filled
pub const RATE_UNKNOWN: f64 = 9999.9;

/// Shortest duration fed into the rate window, to keep 1/duration finite
const MIN_SAMPLE_SECS: f64 = 1e-6;

/// Time remaining for a run, as a duration and a wall-clock finish
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub remaining: Duration,
    pub eta: DateTime<Local>,
}

impl Projection {
    /// Remaining time as `h:mm:ss`
    pub fn remaining_hms(&self) -> String {
        let secs = self.remaining.as_secs();
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Per-run progress accumulator
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    count: usize,
    resume_at: usize,
    target: usize,
    window: VecDeque<f64>,
    window_size: usize,
    samples: usize,
    average_duration: f64,
}

impl ProgressTracker {
    pub fn new(target: usize, resume_at: usize) -> Self {
        Self::with_window(target, resume_at, DEFAULT_WINDOW)
    }

    pub fn with_window(target: usize, resume_at: usize, window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            count: 0,
            resume_at,
            target,
            window: VecDeque::with_capacity(window_size),
            window_size,
            samples: 0,
            average_duration: 0.0,
        }
    }

    /// Records counted so far, skipped ones included
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn resume_at(&self) -> usize {
        self.resume_at
    }

    /// True while `current_count` is still below the resume point
    pub fn should_skip(current_count: usize, resume_at: usize) -> bool {
        current_count < resume_at
    }

    /// Whether the next record falls in the resume region
    pub fn skipping(&self) -> bool {
        Self::should_skip(self.count, self.resume_at)
    }

    /// Count a record without timing it (resume region)
    pub fn skip(&mut self) {
        self.count += 1;
    }

    /// Count a processed record and fold its duration into the estimates
    pub fn record_iteration(&mut self, duration: Duration) {
        self.count += 1;

        let secs = duration.as_secs_f64();
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(1.0 / secs.max(MIN_SAMPLE_SECS));
        self.samples += 1;

        let effective_count = self.count.saturating_sub(self.resume_at).max(1);
        self.average_duration += (secs - self.average_duration) / effective_count as f64;
    }

    /// Running average seconds per processed record
    pub fn average_duration(&self) -> f64 {
        self.average_duration
    }

    /// Mean rate over the window, or [`RATE_UNKNOWN`] until it has more than
    /// a window's worth of samples
    pub fn rate(&self) -> f64 {
        if self.samples <= self.window_size {
            return RATE_UNKNOWN;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Project time remaining from `current_count` to `target_count`
    pub fn project_remaining(&self, current_count: usize, target_count: usize) -> Projection {
        let remaining_records = target_count.saturating_sub(current_count);
        let remaining = Duration::from_secs_f64(
            (remaining_records as f64 * self.average_duration).max(0.0),
        );
        let eta = Local::now()
            + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());
        Projection { remaining, eta }
    }

    /// Projection for this tracker's own count and target
    pub fn projection(&self) -> Projection {
        self.project_remaining(self.count, self.target)
    }

    pub fn percent(&self) -> f64 {
        if self.target == 0 {
            return 100.0;
        }
        self.count as f64 * 100.0 / self.target as f64
    }

    /// Snapshot for logging
    pub fn report(&self) -> ProgressReport {
        ProgressReport {
            count: self.count,
            target: self.target,
            percent: self.percent(),
            rate: self.rate(),
            projection: self.projection(),
        }
    }
}

/// One progress line: `{count}/{target} ({percent}) rate={rate} ETA={h}:{m}:{s}`
#[derive(Debug, Clone, Copy)]
pub struct ProgressReport {
    pub count: usize,
    pub target: usize,
    pub percent: f64,
    pub rate: f64,
    pub projection: Projection,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.1}%) rate={:.4} ETA={} | {}",
            self.count,
            self.target,
            self.percent,
            self.rate,
            self.projection.remaining_hms(),
            self.projection.eta.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
