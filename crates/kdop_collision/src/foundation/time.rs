//! Time measurement for build and query profiling

use std::time::{Duration, Instant};

/// Accumulating stopwatch
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
    laps: u32,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub const fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
            laps: 0,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start (or resume) the stopwatch
    pub fn start(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
    }

    /// Stop the stopwatch, accumulating the running interval as one lap
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
            self.laps += 1;
        }
    }

    /// Time `f`, adding its duration as one lap
    pub fn measure<T>(&mut self, f: impl FnOnce() -> T) -> T {
        self.start();
        let value = f();
        self.stop();
        value
    }

    /// Total elapsed time including a running interval
    pub fn elapsed(&self) -> Duration {
        self.elapsed + self.start_time.map_or(Duration::ZERO, |start| start.elapsed())
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }

    /// Mean lap duration in microseconds, zero before the first lap
    pub fn mean_lap_micros(&self) -> f32 {
        if self.laps == 0 {
            0.0
        } else {
            self.elapsed.as_secs_f32() * 1.0e6 / self.laps as f32
        }
    }

    /// Number of completed laps
    pub const fn laps(&self) -> u32 {
        self.laps
    }
}
