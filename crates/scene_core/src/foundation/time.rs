//! Time management utilities

use std::time::{Duration, Instant};

/// Accumulated time of a fixed-step logic loop
///
/// Every call to [`CycleClock::advance`] adds exactly one cycle duration,
/// independently of the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleClock {
    cycle_duration_us: u64,
    lifetime_us: u64,
    lifetime_ms: u64,
    cycle: u64,
}

impl CycleClock {
    /// Create a clock stepping by `cycle_duration_us` microseconds
    pub const fn new(cycle_duration_us: u64) -> Self {
        Self {
            cycle_duration_us,
            lifetime_us: 0,
            lifetime_ms: 0,
            cycle: 0,
        }
    }

    /// Advance both lifetime counters by one cycle duration
    pub fn advance(&mut self) {
        self.lifetime_us += self.cycle_duration_us;
        self.lifetime_ms += self.cycle_duration_us / 1000;
    }

    /// Increment the cycle counter
    pub fn next_cycle(&mut self) {
        self.cycle += 1;
    }

    /// Duration of one cycle in microseconds
    pub const fn cycle_duration_us(&self) -> u64 {
        self.cycle_duration_us
    }

    /// Duration of one cycle in seconds
    #[allow(clippy::cast_precision_loss)]
    pub fn cycle_duration_secs(&self) -> f32 {
        self.cycle_duration_us as f32 / 1_000_000.0
    }

    /// Total simulated time in microseconds
    pub const fn lifetime_us(&self) -> u64 {
        self.lifetime_us
    }

    /// Total simulated time in milliseconds
    pub const fn lifetime_ms(&self) -> u64 {
        self.lifetime_ms
    }

    /// Number of completed cycles
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// Simple stopwatch for measuring elapsed wall time
#[derive(Debug, Default)]
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and start a stopwatch
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start or resume measuring
    pub fn start(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
    }

    /// Stop measuring and keep the accumulated time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Reset to a stopped, zero state
    pub fn reset(&mut self) {
        self.start_time = None;
        self.elapsed = Duration::ZERO;
    }

    /// Total measured time, including a running interval
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map_or(self.elapsed, |start| self.elapsed + start.elapsed())
    }

    /// Whether the stopwatch is currently running
    pub const fn is_running(&self) -> bool {
        self.start_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_clock_advances_fixed_step() {
        let mut clock = CycleClock::new(16_666);
        for _ in 0..3 {
            clock.advance();
            clock.next_cycle();
        }

        assert_eq!(clock.cycle(), 3);
        assert_eq!(clock.lifetime_us(), 49_998);
        assert_eq!(clock.lifetime_ms(), 48);
    }

    #[test]
    fn test_stopwatch_stop_keeps_elapsed() {
        let mut stopwatch = Stopwatch::start_new();
        assert!(stopwatch.is_running());
        stopwatch.stop();
        let frozen = stopwatch.elapsed();

        assert!(!stopwatch.is_running());
        assert_eq!(stopwatch.elapsed(), frozen);

        stopwatch.reset();
        assert_eq!(stopwatch.elapsed(), Duration::ZERO);
    }
}
