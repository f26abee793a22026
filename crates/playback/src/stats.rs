//! Buffer health counters and underrun reporting.
//!
//! Counters saturate instead of wrapping; a long-running player must never
//! panic on a statistics update.

use embassy_time::{Duration, Instant};

/// Why the buffer manager entered the underrun path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnderrunCause {
    /// The sample store could not fill a hardware buffer.
    Starved,
    /// Every read attempt of a replenishment returned no data.
    SourceExhausted,
    /// The rate converter needed more scratch space than available.
    ScratchExhausted,
}

/// Snapshot handed to an [`UnderrunObserver`] after each underrun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnderrunReport {
    /// What triggered it
    pub cause: UnderrunCause,
    /// Total underruns so far, this one included
    pub count: u32,
    /// Samples replaced by silence in this underrun
    pub samples_lost: u32,
    /// Time spent in the underrun handler
    pub recovery_time: Duration,
}

/// Receives underrun notifications (e.g. to surface a UI glitch counter).
pub trait UnderrunObserver {
    /// Called once per underrun, after recovery was attempted.
    fn on_underrun(&self, report: &UnderrunReport);
}

/// Upstream read timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadTiming {
    /// Reads that returned data
    pub reads: u32,
    /// Bytes delivered by those reads
    pub bytes: u64,
    /// Duration of the most recent read
    pub last: Duration,
    /// Slowest read so far
    pub max: Duration,
    /// Sum of all read durations
    pub total: Duration,
}

impl ReadTiming {
    /// Record one read of `bytes` taking `elapsed`.
    pub fn record(&mut self, bytes: usize, elapsed: Duration) {
        self.reads = self.reads.saturating_add(1);
        self.bytes = self.bytes.saturating_add(bytes as u64);
        self.last = elapsed;
        if elapsed > self.max {
            self.max = elapsed;
        }
        self.total = Duration::from_ticks(self.total.as_ticks().saturating_add(elapsed.as_ticks()));
    }

    /// Mean read duration, zero before the first read.
    pub fn average(&self) -> Duration {
        self.total
            .as_ticks()
            .checked_div(u64::from(self.reads))
            .map_or(Duration::from_ticks(0), Duration::from_ticks)
    }
}

impl Default for ReadTiming {
    fn default() -> Self {
        Self {
            reads: 0,
            bytes: 0,
            last: Duration::from_ticks(0),
            max: Duration::from_ticks(0),
            total: Duration::from_ticks(0),
        }
    }
}

/// Buffer manager statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferStats {
    /// Underrun events
    pub underruns: u32,
    /// Replenishments that gave up after all retries
    pub retry_exhaustions: u32,
    /// Reads that returned an error
    pub read_errors: u32,
    /// Hardware buffer fills that failed
    pub fill_failures: u32,
    /// Returns from `Underrun` to `Playing`
    pub recoveries: u32,
    /// Samples handed to the sink since start or last gapless switch
    pub samples_played: u64,
    /// Source samples consumed from the store
    pub samples_processed: u64,
    /// Completed gapless/crossfade transitions
    pub successful_transitions: u32,
    /// Time of the most recent underrun
    pub last_underrun: Option<Instant>,
    /// Samples replaced by silence, summed over every underrun
    pub samples_lost: u32,
    /// Time the most recent underrun handler took
    pub last_recovery_time: Option<Duration>,
    /// Upstream read timing
    pub read_timing: ReadTiming,
}

impl BufferStats {
    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Add `n` samples to the played counter.
    pub fn add_played(&mut self, n: usize) {
        self.samples_played = self.samples_played.saturating_add(n as u64);
    }

    /// Add `n` samples to the processed counter.
    pub fn add_processed(&mut self, n: usize) {
        self.samples_processed = self.samples_processed.saturating_add(n as u64);
    }
}

impl Default for BufferStats {
    fn default() -> Self {
        Self {
            underruns: 0,
            retry_exhaustions: 0,
            read_errors: 0,
            fill_failures: 0,
            recoveries: 0,
            samples_played: 0,
            samples_processed: 0,
            successful_transitions: 0,
            last_underrun: None,
            samples_lost: 0,
            last_recovery_time: None,
            read_timing: ReadTiming::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn read_timing_tracks_max_and_average() {
        let mut t = ReadTiming::default();
        assert_eq!(t.average(), Duration::from_ticks(0));
        t.record(100, Duration::from_ticks(10));
        t.record(50, Duration::from_ticks(30));
        assert_eq!(t.reads, 2);
        assert_eq!(t.bytes, 150);
        assert_eq!(t.max, Duration::from_ticks(30));
        assert_eq!(t.last, Duration::from_ticks(30));
        assert_eq!(t.average(), Duration::from_ticks(20));
    }

    #[test]
    fn counters_saturate() {
        let mut s = BufferStats {
            samples_played: u64::MAX - 1,
            ..BufferStats::default()
        };
        s.add_played(10);
        assert_eq!(s.samples_played, u64::MAX);
        s.reset();
        assert_eq!(s, BufferStats::default());
    }
}
