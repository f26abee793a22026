//! Mock implementations for testing
//!
//! Host-side doubles for every platform trait, used by unit and integration
//! tests in this crate and in `playback`.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::arithmetic_side_effects)] // Safety: test doubles; counters never approach usize::MAX
#![allow(clippy::indexing_slicing)] // Safety: slice bounds computed from min(len) below

use crate::audio_types::AttenuationRegister;
use crate::*;

/// Error returned by mocks configured to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum MockError {
    /// Injected failure
    #[error("injected failure")]
    Injected,
}

// ── MockDac ──────────────────────────────────────────────────────────────────

/// Mock DAC recording every control call.
#[derive(Debug, Default)]
pub struct MockDac {
    powered: bool,
    power_up_calls: usize,
    power_down_calls: usize,
    volume: Option<(AttenuationRegister, AttenuationRegister)>,
    clock: Option<(u32, u32)>,
    clock_calls: usize,
    fail_clock: bool,
    fail_power_up: bool,
}

impl MockDac {
    /// Create a powered-down mock DAC.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `configure_clock` fail.
    pub fn fail_clock(&mut self, fail: bool) {
        self.fail_clock = fail;
    }

    /// Make every subsequent `power_up` fail.
    pub fn fail_power_up(&mut self, fail: bool) {
        self.fail_power_up = fail;
    }

    /// Whether the DAC is currently powered.
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Number of `power_up` calls.
    pub fn power_up_calls(&self) -> usize {
        self.power_up_calls
    }

    /// Number of `power_down` calls.
    pub fn power_down_calls(&self) -> usize {
        self.power_down_calls
    }

    /// Last written (left, right) attenuation.
    pub fn volume(&self) -> Option<(AttenuationRegister, AttenuationRegister)> {
        self.volume
    }

    /// Last successfully programmed (sample rate, MCLK).
    pub fn clock(&self) -> Option<(u32, u32)> {
        self.clock
    }

    /// Number of `configure_clock` calls, failed ones included.
    pub fn clock_calls(&self) -> usize {
        self.clock_calls
    }
}

impl DacControl for MockDac {
    type Error = MockError;

    async fn power_up(&mut self) -> Result<(), Self::Error> {
        self.power_up_calls += 1;
        if self.fail_power_up {
            return Err(MockError::Injected);
        }
        self.powered = true;
        Ok(())
    }

    async fn power_down(&mut self) -> Result<(), Self::Error> {
        self.power_down_calls += 1;
        self.powered = false;
        Ok(())
    }

    async fn set_volume(
        &mut self,
        left: AttenuationRegister,
        right: AttenuationRegister,
    ) -> Result<(), Self::Error> {
        self.volume = Some((left, right));
        Ok(())
    }

    async fn configure_clock(
        &mut self,
        sample_rate: u32,
        master_clock_hz: u32,
    ) -> Result<(), Self::Error> {
        self.clock_calls += 1;
        if self.fail_clock {
            return Err(MockError::Injected);
        }
        self.clock = Some((sample_rate, master_clock_hz));
        Ok(())
    }
}

// ── MockSink ─────────────────────────────────────────────────────────────────

/// Samples retained from the most recent `start_transfer`.
pub const MOCK_SINK_CAPTURE: usize = 2048;

/// Mock transfer sink.
#[derive(Debug, Default)]
pub struct MockSink {
    start_calls: usize,
    stop_calls: usize,
    pause_calls: usize,
    running: bool,
    fail_start: bool,
    last: heapless::Vec<i32, MOCK_SINK_CAPTURE>,
}

impl MockSink {
    /// Create an idle sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `start_transfer` fail.
    pub fn fail_start(&mut self, fail: bool) {
        self.fail_start = fail;
    }

    /// Number of `start_transfer` calls, failed ones included.
    pub fn start_calls(&self) -> usize {
        self.start_calls
    }

    /// Number of `stop_transfer` calls.
    pub fn stop_calls(&self) -> usize {
        self.stop_calls
    }

    /// Number of `pause_transfer` calls.
    pub fn pause_calls(&self) -> usize {
        self.pause_calls
    }

    /// Whether a transfer is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Contents of the buffer handed over by the last successful start
    /// (truncated to [`MOCK_SINK_CAPTURE`] samples).
    pub fn last_transfer(&self) -> &[i32] {
        &self.last
    }
}

impl TransferSink for MockSink {
    type Error = MockError;

    fn start_transfer(&mut self, samples: &[i32]) -> Result<(), Self::Error> {
        self.start_calls += 1;
        if self.fail_start {
            return Err(MockError::Injected);
        }
        self.last.clear();
        let keep = samples.len().min(MOCK_SINK_CAPTURE);
        let _ = self.last.extend_from_slice(&samples[..keep]);
        self.running = true;
        Ok(())
    }

    fn stop_transfer(&mut self) {
        self.stop_calls += 1;
        self.running = false;
    }

    fn pause_transfer(&mut self) {
        self.pause_calls += 1;
        self.running = false;
    }
}

// ── MockStreamSource ─────────────────────────────────────────────────────────

/// Mock upstream source serving a borrowed byte slice.
#[derive(Debug)]
pub struct MockStreamSource<'a> {
    data: &'a [u8],
    pos: usize,
    read_calls: usize,
    zero_reads: usize,
    always_zero: bool,
    max_read: Option<usize>,
    fail_seek: bool,
    last_seek: Option<u64>,
}

impl<'a> MockStreamSource<'a> {
    /// Serve `data` from position 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            read_calls: 0,
            zero_reads: 0,
            always_zero: false,
            max_read: None,
            fail_seek: false,
            last_seek: None,
        }
    }

    /// A source that never yields data.
    pub fn empty() -> Self {
        let mut source = Self::new(&[]);
        source.always_zero = true;
        source
    }

    /// Return 0 bytes for the next `n` reads, then resume serving data.
    pub fn zero_next(&mut self, n: usize) {
        self.zero_reads = n;
    }

    /// Cap every read at `max` bytes.
    pub fn limit_reads(&mut self, max: usize) {
        self.max_read = Some(max);
    }

    /// Make every subsequent `seek` fail.
    pub fn fail_seek(&mut self, fail: bool) {
        self.fail_seek = fail;
    }

    /// Number of `read` calls.
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Last requested seek target.
    pub fn last_seek(&self) -> Option<u64> {
        self.last_seek
    }
}

impl StreamSource for MockStreamSource<'_> {
    type Error = MockError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_calls += 1;
        if self.always_zero {
            return Ok(0);
        }
        if self.zero_reads > 0 {
            self.zero_reads -= 1;
            return Ok(0);
        }
        let remaining = self.data.len().saturating_sub(self.pos);
        let mut n = buf.len().min(remaining);
        if let Some(max) = self.max_read {
            n = n.min(max);
        }
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.last_seek = Some(pos);
        if self.fail_seek {
            return Err(MockError::Injected);
        }
        let target = usize::try_from(pos).unwrap_or(usize::MAX);
        self.pos = target.min(self.data.len());
        Ok(pos)
    }
}

// ── MockDelay ────────────────────────────────────────────────────────────────

/// Delay that returns immediately and records what was requested.
#[derive(Debug, Default)]
pub struct MockDelay {
    calls: usize,
    total_ns: u64,
}

impl MockDelay {
    /// Create a fresh delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delay calls.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Sum of requested delays in nanoseconds.
    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }
}

impl embedded_hal_async::delay::DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::audio_types::VolumePercent;
    use embedded_hal_async::delay::DelayNs;

    #[tokio::test]
    async fn test_mock_dac() {
        let mut dac = MockDac::new();

        dac.power_up().await.unwrap();
        assert!(dac.is_powered());

        let att = AttenuationRegister::from_volume(VolumePercent::new(50));
        dac.set_volume(att, att).await.unwrap();
        assert_eq!(dac.volume(), Some((att, att)));

        dac.configure_clock(48_000, 12_288_000).await.unwrap();
        assert_eq!(dac.clock(), Some((48_000, 12_288_000)));

        dac.fail_clock(true);
        assert!(dac.configure_clock(44_100, 11_289_600).await.is_err());
        assert_eq!(dac.clock(), Some((48_000, 12_288_000)));
        assert_eq!(dac.clock_calls(), 2);

        dac.power_down().await.unwrap();
        assert!(!dac.is_powered());
    }

    #[test]
    fn test_mock_sink() {
        let mut sink = MockSink::new();
        sink.start_transfer(&[1, 2, 3]).unwrap();
        assert!(sink.is_running());
        assert_eq!(sink.last_transfer(), &[1, 2, 3]);

        sink.pause_transfer();
        assert!(!sink.is_running());

        sink.fail_start(true);
        assert!(sink.start_transfer(&[4]).is_err());
        assert_eq!(sink.start_calls(), 2);
        assert_eq!(sink.last_transfer(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_mock_stream_source() {
        static DATA: [u8; 6] = [1, 2, 3, 4, 5, 6];
        let mut src = MockStreamSource::new(&DATA);
        let mut buf = [0u8; 4];

        src.zero_next(1);
        assert_eq!(src.read(&mut buf).await.unwrap(), 0);
        assert_eq!(src.read(&mut buf).await.unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(src.read(&mut buf).await.unwrap(), 2);
        assert_eq!(src.read_calls(), 3);

        src.seek(1).await.unwrap();
        assert_eq!(src.position(), 1);
    }

    #[tokio::test]
    async fn test_mock_delay() {
        let mut delay = MockDelay::new();
        delay.delay_ms(5).await;
        assert!(delay.calls() >= 1);
        assert_eq!(delay.total_ns(), 5_000_000);
    }
}
