//! Double buffer manager.
//!
//! Owns the sample store, the two hardware buffers and the collaborators that
//! feed and drain them. The transfer-complete interrupt only touches the
//! [`TransferHandoff`]; everything below runs in the processing task.
//!
//! ```text
//!  StreamSource ──read──▶ RingBuffer ──Converter──▶ hw[0] / hw[1] ──▶ TransferSink
//!                         (4096 samples)             (N samples each)
//! ```
//!
//! # States
//!
//! ```text
//!  Empty ──▶ Preloading ──▶ Ready ──▶ Playing ◀──▶ Underrun
//!    ▲           │
//!    └───────────┘  (fill failure)
//! ```

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use platform::{StreamSource, TransferSink};

use crate::config::{
    BufferThresholds, ConversionConfig, ReadChunkConfig, SampleFormatConfig, HW_BUFFER_SAMPLES,
    MAX_READ_CHUNK_BYTES, READ_RETRIES, RETRY_DELAY_MS, SAMPLE_STORE_CAPACITY,
};
use crate::convert::Converter;
use crate::crossfade::{Crossfade, CrossfadeConfig};
use crate::error::{BufferError, ConfigError, CrossfadeError, FillError, ReplenishError};
use crate::format::SampleFormat;
use crate::handoff::TransferHandoff;
use crate::ring_buffer::RingBuffer;
use crate::stats::{BufferStats, UnderrunCause, UnderrunObserver, UnderrunReport};

/// Double buffer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferState {
    /// Nothing buffered, no transfer
    Empty,
    /// Filling both hardware buffers
    Preloading,
    /// Both buffers full, transfer not yet started
    Ready,
    /// Transfer running
    Playing,
    /// A refill failed; the queued buffer holds silence
    Underrun,
}

/// Sample store, two `N`-sample hardware buffers and their collaborators.
pub struct BufferManager<'a, S, K, D, const N: usize = HW_BUFFER_SAMPLES>
where
    S: StreamSource,
    K: TransferSink,
    D: DelayNs,
{
    store: RingBuffer<i32, SAMPLE_STORE_CAPACITY>,
    hw: [[i32; N]; 2],
    ready: [bool; 2],
    state: BufferState,
    handoff: &'a TransferHandoff,
    source: S,
    sink: K,
    delay: D,
    converter: Converter,
    thresholds: BufferThresholds,
    chunks: ReadChunkConfig,
    crossfade: Crossfade<N>,
    read_buf: [u8; MAX_READ_CHUNK_BYTES],
    stats: BufferStats,
    /// A gapless switch completes on the next successful refill.
    gapless_pending: bool,
    /// The source delivered a short read; stop reading until reset.
    end_of_stream: bool,
    /// End of stream not yet reported to the pipeline.
    eof_pending: bool,
    /// Transfer halted by `pause`; buffers untouched.
    transfer_paused: bool,
    /// The sink holds a buffer and will signal its completion.
    transfer_running: bool,
    /// Between the low and high watermark on the way up.
    replenishing: bool,
    underrun_observer: Option<&'a dyn UnderrunObserver>,
}

impl<'a, S, K, D, const N: usize> BufferManager<'a, S, K, D, N>
where
    S: StreamSource,
    K: TransferSink,
    D: DelayNs,
{
    /// Empty manager: signed 16-bit at 44.1 kHz, default watermarks and
    /// chunk sizes, crossfade disabled.
    pub fn new(handoff: &'a TransferHandoff, source: S, sink: K, delay: D) -> Self {
        let format = SampleFormat::S16;
        Self {
            store: RingBuffer::new(0),
            hw: [[format.silence(); N]; 2],
            ready: [false; 2],
            state: BufferState::Empty,
            handoff,
            source,
            sink,
            delay,
            converter: Converter::new(format, ConversionConfig::default()),
            thresholds: BufferThresholds::default_for(SAMPLE_STORE_CAPACITY),
            chunks: ReadChunkConfig::default(),
            crossfade: Crossfade::new(format),
            read_buf: [0; MAX_READ_CHUNK_BYTES],
            stats: BufferStats::default(),
            gapless_pending: false,
            end_of_stream: false,
            eof_pending: false,
            transfer_paused: false,
            transfer_running: false,
            replenishing: false,
            underrun_observer: None,
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Statistics.
    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    /// Samples waiting in the store.
    pub fn available(&self) -> usize {
        self.store.available()
    }

    /// Whether hardware buffer `index` holds fresh data.
    pub fn is_ready(&self, index: usize) -> bool {
        self.ready.get(index).copied().unwrap_or(false)
    }

    /// Index of the buffer the hardware is draining.
    pub fn active_index(&self) -> usize {
        self.handoff.active()
    }

    /// Handoff shared with the transfer interrupt.
    pub fn handoff(&self) -> &'a TransferHandoff {
        self.handoff
    }

    /// Contents of hardware buffer `index`.
    pub fn buffer(&self, index: usize) -> Option<&[i32]> {
        self.hw.get(index).map(|b| b.as_slice())
    }

    /// Active watermarks.
    pub fn thresholds(&self) -> BufferThresholds {
        self.thresholds
    }

    /// Active read chunk sizes.
    pub fn read_chunks(&self) -> ReadChunkConfig {
        self.chunks
    }

    /// Stream format.
    pub fn format(&self) -> SampleFormat {
        self.converter.source_format()
    }

    /// Hardware buffer format.
    pub fn output_format(&self) -> SampleFormat {
        self.converter.output_format()
    }

    /// Active rate conversion.
    pub fn rates(&self) -> &ConversionConfig {
        self.converter.rates()
    }

    /// Whether the transfer is held by [`pause`](Self::pause).
    pub fn is_paused(&self) -> bool {
        self.transfer_paused
    }

    /// Whether the source has reported end of stream.
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Whether a gapless switch waits for the next refill.
    pub fn is_gapless_pending(&self) -> bool {
        self.gapless_pending
    }

    /// Consume an unreported end of stream.
    pub fn take_end_of_stream(&mut self) -> bool {
        core::mem::take(&mut self.eof_pending)
    }

    /// Whether a crossfade is running.
    pub fn is_crossfade_in_progress(&self) -> bool {
        self.crossfade.is_in_progress()
    }

    /// Crossfade mixer.
    pub fn crossfade(&self) -> &Crossfade<N> {
        &self.crossfade
    }

    /// Upstream source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Output sink.
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Output sink.
    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Install (or with `None`, remove) the underrun observer.
    pub fn set_underrun_observer(&mut self, observer: Option<&'a dyn UnderrunObserver>) {
        self.underrun_observer = observer;
    }

    // ── Configuration ───────────────────────────────────────────────────────

    /// Set the store watermarks, in samples.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Thresholds`]; the previous watermarks are kept.
    pub fn set_thresholds(&mut self, low: usize, high: usize) -> Result<(), ConfigError> {
        let thresholds = BufferThresholds::new(low, high, self.store.capacity()).map_err(|e| {
            warn!("rejected thresholds low={} high={}", low, high);
            e
        })?;
        self.thresholds = thresholds;
        Ok(())
    }

    /// Set the upstream read sizes, in bytes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ReadChunks`]; the previous sizes are kept.
    pub fn set_read_chunks(&mut self, min: usize, optimal: usize, max: usize) -> Result<(), ConfigError> {
        let chunks = ReadChunkConfig::new(min, optimal, max).map_err(|e| {
            warn!("rejected read chunks {}/{}/{}", min, optimal, max);
            e
        })?;
        self.chunks = chunks;
        Ok(())
    }

    /// Change the stream format, rescaling the watermarks so they cover the
    /// same number of bytes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::BitDepth`] / [`ConfigError::FloatWidth`]; nothing changes.
    pub fn configure_format(&mut self, config: SampleFormatConfig) -> Result<(), ConfigError> {
        let format = config.format().map_err(|e| {
            warn!("rejected sample format: {} bits", config.bits_per_sample);
            e
        })?;
        let old_bps = self.converter.source_format().bytes_per_sample();
        let new_bps = format.bytes_per_sample();
        if old_bps != new_bps {
            self.thresholds = self.thresholds.rescaled(old_bps, new_bps, self.store.capacity());
        }
        self.converter.set_source_format(format);
        self.crossfade.set_format(self.converter.output_format());
        debug!("stream format {:?}", format);
        Ok(())
    }

    /// Write hardware buffers in `format` instead of the stream format.
    pub fn set_output_format(&mut self, format: SampleFormat) {
        self.converter.set_output_format(format);
        self.crossfade.set_format(format);
    }

    /// Change source and target rates, rescaling the watermarks with the
    /// source rate.
    ///
    /// # Errors
    ///
    /// [`ConfigError::SampleRate`] for a zero rate; nothing changes.
    pub fn configure_rates(&mut self, source_rate: u32, target_rate: u32) -> Result<(), ConfigError> {
        let rates = ConversionConfig::new(source_rate, target_rate).map_err(|e| {
            warn!("rejected rates {} -> {}", source_rate, target_rate);
            e
        })?;
        let old_rate = self.converter.rates().source_rate;
        if old_rate != source_rate {
            self.thresholds = self.thresholds.rescaled(
                source_rate as usize,
                old_rate as usize,
                self.store.capacity(),
            );
        }
        self.converter.set_rates(rates);
        debug!("rates {} -> {} (conversion {})", source_rate, target_rate, rates.enabled);
        Ok(())
    }

    /// Replace the crossfade parameters.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Crossfade`]; the previous parameters are kept.
    pub fn configure_crossfade(&mut self, config: CrossfadeConfig) -> Result<(), ConfigError> {
        self.crossfade.configure(config).map_err(|e| {
            warn!("rejected crossfade length={}", config.fade_length);
            e
        })
    }

    // ── Playback control ────────────────────────────────────────────────────

    /// Fill both hardware buffers and hand the first one to the sink.
    ///
    /// Only valid from `Empty`. On failure the manager is back in `Empty`.
    ///
    /// # Errors
    ///
    /// - [`BufferError::InvalidState`] outside `Empty`
    /// - [`BufferError::Fill`] when the store cannot fill both buffers
    /// - [`BufferError::Transfer`] when the sink refuses to start
    pub fn start_playback(&mut self) -> Result<(), BufferError> {
        if self.state != BufferState::Empty {
            return Err(BufferError::InvalidState(self.state));
        }
        self.state = BufferState::Preloading;

        for index in 0..2 {
            if let Err(e) = self.fill_buffer(index) {
                self.ready = [false; 2];
                self.state = BufferState::Empty;
                self.stats.fill_failures = self.stats.fill_failures.saturating_add(1);
                warn!("preload of buffer {} failed: {:?}", index, e);
                return Err(BufferError::Fill(e));
            }
            if let Some(ready) = self.ready.get_mut(index) {
                *ready = true;
            }
        }
        self.state = BufferState::Ready;

        self.handoff.arm(0);
        let started = match self.hw.first() {
            Some(first) => self.sink.start_transfer(first).is_ok(),
            None => false,
        };
        if !started {
            self.handoff.disarm();
            self.ready = [false; 2];
            self.state = BufferState::Empty;
            warn!("transfer start failed");
            return Err(BufferError::Transfer);
        }

        self.transfer_paused = false;
        self.transfer_running = true;
        self.state = BufferState::Playing;
        debug!("playback started, {} samples buffered", self.store.available());
        Ok(())
    }

    /// Restart the transfer on the active buffer after a pause, or leave
    /// `Underrun` once the queued buffer holds audio or silence.
    ///
    /// A transfer still running through an underrun is not restarted.
    ///
    /// # Errors
    ///
    /// - [`BufferError::InvalidState`] unless `Ready`, `Playing` or `Underrun`
    /// - [`BufferError::Transfer`] when the sink refuses to start
    pub fn resume_playback(&mut self) -> Result<(), BufferError> {
        if !matches!(
            self.state,
            BufferState::Ready | BufferState::Playing | BufferState::Underrun
        ) {
            return Err(BufferError::InvalidState(self.state));
        }
        let active = self.handoff.active();
        if self.state == BufferState::Underrun {
            // The buffer queued after the silent one missed its refill.
            #[allow(clippy::arithmetic_side_effects)] // Safety: active is 0 or 1
            let queued = 1 - active;
            if !self.is_ready(queued) {
                if self.fill_buffer(queued).is_err() {
                    let silence = self.converter.output_format().silence();
                    if let Some(buf) = self.hw.get_mut(queued) {
                        buf.fill(silence);
                    }
                }
                if let Some(ready) = self.ready.get_mut(queued) {
                    *ready = true;
                }
            }
        }
        if !self.transfer_running {
            let buf = self.hw.get(active).ok_or(BufferError::InvalidState(self.state))?;
            self.handoff.arm(active);
            if self.sink.start_transfer(buf).is_err() {
                self.handoff.disarm();
                return Err(BufferError::Transfer);
            }
            self.transfer_running = true;
        }
        if self.state == BufferState::Underrun {
            self.stats.recoveries = self.stats.recoveries.saturating_add(1);
            info!("recovered from underrun");
        }
        self.transfer_paused = false;
        self.state = BufferState::Playing;
        Ok(())
    }

    /// Hold the transfer without touching the buffers. Idempotent.
    pub fn pause(&mut self) {
        if self.transfer_paused || self.state != BufferState::Playing {
            return;
        }
        self.sink.pause_transfer();
        self.transfer_paused = true;
        self.transfer_running = false;
    }

    /// Stop the transfer and drop all buffered audio.
    ///
    /// Late completion signals are ignored until playback restarts.
    pub fn flush(&mut self, reset_stats: bool) {
        self.sink.stop_transfer();
        self.handoff.disarm();
        self.store.clear();
        self.ready = [false; 2];
        self.crossfade.cancel();
        self.gapless_pending = false;
        self.end_of_stream = false;
        self.eof_pending = false;
        self.transfer_paused = false;
        self.transfer_running = false;
        self.replenishing = false;
        self.state = BufferState::Empty;
        if reset_stats {
            self.stats.reset();
        }
        debug!("buffers flushed");
    }

    /// Seek the source to `position` and drop everything buffered.
    ///
    /// # Errors
    ///
    /// [`BufferError::Seek`] when the source refuses; the transfer is stopped
    /// but buffered audio is kept.
    pub async fn seek(&mut self, position: u64) -> Result<(), BufferError> {
        self.sink.stop_transfer();
        self.handoff.disarm();
        self.transfer_running = false;
        if self.source.seek(position).await.is_err() {
            warn!("source seek to {} failed", position);
            return Err(BufferError::Seek);
        }
        self.flush(false);
        Ok(())
    }

    // ── Completion handling ─────────────────────────────────────────────────

    /// Signal a completion and service it (for callers without an interrupt).
    pub async fn on_transfer_complete(&mut self) -> Result<Option<usize>, BufferError> {
        self.handoff.signal_complete();
        self.service_complete().await
    }

    /// Hand the now-active buffer to the sink, then refill the buffer the
    /// hardware just vacated, if a completion is pending.
    ///
    /// Returns the refilled index. A fill failure moves the manager to
    /// `Underrun`, runs the underrun handler (which silences the vacated
    /// buffer) and returns the error. During a crossfade a starved outgoing
    /// track is replaced by its snapshot.
    ///
    /// # Errors
    ///
    /// [`BufferError::Transfer`] when re-arming the sink fails (nothing is
    /// refilled), [`BufferError::Fill`] on a failed refill.
    pub async fn service_complete(&mut self) -> Result<Option<usize>, BufferError> {
        if !self.handoff.take_complete() {
            return Ok(None);
        }
        if !matches!(self.state, BufferState::Playing | BufferState::Underrun) {
            return Ok(None);
        }

        let active = self.handoff.active();
        #[allow(clippy::arithmetic_side_effects)] // Safety: active is 0 or 1
        let vacated = 1 - active;
        if let Some(ready) = self.ready.get_mut(vacated) {
            *ready = false;
        }

        // The vacated buffer is refilled while the sink drains the other one.
        if !self.transfer_paused {
            let buf = self.hw.get(active).ok_or(BufferError::Transfer)?;
            if self.sink.start_transfer(buf).is_err() {
                self.transfer_running = false;
                warn!("re-arming transfer on buffer {} failed", active);
                return Err(BufferError::Transfer);
            }
            self.transfer_running = true;
        }

        match self.fill_buffer(vacated) {
            Ok(_) => {}
            Err(FillError::Underrun) if self.crossfade.is_in_progress() => {
                if let Some(buf) = self.hw.get_mut(vacated) {
                    buf.copy_from_slice(self.crossfade.snapshot());
                }
                trace!("outgoing track drained mid-crossfade, using snapshot");
            }
            Err(e) => {
                self.stats.fill_failures = self.stats.fill_failures.saturating_add(1);
                let cause = match e {
                    FillError::Underrun => UnderrunCause::Starved,
                    FillError::Memory => UnderrunCause::ScratchExhausted,
                };
                self.handle_underrun(cause).await;
                return Err(BufferError::Fill(e));
            }
        }

        if let Some(ready) = self.ready.get_mut(vacated) {
            *ready = true;
        }
        self.stats.add_played(N);
        if self.state == BufferState::Underrun {
            self.state = BufferState::Playing;
            self.stats.recoveries = self.stats.recoveries.saturating_add(1);
            info!("recovered from underrun");
        }
        if self.gapless_pending {
            self.gapless_pending = false;
            self.stats.samples_played = 0;
            self.stats.successful_transitions = self.stats.successful_transitions.saturating_add(1);
            debug!("gapless transition complete");
        }
        Ok(Some(vacated))
    }

    /// Signal a half transfer and service it (for callers without an interrupt).
    pub async fn on_half_transfer(&mut self) -> Result<bool, ReplenishError> {
        self.handoff.signal_half();
        self.service_half().await
    }

    /// Replenish early if a half transfer is pending and the store is below
    /// the low watermark. Returns whether a replenishment ran.
    ///
    /// # Errors
    ///
    /// [`ReplenishError::RetriesExhausted`], after the underrun handler ran.
    pub async fn service_half(&mut self) -> Result<bool, ReplenishError> {
        if !self.handoff.take_half() || self.end_of_stream {
            return Ok(false);
        }
        if self.store.available() >= self.thresholds.low {
            return Ok(false);
        }
        self.replenish().await?;
        Ok(true)
    }

    /// Keep the store between the watermarks: start reading below `low`,
    /// keep reading until `high`.
    ///
    /// # Errors
    ///
    /// [`ReplenishError::RetriesExhausted`], after the underrun handler ran.
    pub async fn top_up(&mut self) -> Result<(), ReplenishError> {
        if self.end_of_stream || self.state == BufferState::Empty {
            self.replenishing = false;
            return Ok(());
        }
        if self.store.available() < self.thresholds.low {
            self.replenishing = true;
        }
        while self.replenishing {
            if self.store.available() >= self.thresholds.high || self.store.is_full() {
                self.replenishing = false;
                break;
            }
            let appended = match self.replenish().await {
                Ok(n) => n,
                Err(e) => {
                    self.replenishing = false;
                    return Err(e);
                }
            };
            if appended == 0 || self.end_of_stream {
                self.replenishing = false;
            }
        }
        Ok(())
    }

    /// Read until the store can fill both hardware buffers (or is full, or
    /// the stream ended). Returns the samples buffered.
    ///
    /// # Errors
    ///
    /// [`ReplenishError::RetriesExhausted`] when nothing at all could be read.
    #[allow(clippy::arithmetic_side_effects)] // Safety: saturating_mul
    pub async fn preload(&mut self) -> Result<usize, ReplenishError> {
        let target = self
            .converter
            .source_needed(N)
            .saturating_mul(2)
            .min(self.store.capacity());
        while self.store.available() < target && !self.store.is_full() && !self.end_of_stream {
            match self.read_with_retries().await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if self.store.is_empty() => return Err(e),
                Err(_) => break,
            }
        }
        Ok(self.store.available())
    }

    /// Pull one chunk from the source into the store.
    ///
    /// Returns the samples appended (0 when the store has no room). Retry
    /// exhaustion counts as end of stream and is returned as an error; it
    /// runs the underrun handler unless an underrun is already open.
    ///
    /// # Errors
    ///
    /// [`ReplenishError::RetriesExhausted`].
    pub async fn replenish(&mut self) -> Result<usize, ReplenishError> {
        match self.read_with_retries().await {
            Ok(n) => Ok(n),
            Err(e) => {
                self.source_exhausted();
                if self.state != BufferState::Underrun {
                    self.handle_underrun(UnderrunCause::SourceExhausted).await;
                }
                Err(e)
            }
        }
    }

    /// Enter `Underrun`: silence the queued buffer if it missed its refill,
    /// try one immediate read when the store starved, and report to the
    /// observer. The buffer already handed to the sink keeps its audio.
    pub async fn handle_underrun(&mut self, cause: UnderrunCause) {
        let started = Instant::now();
        let lost = u32::try_from(N).unwrap_or(u32::MAX);
        self.state = BufferState::Underrun;
        self.stats.underruns = self.stats.underruns.saturating_add(1);
        self.stats.last_underrun = Some(started);
        self.stats.samples_lost = self.stats.samples_lost.saturating_add(lost);
        warn!("underrun #{} ({:?})", self.stats.underruns, cause);

        #[allow(clippy::arithmetic_side_effects)] // Safety: active() is 0 or 1
        let queued = 1 - self.handoff.active();
        if !self.is_ready(queued) {
            let silence = self.converter.output_format().silence();
            if let Some(buf) = self.hw.get_mut(queued) {
                buf.fill(silence);
            }
            if let Some(ready) = self.ready.get_mut(queued) {
                *ready = true;
            }
        }

        if cause == UnderrunCause::Starved && !self.end_of_stream && self.read_with_retries().await.is_err() {
            self.source_exhausted();
        }

        let recovery_time = started.elapsed();
        self.stats.last_recovery_time = Some(recovery_time);
        if let Some(observer) = self.underrun_observer {
            observer.on_underrun(&UnderrunReport {
                cause,
                count: self.stats.underruns,
                samples_lost: lost,
                recovery_time,
            });
        }
    }

    // ── Track transitions ───────────────────────────────────────────────────

    /// The source continues with the next track; the switch is recorded on
    /// the next successful refill.
    pub fn prepare_gapless_transition(&mut self) {
        self.gapless_pending = true;
        self.end_of_stream = false;
        self.eof_pending = false;
    }

    /// Start a crossfade, snapshotting the buffer being drained.
    ///
    /// # Errors
    ///
    /// See [`Crossfade::start`].
    pub fn prepare_crossfade(&mut self) -> Result<(), CrossfadeError> {
        let active = self.hw.get(self.handoff.active()).map_or(&[][..], |b| b.as_slice());
        self.crossfade.start(self.state, active)?;
        debug!("crossfade started over {} samples", self.crossfade.config().fade_length);
        Ok(())
    }

    /// Blend `incoming` into hardware buffer `index` at the running fade
    /// position. Past the end of the fade the incoming signal is copied
    /// straight through. Returns whether the fade has completed.
    pub fn blend_incoming(&mut self, index: usize, incoming: &[i32]) -> bool {
        let Some(buf) = self.hw.get_mut(index) else {
            return !self.crossfade.is_in_progress();
        };
        for (out, &inc) in buf.iter_mut().zip(incoming) {
            *out = if self.crossfade.is_in_progress() {
                self.crossfade.mix_next(*out, inc)
            } else {
                inc
            };
        }
        !self.crossfade.is_in_progress()
    }

    /// Record a finished crossfade; the source now serves the new track.
    pub fn complete_crossfade(&mut self) {
        self.crossfade.cancel();
        self.stats.samples_played = 0;
        self.stats.successful_transitions = self.stats.successful_transitions.saturating_add(1);
        self.end_of_stream = false;
        self.eof_pending = false;
        debug!("crossfade complete");
    }

    /// Abandon a running crossfade.
    pub fn cancel_crossfade(&mut self) {
        self.crossfade.cancel();
    }

    // ── Internals ───────────────────────────────────────────────────────────

    /// The source gave nothing after every retry: treat it as end of stream.
    fn source_exhausted(&mut self) {
        self.stats.retry_exhaustions = self.stats.retry_exhaustions.saturating_add(1);
        error!("source gave no data after {} attempts", READ_RETRIES);
        self.end_of_stream = true;
        self.eof_pending = true;
    }

    fn fill_buffer(&mut self, index: usize) -> Result<usize, FillError> {
        let buf = self.hw.get_mut(index).ok_or(FillError::Underrun)?;
        let consumed = self.converter.fill(&mut self.store, buf)?;
        self.stats.add_processed(consumed);
        Ok(consumed)
    }

    /// Up to [`READ_RETRIES`] reads with [`RETRY_DELAY_MS`] between them.
    /// A zero-byte read and a read error both count as "no data".
    async fn read_with_retries(&mut self) -> Result<usize, ReplenishError> {
        let format = self.converter.source_format();
        let bps = format.bytes_per_sample();
        let free_bytes = self.store.free().saturating_mul(bps);
        let size = self.chunks.read_size(free_bytes, bps).min(self.read_buf.len());
        if size == 0 {
            return Ok(0);
        }

        for attempt in 0..READ_RETRIES {
            if attempt > 0 {
                self.delay.delay_ms(RETRY_DELAY_MS).await;
            }
            let Some(buf) = self.read_buf.get_mut(..size) else {
                return Ok(0);
            };
            let started = Instant::now();
            match self.source.read(buf).await {
                Ok(0) => trace!("empty read, attempt {}", attempt),
                Ok(n) => {
                    let n = n.min(size);
                    self.stats.read_timing.record(n, started.elapsed());
                    let mut appended = 0usize;
                    for chunk in self.read_buf.get(..n).unwrap_or(&[]).chunks_exact(bps) {
                        if let Some(sample) = format.decode_le(chunk) {
                            if self.store.append(sample) {
                                appended = appended.saturating_add(1);
                            }
                        }
                    }
                    if n < size {
                        self.end_of_stream = true;
                        self.eof_pending = true;
                        info!("end of stream ({} of {} bytes)", n, size);
                    }
                    return Ok(appended);
                }
                Err(_) => {
                    self.stats.read_errors = self.stats.read_errors.saturating_add(1);
                    warn!("source read failed, attempt {}", attempt);
                }
            }
        }
        Err(ReplenishError::RetriesExhausted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use platform::mocks::{MockDelay, MockSink, MockStreamSource};

    type Manager<'a> = BufferManager<'a, MockStreamSource<'static>, MockSink, MockDelay, 16>;

    fn manager<'a>(handoff: &'a TransferHandoff, data: &'static [u8]) -> Manager<'a> {
        BufferManager::new(handoff, MockStreamSource::new(data), MockSink::new(), MockDelay::new())
    }

    #[test]
    fn start_requires_empty_and_data() {
        let handoff = TransferHandoff::new();
        let mut mgr = manager(&handoff, &[]);
        assert_eq!(
            mgr.start_playback(),
            Err(BufferError::Fill(FillError::Underrun))
        );
        assert_eq!(mgr.state(), BufferState::Empty);
        assert_eq!(mgr.stats().fill_failures, 1);
        assert_eq!(mgr.sink().start_calls(), 0);
    }

    #[tokio::test]
    async fn preload_then_start_plays_buffer_zero() {
        static DATA: [u8; 128] = [0x11; 128];
        let handoff = TransferHandoff::new();
        let mut mgr = manager(&handoff, &DATA);
        assert_eq!(mgr.preload().await.unwrap(), 64);
        mgr.start_playback().unwrap();
        assert_eq!(mgr.state(), BufferState::Playing);
        assert!(mgr.is_ready(0) && mgr.is_ready(1));
        assert_eq!(mgr.sink().start_calls(), 1);
        assert_eq!(mgr.sink().last_transfer(), &[0x1111; 16]);
        assert_eq!(mgr.start_playback(), Err(BufferError::InvalidState(BufferState::Playing)));
    }

    #[tokio::test]
    async fn sink_failure_rolls_back_to_empty() {
        static DATA: [u8; 64] = [0; 64];
        let handoff = TransferHandoff::new();
        let mut mgr = manager(&handoff, &DATA);
        mgr.preload().await.unwrap();
        mgr.sink_mut().fail_start(true);
        assert_eq!(mgr.start_playback(), Err(BufferError::Transfer));
        assert_eq!(mgr.state(), BufferState::Empty);
        assert!(!handoff.is_armed());
    }

    #[test]
    fn invalid_config_keeps_previous() {
        let handoff = TransferHandoff::new();
        let mut mgr = manager(&handoff, &[]);
        let before = mgr.thresholds();
        assert_eq!(mgr.set_thresholds(3000, 100), Err(ConfigError::Thresholds));
        assert_eq!(mgr.thresholds(), before);
        assert_eq!(mgr.configure_rates(0, 48_000), Err(ConfigError::SampleRate));
        assert_eq!(mgr.rates().source_rate, 44_100);
        assert_eq!(
            mgr.configure_format(SampleFormatConfig::signed(12)),
            Err(ConfigError::BitDepth(12))
        );
        assert_eq!(mgr.format(), SampleFormat::S16);
    }

    #[test]
    fn rate_and_format_changes_rescale_watermarks() {
        let handoff = TransferHandoff::new();
        let mut mgr = manager(&handoff, &[]);
        mgr.set_thresholds(1000, 2000).unwrap();
        mgr.configure_rates(88_200, 88_200).unwrap();
        assert_eq!(mgr.thresholds(), BufferThresholds { low: 2000, high: 4000 });
        mgr.configure_format(SampleFormatConfig::signed(32)).unwrap();
        assert_eq!(mgr.thresholds(), BufferThresholds { low: 1000, high: 2000 });
    }

    #[tokio::test]
    async fn short_read_marks_end_of_stream() {
        static DATA: [u8; 10] = [0; 10];
        let handoff = TransferHandoff::new();
        let mut mgr = manager(&handoff, &DATA);
        assert_eq!(mgr.replenish().await, Ok(5));
        assert!(mgr.is_end_of_stream());
        assert!(mgr.take_end_of_stream());
        assert!(!mgr.take_end_of_stream());
    }

    #[tokio::test]
    async fn flush_returns_to_empty_and_ignores_late_completion() {
        static DATA: [u8; 128] = [1; 128];
        let handoff = TransferHandoff::new();
        let mut mgr = manager(&handoff, &DATA);
        mgr.preload().await.unwrap();
        mgr.start_playback().unwrap();
        mgr.flush(true);
        assert_eq!(mgr.state(), BufferState::Empty);
        assert_eq!(mgr.available(), 0);
        assert!(!mgr.is_ready(0) && !mgr.is_ready(1));
        handoff.signal_complete();
        assert_eq!(mgr.service_complete().await, Ok(None));
        assert_eq!(mgr.sink().stop_calls(), 1);
    }

    #[tokio::test]
    async fn pause_is_idempotent_and_resume_restarts() {
        static DATA: [u8; 128] = [2; 128];
        let handoff = TransferHandoff::new();
        let mut mgr = manager(&handoff, &DATA);
        mgr.preload().await.unwrap();
        mgr.start_playback().unwrap();
        mgr.pause();
        mgr.pause();
        assert_eq!(mgr.sink().pause_calls(), 1);
        assert!(mgr.is_paused());
        mgr.resume_playback().unwrap();
        assert!(!mgr.is_paused());
        assert_eq!(mgr.sink().start_calls(), 2);
    }
}
