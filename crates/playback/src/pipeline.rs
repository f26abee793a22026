//! Playback pipeline state machine.
//!
//! Ties the [`BufferManager`] to the DAC and the next-track feed. The
//! pipeline and the buffers change state in different places (user commands
//! vs. completion servicing), so [`Pipeline::synchronize_state`] reconciles
//! them once per task tick.
//!
//! # Transitions
//!
//! | From          | Allowed to                |
//! |---------------|---------------------------|
//! | `Stopped`     | `Playing`, `Paused`       |
//! | `Playing`     | any                       |
//! | `Paused`      | `Playing`, `Stopped`      |
//! | `Crossfading` | `Playing`, `Stopped`      |
//!
//! A rejected transition leaves the state unchanged and fires no callback.

use embedded_hal_async::delay::DelayNs;
use platform::audio_config::SaiAudioConfig;
use platform::audio_types::VolumePercent;
use platform::{DacControl, StreamSource, TransferSink};

use crate::config::{PipelineConfig, SampleFormatConfig, HW_BUFFER_SAMPLES};
use crate::crossfade::CrossfadeConfig;
use crate::decoder::NextTrackSource;
use crate::double_buffer::{BufferManager, BufferState};
use crate::error::PipelineError;
use crate::stats::{BufferStats, UnderrunCause, UnderrunObserver};
use crate::volume::stereo_attenuation;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineState {
    /// No output
    Stopped,
    /// Audio flowing
    Playing,
    /// Transfer held, buffers kept
    Paused,
    /// Blending into the next track
    Crossfading,
}

impl PipelineState {
    /// Whether the transition table allows `self -> to`.
    pub const fn can_transition_to(self, to: Self) -> bool {
        match self {
            Self::Stopped => matches!(to, Self::Playing | Self::Paused),
            Self::Playing => true,
            Self::Paused | Self::Crossfading => matches!(to, Self::Playing | Self::Stopped),
        }
    }
}

/// Receives pipeline notifications. One observer at a time; registering
/// replaces the previous one.
pub trait PipelineObserver {
    /// The pipeline moved from `old` to `new`.
    fn on_state_change(&self, old: PipelineState, new: PipelineState);

    /// The last track ended and no next track was queued.
    fn on_end_of_playlist(&self) {}
}

/// The playback pipeline.
pub struct Pipeline<'a, S, K, D, C, T, const N: usize = HW_BUFFER_SAMPLES>
where
    S: StreamSource,
    K: TransferSink,
    D: DelayNs,
    C: DacControl,
    T: NextTrackSource,
{
    buffers: BufferManager<'a, S, K, D, N>,
    dac: C,
    next: T,
    state: PipelineState,
    config: PipelineConfig,
    /// The DAC clock has been programmed at least once.
    clock_configured: bool,
    volume: VolumePercent,
    transition_pending: bool,
    fade_length: u32,
    fade_ratio: f32,
    end_of_playlist: bool,
    observer: Option<&'a dyn PipelineObserver>,
    incoming: [i32; N],
}

impl<'a, S, K, D, C, T, const N: usize> Pipeline<'a, S, K, D, C, T, N>
where
    S: StreamSource,
    K: TransferSink,
    D: DelayNs,
    C: DacControl,
    T: NextTrackSource,
{
    /// Stopped pipeline with the default configuration. Call
    /// [`configure`](Self::configure) before the first `play`.
    pub fn new(buffers: BufferManager<'a, S, K, D, N>, dac: C, next: T) -> Self {
        let config = PipelineConfig::default();
        Self {
            buffers,
            dac,
            next,
            state: PipelineState::Stopped,
            config,
            clock_configured: false,
            volume: VolumePercent::default(),
            transition_pending: false,
            fade_length: config.fade_length_samples(),
            fade_ratio: 0.0,
            end_of_playlist: false,
            observer: None,
            incoming: [0; N],
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Buffer manager state.
    pub fn buffer_state(&self) -> BufferState {
        self.buffers.state()
    }

    /// Buffer statistics.
    pub fn stats(&self) -> &BufferStats {
        self.buffers.stats()
    }

    /// Buffer manager.
    pub fn buffers(&self) -> &BufferManager<'a, S, K, D, N> {
        &self.buffers
    }

    /// Buffer manager.
    pub fn buffers_mut(&mut self) -> &mut BufferManager<'a, S, K, D, N> {
        &mut self.buffers
    }

    /// DAC.
    pub fn dac(&self) -> &C {
        &self.dac
    }

    /// DAC.
    pub fn dac_mut(&mut self) -> &mut C {
        &mut self.dac
    }

    /// Next-track feed.
    pub fn next_track_mut(&mut self) -> &mut T {
        &mut self.next
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Last volume written to the DAC.
    pub fn volume(&self) -> VolumePercent {
        self.volume
    }

    /// Crossfade length in samples.
    pub fn fade_length(&self) -> u32 {
        self.fade_length
    }

    /// Progress of the running crossfade, `0.0..=1.0`.
    pub fn fade_ratio(&self) -> f32 {
        self.fade_ratio
    }

    /// Whether a gapless switch or crossfade has yet to complete.
    pub fn is_transition_pending(&self) -> bool {
        self.transition_pending
    }

    /// Whether playback stopped because the playlist ran out.
    pub fn is_end_of_playlist(&self) -> bool {
        self.end_of_playlist
    }

    /// Clear the end-of-playlist flag (e.g. after queueing new tracks).
    pub fn reset_end_of_playlist(&mut self) {
        self.end_of_playlist = false;
    }

    // ── Observers ───────────────────────────────────────────────────────────

    /// Replace the state/playlist observer.
    pub fn register_observer(&mut self, observer: &'a dyn PipelineObserver) {
        self.observer = Some(observer);
    }

    /// Remove the state/playlist observer.
    pub fn unregister_observer(&mut self) {
        self.observer = None;
    }

    /// Replace the underrun observer.
    pub fn register_underrun_observer(&mut self, observer: &'a dyn UnderrunObserver) {
        self.buffers.set_underrun_observer(Some(observer));
    }

    /// Remove the underrun observer.
    pub fn unregister_underrun_observer(&mut self) {
        self.buffers.set_underrun_observer(None);
    }

    // ── State machine ───────────────────────────────────────────────────────

    /// Move to `to` if the transition table allows it, notifying the observer.
    /// Moving to the current state is a silent no-op.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidTransition`]; nothing changes.
    pub fn set_state(&mut self, to: PipelineState) -> Result<(), PipelineError> {
        let from = self.state;
        if from == to {
            return Ok(());
        }
        if !from.can_transition_to(to) {
            warn!("rejected transition {:?} -> {:?}", from, to);
            return Err(PipelineError::InvalidTransition { from, to });
        }
        self.state = to;
        debug!("pipeline {:?} -> {:?}", from, to);
        if let Some(observer) = self.observer {
            observer.on_state_change(from, to);
        }
        Ok(())
    }

    /// Best-effort transition used during reconciliation; rejections are
    /// logged by `set_state`.
    fn reconcile_to(&mut self, to: PipelineState) {
        let _ = self.set_state(to);
    }

    // ── Commands ────────────────────────────────────────────────────────────

    /// Start or resume playback.
    ///
    /// From `Stopped` the buffers are preloaded, started and the DAC powered
    /// up; from `Paused` the held transfer restarts.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidTransition`] outside `Stopped` / `Paused`
    /// - [`PipelineError::Buffer`] when the buffers cannot start; state unchanged
    /// - [`PipelineError::Dac`] when power-up fails; buffers flushed, state unchanged
    pub async fn play(&mut self) -> Result<(), PipelineError> {
        let from = self.state;
        if !matches!(from, PipelineState::Stopped | PipelineState::Paused) {
            return Err(PipelineError::InvalidTransition {
                from,
                to: PipelineState::Playing,
            });
        }

        if self.buffers.state() == BufferState::Empty {
            if let Err(e) = self.buffers.preload().await {
                warn!("preload failed: {:?}", e);
            }
            self.buffers.start_playback()?;
        } else {
            self.buffers.resume_playback()?;
        }

        if from == PipelineState::Stopped && self.dac.power_up().await.is_err() {
            warn!("DAC power-up failed");
            self.buffers.flush(false);
            return Err(PipelineError::Dac);
        }

        self.set_state(PipelineState::Playing)
    }

    /// Hold playback, keeping the buffers.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidTransition`] unless `Playing`.
    pub fn pause(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Playing {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: PipelineState::Paused,
            });
        }
        self.buffers.pause();
        self.set_state(PipelineState::Paused)
    }

    /// Stop the transfer, power down the DAC and drop all buffered audio.
    ///
    /// The pipeline ends `Stopped` even when power-down fails.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidTransition`] when already `Stopped`
    /// - [`PipelineError::Dac`] when power-down fails
    pub async fn stop(&mut self) -> Result<(), PipelineError> {
        if self.state == PipelineState::Stopped {
            return Err(PipelineError::InvalidTransition {
                from: PipelineState::Stopped,
                to: PipelineState::Stopped,
            });
        }
        self.buffers.flush(false);
        self.transition_pending = false;
        self.fade_ratio = 0.0;
        let powered_down = self.dac.power_down().await.is_ok();
        self.set_state(PipelineState::Stopped)?;
        if !powered_down {
            warn!("DAC power-down failed");
            return Err(PipelineError::Dac);
        }
        Ok(())
    }

    /// Move on to the next track.
    ///
    /// With gapless enabled the switch happens in-stream (blended when
    /// crossfade is enabled too); otherwise playback restarts. With no next
    /// track the pipeline flags end of playlist and stops. A no-op while a
    /// transition is pending.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotPlaying`] unless `Playing`; errors of `stop` /
    /// `play` for a hard switch, after which the pipeline is `Stopped`.
    pub async fn skip(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Playing {
            return Err(PipelineError::NotPlaying);
        }
        if self.transition_pending {
            return Ok(());
        }
        self.transition_pending = true;

        if !self.next.has_next_track() {
            self.end_of_playlist = true;
            info!("end of playlist");
            if let Some(observer) = self.observer {
                observer.on_end_of_playlist();
            }
            return self.stop().await;
        }

        if self.config.gapless_enabled {
            if self.config.crossfade_enabled {
                match self.buffers.prepare_crossfade() {
                    Ok(()) => {
                        self.fade_ratio = 0.0;
                        return self.set_state(PipelineState::Crossfading);
                    }
                    Err(e) => warn!("crossfade unavailable ({:?}), switching gapless", e),
                }
            }
            self.buffers.prepare_gapless_transition();
            return Ok(());
        }

        let result = match self.stop().await {
            Ok(()) => self.play().await,
            Err(e) => Err(e),
        };
        self.transition_pending = false;
        result
    }

    /// The current track's data ran out.
    ///
    /// # Errors
    ///
    /// See [`skip`](Self::skip).
    pub async fn handle_end_of_file(&mut self) -> Result<(), PipelineError> {
        info!("end of file");
        self.skip().await
    }

    /// A gapless switch (or crossfade) finished.
    pub fn notify_transition_complete(&mut self) {
        self.transition_pending = false;
        if self.state == PipelineState::Crossfading {
            self.reconcile_to(PipelineState::Playing);
        }
    }

    /// A crossfade finished.
    pub fn notify_crossfade_complete(&mut self) {
        self.transition_pending = false;
        self.fade_ratio = 0.0;
        self.reconcile_to(PipelineState::Playing);
    }

    /// Run the buffers' underrun handling (unless they already did) and, if
    /// still playing, restart the transfer.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Buffer`] when the transfer cannot restart.
    pub async fn underrun(&mut self) -> Result<(), PipelineError> {
        if self.buffers.state() != BufferState::Underrun {
            self.buffers.handle_underrun(UnderrunCause::Starved).await;
        }
        if self.state == PipelineState::Playing {
            self.buffers.resume_playback()?;
        }
        Ok(())
    }

    /// Apply `config`. A changed sample rate or bit depth (or the first call)
    /// reprograms the DAC clock and the buffers, restarting playback if it
    /// was running.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Config`] for an invalid configuration (nothing
    /// changes); [`PipelineError::Dac`] when the clock cannot be programmed,
    /// after which the old format is kept and the pipeline is `Stopped`.
    pub async fn configure(&mut self, config: PipelineConfig) -> Result<(), PipelineError> {
        config.validate().map_err(|e| {
            warn!("rejected pipeline config: {:?}", e);
            e
        })?;

        let format_changed =
            config.sample_rate != self.config.sample_rate || config.bit_depth != self.config.bit_depth;
        if format_changed || !self.clock_configured {
            self.reconfigure_format(config.sample_rate, config.bit_depth).await?;
        }

        self.config.gapless_enabled = config.gapless_enabled;
        self.config.crossfade_enabled = config.crossfade_enabled;
        self.fade_length = self.config.fade_length_samples().max(1);
        self.fade_ratio = 0.0;

        let curve_exponent = self.buffers.crossfade().config().curve_exponent;
        self.buffers.configure_crossfade(CrossfadeConfig {
            fade_length: self.fade_length,
            curve_exponent,
            enabled: config.crossfade_enabled,
        })?;
        Ok(())
    }

    async fn reconfigure_format(&mut self, sample_rate: u32, bit_depth: u8) -> Result<(), PipelineError> {
        let was_playing = self.state == PipelineState::Playing;
        if was_playing {
            self.pause()?;
        }
        self.buffers.flush(false);

        let sai = SaiAudioConfig::for_format(sample_rate, bit_depth);
        if self.dac.configure_clock(sample_rate, sai.mclk_hz()).await.is_err() {
            warn!("DAC clock setup failed for {} Hz", sample_rate);
            // The buffers are gone; settle on Stopped with the DAC powered down.
            if self.state != PipelineState::Stopped && self.stop().await.is_err() {
                trace!("power-down after clock failure also failed");
            }
            return Err(PipelineError::Dac);
        }
        self.buffers.configure_rates(sample_rate, sample_rate)?;
        self.buffers.configure_format(SampleFormatConfig::signed(bit_depth))?;
        self.config.sample_rate = sample_rate;
        self.config.bit_depth = bit_depth;
        self.clock_configured = true;
        info!("format {} Hz / {} bit", sample_rate, bit_depth);

        if was_playing {
            self.play().await?;
        }
        Ok(())
    }

    /// Write `volume` to both DAC channels.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Dac`]; the stored volume is unchanged.
    pub async fn set_volume(&mut self, volume: VolumePercent) -> Result<(), PipelineError> {
        let (left, right) = stereo_attenuation(volume);
        self.dac
            .set_volume(left, right)
            .await
            .map_err(|_| PipelineError::Dac)?;
        self.volume = volume;
        Ok(())
    }

    /// Jump to byte `position` of the current stream.
    ///
    /// Cancels a running crossfade and pauses; on success the buffers are
    /// flushed and playback restarts if it was running. If the source
    /// refuses the seek, playback resumes where it was.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Seek`] when the source refuses; errors of `play`
    /// when the restart fails.
    pub async fn seek(&mut self, position: u64) -> Result<(), PipelineError> {
        let was_playing = matches!(self.state, PipelineState::Playing | PipelineState::Crossfading);
        if self.state == PipelineState::Crossfading {
            self.buffers.cancel_crossfade();
            self.transition_pending = false;
            self.fade_ratio = 0.0;
            self.set_state(PipelineState::Playing)?;
        }
        self.set_state(PipelineState::Paused)?;

        if self.buffers.seek(position).await.is_err() {
            if was_playing {
                self.play().await?;
            }
            return Err(PipelineError::Seek);
        }
        if was_playing {
            self.play().await?;
        }
        Ok(())
    }

    // ── Task-side servicing ─────────────────────────────────────────────────

    /// Signal a completion and service it (for callers without an interrupt).
    ///
    /// # Errors
    ///
    /// See [`service`](Self::service).
    pub async fn on_transfer_complete(&mut self) -> Result<(), PipelineError> {
        self.buffers.handoff().signal_complete();
        self.service().await
    }

    /// One pass of the processing task: pending half/complete events,
    /// crossfade blending, watermark top-up, end of stream, reconciliation.
    ///
    /// Every step runs even if an earlier one failed; the first error is
    /// returned.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Buffer`] for a failed refill (already handled as an
    /// underrun), or errors of end-of-file handling and reconciliation.
    pub async fn service(&mut self) -> Result<(), PipelineError> {
        let mut result = Ok(());

        if self.buffers.service_half().await.is_err() {
            trace!("early replenish failed");
        }

        match self.buffers.service_complete().await {
            Ok(Some(index)) if self.transition_pending => {
                if self.buffers.is_crossfade_in_progress() {
                    self.process_crossfade(index, N);
                } else if self.state != PipelineState::Crossfading && !self.buffers.is_gapless_pending() {
                    self.notify_transition_complete();
                }
            }
            Ok(_) => {}
            Err(e) => result = Err(PipelineError::Buffer(e)),
        }

        if self.buffers.top_up().await.is_err() {
            trace!("top-up failed");
        }

        if self.buffers.take_end_of_stream()
            && self.state == PipelineState::Playing
            && !self.transition_pending
        {
            if let Err(e) = self.handle_end_of_file().await {
                result = result.and(Err(e));
            }
        }

        if let Err(e) = self.synchronize_state().await {
            result = result.and(Err(e));
        }
        result
    }

    /// Blend `frames` samples of the next track into hardware buffer `index`.
    pub fn process_crossfade(&mut self, index: usize, frames: usize) {
        let frames = frames.min(N);
        let silence = self.buffers.output_format().silence();
        let Some(incoming) = self.incoming.get_mut(..frames) else {
            return;
        };
        let got = self.next.read_samples(incoming).min(frames);
        if let Some(rest) = incoming.get_mut(got..) {
            rest.fill(silence);
        }

        let done = self.buffers.blend_incoming(index, incoming);
        self.fade_ratio = self.buffers.crossfade().progress();
        if done {
            self.buffers.complete_crossfade();
            self.notify_crossfade_complete();
        }
    }

    /// Reconcile the pipeline state with the buffer state.
    ///
    /// Impossible pairs (playing without buffers, stopped with a running
    /// transfer) force a flush and `Stopped`. Otherwise the buffer state
    /// drives the pipeline: no buffers means stopped, an underrun while
    /// playing is recovered, a pause is pushed down to the transfer, and the
    /// crossfade flag is mirrored into `Crossfading`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Buffer`] when recovery cannot restart the transfer.
    pub async fn synchronize_state(&mut self) -> Result<(), PipelineError> {
        let buffers = self.buffers.state();
        let mismatch = (self.state == PipelineState::Playing
            && matches!(buffers, BufferState::Empty | BufferState::Preloading))
            || (self.state == PipelineState::Stopped
                && matches!(buffers, BufferState::Playing | BufferState::Ready));
        if mismatch {
            warn!("state mismatch: pipeline {:?}, buffers {:?}", self.state, buffers);
            self.buffers.flush(false);
            self.transition_pending = false;
            self.reconcile_to(PipelineState::Stopped);
            return Ok(());
        }

        match buffers {
            BufferState::Empty => self.reconcile_to(PipelineState::Stopped),
            BufferState::Underrun => {
                if self.state == PipelineState::Playing {
                    self.underrun().await?;
                } else if self.state != PipelineState::Stopped {
                    self.buffers.flush(false);
                    self.transition_pending = false;
                    self.reconcile_to(PipelineState::Stopped);
                }
            }
            BufferState::Playing => {
                if self.state == PipelineState::Paused {
                    self.buffers.pause();
                }
            }
            BufferState::Preloading => {
                if matches!(self.state, PipelineState::Playing | PipelineState::Crossfading) {
                    self.reconcile_to(PipelineState::Paused);
                }
            }
            BufferState::Ready => {
                if self.state == PipelineState::Paused && !self.transition_pending {
                    self.buffers.resume_playback()?;
                    self.reconcile_to(PipelineState::Playing);
                }
            }
        }

        if self.config.crossfade_enabled && self.buffers.is_crossfade_in_progress() {
            if self.state == PipelineState::Playing {
                self.reconcile_to(PipelineState::Crossfading);
            }
        } else if self.state == PipelineState::Crossfading {
            self.reconcile_to(PipelineState::Playing);
        }
        Ok(())
    }
}
