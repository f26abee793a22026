//! Crossfade mixer.
//!
//! Blends the tail of the outgoing track into the head of the incoming one.
//! The gain of the incoming signal follows `fade_curve(position / length)`;
//! the outgoing signal gets the complement. Linear fades run entirely in Q16
//! integer arithmetic; other exponents evaluate the curve in `f32` once per
//! sample and hand a Q16 gain to the format kernel.

use micromath::F32Ext;

use crate::double_buffer::BufferState;
use crate::error::{ConfigError, CrossfadeError};
use crate::format::{SampleFormat, SampleKernel, Q16_ONE};

/// Crossfade parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CrossfadeConfig {
    /// Fade length in samples
    pub fade_length: u32,
    /// `1.0` is linear; `> 1.0` starts slow, `< 1.0` starts fast
    pub curve_exponent: f32,
    /// Whether crossfades may start at all
    pub enabled: bool,
}

impl CrossfadeConfig {
    /// # Errors
    ///
    /// [`ConfigError::Crossfade`] for a zero length or a non-finite /
    /// non-positive exponent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fade_length == 0 || !self.curve_exponent.is_finite() || self.curve_exponent <= 0.0 {
            return Err(ConfigError::Crossfade);
        }
        Ok(())
    }
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            // 50 ms at 44.1 kHz
            fade_length: 2205,
            curve_exponent: 1.0,
            enabled: false,
        }
    }
}

/// Crossfade state with an `N`-sample snapshot of the outgoing buffer.
pub struct Crossfade<const N: usize> {
    config: CrossfadeConfig,
    kernel: SampleKernel,
    in_progress: bool,
    position: u32,
    snapshot: [i32; N],
}

impl<const N: usize> Crossfade<N> {
    /// Idle crossfade mixing `format` samples.
    pub fn new(format: SampleFormat) -> Self {
        Self {
            config: CrossfadeConfig::default(),
            kernel: format.kernel(),
            in_progress: false,
            position: 0,
            snapshot: [format.silence(); N],
        }
    }

    /// Replace the parameters.
    ///
    /// # Errors
    ///
    /// See [`CrossfadeConfig::validate`]; the previous configuration is kept.
    pub fn configure(&mut self, config: CrossfadeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Switch the sample format the mixer blends in.
    pub fn set_format(&mut self, format: SampleFormat) {
        self.kernel = format.kernel();
    }

    /// Current parameters.
    pub fn config(&self) -> &CrossfadeConfig {
        &self.config
    }

    /// Begin a fade, snapshotting the buffer currently being drained.
    ///
    /// # Errors
    ///
    /// - [`CrossfadeError::Disabled`] when crossfading is off
    /// - [`CrossfadeError::InProgress`] when a fade is already running
    /// - [`CrossfadeError::NotPlaying`] unless buffers are `Playing`
    /// - [`CrossfadeError::NoSnapshot`] when there is no snapshot storage
    pub fn start(&mut self, state: BufferState, active: &[i32]) -> Result<(), CrossfadeError> {
        if !self.config.enabled {
            return Err(CrossfadeError::Disabled);
        }
        if self.in_progress {
            return Err(CrossfadeError::InProgress);
        }
        if N == 0 {
            return Err(CrossfadeError::NoSnapshot);
        }
        if state != BufferState::Playing {
            return Err(CrossfadeError::NotPlaying);
        }
        for (dst, &src) in self.snapshot.iter_mut().zip(active) {
            *dst = src;
        }
        self.position = 0;
        self.in_progress = true;
        Ok(())
    }

    /// Abandon the fade.
    pub fn cancel(&mut self) {
        self.in_progress = false;
        self.position = 0;
    }

    /// Whether a fade is running.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// Samples mixed so far.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Fraction of the fade completed, `0.0..=1.0`.
    #[allow(clippy::cast_precision_loss)] // Safety: progress display only
    #[allow(clippy::arithmetic_side_effects)] // float division; fade_length != 0 (validated)
    pub fn progress(&self) -> f32 {
        (self.position as f32 / self.config.fade_length.max(1) as f32).min(1.0)
    }

    /// Outgoing samples captured at [`start`](Self::start).
    pub fn snapshot(&self) -> &[i32] {
        &self.snapshot
    }

    /// `x` for a linear fade, `x^exponent` otherwise.
    #[allow(clippy::float_cmp)] // exact 1.0 selects the linear path
    pub fn fade_curve(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        if self.config.curve_exponent == 1.0 {
            x
        } else {
            F32Ext::powf(x, self.config.curve_exponent)
        }
    }

    /// Incoming-signal gain at `position`, in Q16.
    #[allow(clippy::arithmetic_side_effects)] // Safety: u64 intermediate; position clamped to fade_length
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)] // Safety: gain clamped to 0..=Q16_ONE
    #[allow(clippy::float_cmp)]
    pub fn gain_q16(&self, position: u32) -> u32 {
        let len = self.config.fade_length.max(1);
        let pos = position.min(len);
        if self.config.curve_exponent == 1.0 {
            let scaled = (u64::from(pos) * u64::from(Q16_ONE) + u64::from(len / 2)) / u64::from(len);
            return u32::try_from(scaled).unwrap_or(Q16_ONE).min(Q16_ONE);
        }
        let t = self.fade_curve(pos as f32 / len as f32);
        ((t * Q16_ONE as f32) as u32).min(Q16_ONE)
    }

    /// Blend one outgoing/incoming pair at `position`. Pure.
    pub fn mix(&self, outgoing: i32, incoming: i32, position: u32) -> i32 {
        (self.kernel.blend)(outgoing, incoming, self.gain_q16(position))
    }

    /// Blend at the current position and advance by one sample.
    pub fn mix_next(&mut self, outgoing: i32, incoming: i32) -> i32 {
        let mixed = self.mix(outgoing, incoming, self.position);
        self.advance(1);
        mixed
    }

    /// Advance by `samples`. Returns `true` when this call completed the fade.
    pub fn advance(&mut self, samples: u32) -> bool {
        if !self.in_progress {
            return false;
        }
        self.position = self.position.saturating_add(samples).min(self.config.fade_length);
        if self.position >= self.config.fade_length {
            self.in_progress = false;
            return true;
        }
        false
    }
}
