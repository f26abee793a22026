//! Buffer and pipeline configuration.
//!
//! Every setter validates before applying; a rejected configuration leaves the
//! previous one in place.

use crate::decoder::BufferRequirements;
use crate::error::ConfigError;
use crate::format::SampleFormat;

// ── Constants ────────────────────────────────────────────────────────────────

/// Sample store capacity in samples.
pub const SAMPLE_STORE_CAPACITY: usize = 4096;

/// Samples per hardware buffer (two of them are allocated).
pub const HW_BUFFER_SAMPLES: usize = platform::AUDIO_DMA_BUFFER_SAMPLES;

/// Read attempts per replenishment before declaring the source exhausted.
pub const READ_RETRIES: u32 = 3;

/// Back-off between read attempts.
pub const RETRY_DELAY_MS: u32 = 5;

/// Crossfade duration.
pub const CROSSFADE_MS: u32 = 50;

/// Largest single upstream read, in bytes.
pub const MAX_READ_CHUNK_BYTES: usize = 4096;

/// Largest number of source samples pulled for one resampled buffer.
pub const SCRATCH_CAPACITY: usize = 4096;

// ── Watermarks ───────────────────────────────────────────────────────────────

/// Sample store occupancy watermarks, in samples.
///
/// Below `low` replenishment kicks in; it keeps going until `high` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferThresholds {
    /// Low watermark
    pub low: usize,
    /// High watermark
    pub high: usize,
}

impl BufferThresholds {
    /// Validated watermarks for a store of `capacity` samples.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Thresholds`] unless `0 < low <= high <= capacity`.
    pub fn new(low: usize, high: usize, capacity: usize) -> Result<Self, ConfigError> {
        if low == 0 || low > high || high > capacity {
            return Err(ConfigError::Thresholds);
        }
        Ok(Self { low, high })
    }

    /// Quarter / three-quarter watermarks.
    #[allow(clippy::arithmetic_side_effects)] // Safety: division by constants; capacity * 3 / 4 computed as (capacity / 4) * 3
    pub fn default_for(capacity: usize) -> Self {
        let quarter = (capacity / 4).max(1);
        Self {
            low: quarter,
            high: quarter.saturating_mul(3).min(capacity).max(quarter),
        }
    }

    /// Scale both watermarks by `num / den`, keeping `1 <= low <= high <= capacity`.
    pub fn rescaled(self, num: usize, den: usize, capacity: usize) -> Self {
        let scale = |v: usize| -> usize {
            let wide = (v as u128)
                .saturating_mul(num as u128)
                .checked_div(den as u128)
                .unwrap_or(v as u128);
            usize::try_from(wide).unwrap_or(usize::MAX)
        };
        let cap = capacity.max(1);
        let low = scale(self.low).clamp(1, cap);
        let high = scale(self.high).clamp(low, cap);
        Self { low, high }
    }
}

// ── Read chunk sizes ─────────────────────────────────────────────────────────

/// Upstream read sizes in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadChunkConfig {
    /// Smallest worthwhile read
    pub min: usize,
    /// Preferred read
    pub optimal: usize,
    /// Largest read
    pub max: usize,
}

impl ReadChunkConfig {
    /// Validated chunk sizes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ReadChunks`] unless
    /// `0 < min <= optimal <= max <= MAX_READ_CHUNK_BYTES` and `min` is even.
    pub fn new(min: usize, optimal: usize, max: usize) -> Result<Self, ConfigError> {
        if min == 0 || min % 2 != 0 || min > optimal || optimal > max || max > MAX_READ_CHUNK_BYTES {
            return Err(ConfigError::ReadChunks);
        }
        Ok(Self { min, optimal, max })
    }

    /// Derive chunk sizes from a decoder's buffer requirements, capped to what
    /// the read buffer can hold.
    pub fn from_requirements(req: &BufferRequirements) -> Self {
        let max = MAX_READ_CHUNK_BYTES;
        let min = (req.max_frame_size.min(max) & !1).max(2);
        let optimal = req.optimal_buffer_size.clamp(min, max);
        Self { min, optimal, max }
    }

    /// Bytes to request given `free_bytes` of room and the packed sample width.
    ///
    /// `optimal` clamped to `min..=max`, then to the free space, rounded down
    /// to an even byte count and to whole samples. Zero means "no room".
    #[allow(clippy::arithmetic_side_effects)] // Safety: bytes_per_sample >= 1 (checked_rem guards 0)
    pub fn read_size(&self, free_bytes: usize, bytes_per_sample: usize) -> usize {
        let size = self.optimal.clamp(self.min, self.max).min(free_bytes) & !1;
        size - size.checked_rem(bytes_per_sample).unwrap_or(size)
    }
}

impl Default for ReadChunkConfig {
    fn default() -> Self {
        Self {
            min: 512,
            optimal: 2048,
            max: MAX_READ_CHUNK_BYTES,
        }
    }
}

// ── Sample format ────────────────────────────────────────────────────────────

/// Stream sample layout as reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleFormatConfig {
    /// 8, 16, 24 or 32
    pub bits_per_sample: u8,
    /// IEEE float payload (32-bit only)
    pub is_float: bool,
    /// Signed integer payload
    pub is_signed: bool,
}

impl SampleFormatConfig {
    /// Signed integer PCM at `bits_per_sample`.
    pub const fn signed(bits_per_sample: u8) -> Self {
        Self {
            bits_per_sample,
            is_float: false,
            is_signed: true,
        }
    }

    /// Resolve to a [`SampleFormat`].
    ///
    /// # Errors
    ///
    /// See [`SampleFormat::from_parts`].
    pub fn format(&self) -> Result<SampleFormat, ConfigError> {
        SampleFormat::from_parts(self.bits_per_sample, self.is_float, self.is_signed)
    }

    /// `ceil(bits_per_sample / 8)`.
    pub const fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }
}

impl Default for SampleFormatConfig {
    fn default() -> Self {
        Self::signed(16)
    }
}

// ── Rate conversion ──────────────────────────────────────────────────────────

/// Source → target sample rate conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConversionConfig {
    /// Stream rate in Hz
    pub source_rate: u32,
    /// Output rate in Hz
    pub target_rate: u32,
    /// `target_rate / source_rate`, informational; the converter works on
    /// the integer rates directly.
    pub ratio: f32,
    /// `source_rate != target_rate`
    pub enabled: bool,
}

impl ConversionConfig {
    /// Validated conversion between two rates.
    ///
    /// # Errors
    ///
    /// [`ConfigError::SampleRate`] if either rate is zero.
    #[allow(clippy::cast_precision_loss)] // informational ratio only
    #[allow(clippy::arithmetic_side_effects)] // float division, source_rate != 0
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self, ConfigError> {
        if source_rate == 0 || target_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        Ok(Self {
            source_rate,
            target_rate,
            ratio: target_rate as f32 / source_rate as f32,
            enabled: source_rate != target_rate,
        })
    }

    /// Matching rates, no conversion.
    pub fn passthrough(rate: u32) -> Result<Self, ConfigError> {
        Self::new(rate, rate)
    }

    /// `floor(target_frames / ratio)`, at least one.
    pub fn source_frames_needed(&self, target_frames: usize) -> usize {
        if !self.enabled {
            return target_frames;
        }
        let needed = (target_frames as u64)
            .saturating_mul(u64::from(self.source_rate))
            .checked_div(u64::from(self.target_rate))
            .unwrap_or(0);
        usize::try_from(needed).unwrap_or(usize::MAX).max(1)
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            source_rate: 44_100,
            target_rate: 44_100,
            ratio: 1.0,
            enabled: false,
        }
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Per-track pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineConfig {
    /// Stream (and DAC) sample rate in Hz
    pub sample_rate: u32,
    /// Stream bit depth
    pub bit_depth: u8,
    /// Hand over to the next track without a gap
    pub gapless_enabled: bool,
    /// Blend track boundaries (requires gapless)
    pub crossfade_enabled: bool,
}

impl PipelineConfig {
    /// # Errors
    ///
    /// [`ConfigError::SampleRate`] for a zero rate, [`ConfigError::BitDepth`]
    /// for depths outside {8, 16, 24, 32}.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        SampleFormatConfig::signed(self.bit_depth).format().map(|_| ())
    }

    /// Crossfade length in samples: `sample_rate * 50 ms`.
    #[allow(clippy::arithmetic_side_effects)] // Safety: u64 intermediate, result <= sample_rate
    pub fn fade_length_samples(&self) -> u32 {
        let samples = u64::from(self.sample_rate) * u64::from(CROSSFADE_MS) / 1000;
        u32::try_from(samples).unwrap_or(u32::MAX)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bit_depth: 16,
            gapless_enabled: false,
            crossfade_enabled: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::decoder::AudioFormat;

    #[test]
    fn thresholds_reject_inverted_and_oversized() {
        assert_eq!(BufferThresholds::new(10, 5, 100), Err(ConfigError::Thresholds));
        assert_eq!(BufferThresholds::new(0, 5, 100), Err(ConfigError::Thresholds));
        assert_eq!(BufferThresholds::new(10, 101, 100), Err(ConfigError::Thresholds));
        assert!(BufferThresholds::new(10, 10, 100).is_ok());
    }

    #[test]
    fn default_thresholds_are_quarters() {
        let t = BufferThresholds::default_for(4096);
        assert_eq!(t.low, 1024);
        assert_eq!(t.high, 3072);
    }

    #[test]
    fn rescale_doubles_and_clamps() {
        let t = BufferThresholds { low: 1024, high: 3072 };
        let up = t.rescaled(2, 1, 4096);
        assert_eq!(up, BufferThresholds { low: 2048, high: 4096 });
        let down = t.rescaled(1, 4096, 4096);
        assert_eq!(down.low, 1);
        assert!(down.high >= down.low);
    }

    #[test]
    fn read_chunks_validate() {
        assert!(ReadChunkConfig::new(512, 1024, 4096).is_ok());
        assert_eq!(ReadChunkConfig::new(511, 1024, 4096), Err(ConfigError::ReadChunks));
        assert_eq!(ReadChunkConfig::new(512, 256, 4096), Err(ConfigError::ReadChunks));
        assert_eq!(
            ReadChunkConfig::new(512, 1024, MAX_READ_CHUNK_BYTES + 2),
            Err(ConfigError::ReadChunks)
        );
    }

    #[test]
    fn read_size_clamps_to_free_space_and_sample_width() {
        let chunks = ReadChunkConfig::default();
        assert_eq!(chunks.read_size(10_000, 2), 2048);
        assert_eq!(chunks.read_size(1001, 2), 1000);
        // 3-byte samples: even and whole samples -> multiple of 6
        assert_eq!(chunks.read_size(1001, 3), 996);
        assert_eq!(chunks.read_size(0, 2), 0);
    }

    #[test]
    fn chunks_from_requirements_are_capped() {
        let req = AudioFormat::Mp3.buffer_requirements();
        let chunks = ReadChunkConfig::from_requirements(&req);
        assert!(chunks.max <= MAX_READ_CHUNK_BYTES);
        assert!(chunks.min <= chunks.optimal && chunks.optimal <= chunks.max);
        assert_eq!(chunks.min % 2, 0);
    }

    #[test]
    fn conversion_ratio_and_needed_frames() {
        let c = ConversionConfig::new(48_000, 96_000).unwrap();
        assert!(c.enabled);
        assert!((c.ratio - 2.0).abs() < f32::EPSILON);
        assert_eq!(c.source_frames_needed(1024), 512);
        assert_eq!(ConversionConfig::new(0, 44_100), Err(ConfigError::SampleRate));
        assert_eq!(ConversionConfig::new(1, 48_000).unwrap().source_frames_needed(1), 1);
    }

    #[test]
    fn fade_length_is_50ms() {
        let cfg = PipelineConfig {
            sample_rate: 48_000,
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.fade_length_samples(), 2400);
    }

    #[test]
    fn pipeline_config_rejects_bad_depth() {
        let cfg = PipelineConfig {
            bit_depth: 20,
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::BitDepth(20)));
    }
}
