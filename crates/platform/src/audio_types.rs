//! Volume newtypes for the DAC control path.
//!
//! A volume setting only reaches the DAC as an [`AttenuationRegister`], and
//! the only way to build one is from a [`VolumePercent`], so an out-of-range
//! percentage can never be written to the chip.

// ── Error type ───────────────────────────────────────────────────────────────

/// A value fell outside its inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("value {value} outside {min}..={max}")]
pub struct OutOfRangeError {
    /// Rejected value
    pub value: u32,
    /// Lowest accepted value
    pub min: u32,
    /// Highest accepted value
    pub max: u32,
}

// ── VolumePercent ────────────────────────────────────────────────────────────

/// Output volume, 0 (silent) to 100 (full scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct VolumePercent(u8);

impl VolumePercent {
    /// Full scale.
    pub const MAX: Self = Self(100);

    /// Saturating constructor: anything above 100 becomes 100.
    #[must_use]
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Checked constructor.
    ///
    /// # Errors
    ///
    /// [`OutOfRangeError`] when `percent > 100`.
    pub fn try_new(percent: u8) -> Result<Self, OutOfRangeError> {
        if percent <= 100 {
            return Ok(Self(percent));
        }
        Err(OutOfRangeError {
            value: u32::from(percent),
            min: 0,
            max: 100,
        })
    }

    /// Percentage, `0..=100`.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for VolumePercent {
    fn default() -> Self {
        Self::MAX
    }
}

// ── AttenuationRegister ──────────────────────────────────────────────────────

/// DAC attenuation register: `0x00` is 0 dB, `0xFF` is mute.
///
/// Linear in the percentage: `(100 - percent) * 255 / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct AttenuationRegister(u8);

impl AttenuationRegister {
    /// Full attenuation.
    pub const MUTE: Self = Self(0xFF);

    /// Register value for `volume`.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: percent <= 100, product <= 25_500
    #[allow(clippy::cast_possible_truncation)] // Safety: quotient <= 255
    pub fn from_volume(volume: VolumePercent) -> Self {
        let headroom = u16::from(100 - volume.get());
        Self((headroom * 255 / 100) as u8)
    }

    /// Raw register value.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}
