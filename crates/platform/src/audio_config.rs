//! SAI clock configuration for the output path.
//!
//! The ES9038Q2M runs as an I²S slave and needs an MCLK locked to the stream
//! sample rate:
//!
//! ```text
//! PLL → SAI kernel clock → MCLK = 256 × fs
//! ```
//!
//! For 44.1 kHz: MCLK = 11.2896 MHz. For 192 kHz: MCLK = 49.152 MHz.

/// MCLK multiplier required by the ES9038Q2M in I²S mode.
pub const MCLK_FS_RATIO: u16 = 256;

/// SAI clock configuration for one stereo stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SaiAudioConfig {
    /// Sample rate in Hz.
    pub sample_rate_hz: u32,
    /// Bit depth per sample slot.
    pub bit_depth: u8,
    /// MCLK = `mclk_div` × `sample_rate_hz`.
    pub mclk_div: u16,
}

impl SaiAudioConfig {
    /// Configuration for a stream format at the standard 256 fs MCLK.
    #[must_use]
    pub fn for_format(sample_rate_hz: u32, bit_depth: u8) -> Self {
        Self {
            sample_rate_hz,
            bit_depth,
            mclk_div: MCLK_FS_RATIO,
        }
    }

    /// Master clock frequency in Hz. Saturates rather than wrapping for
    /// absurd rates.
    #[must_use]
    pub fn mclk_hz(&self) -> u32 {
        self.sample_rate_hz.saturating_mul(u32::from(self.mclk_div))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn mclk_at_44k1_is_11_2896_mhz() {
        let cfg = SaiAudioConfig::for_format(44_100, 16);
        assert_eq!(cfg.mclk_hz(), 11_289_600);
    }

    #[test]
    fn mclk_at_192k_is_49_152_mhz() {
        let cfg = SaiAudioConfig::for_format(192_000, 32);
        assert_eq!(
            cfg.mclk_hz(),
            49_152_000,
            "MCLK must be 49.152 MHz for 192kHz/256fs"
        );
    }

    #[test]
    fn huge_rate_saturates() {
        let cfg = SaiAudioConfig::for_format(u32::MAX, 32);
        assert_eq!(cfg.mclk_hz(), u32::MAX);
    }
}
