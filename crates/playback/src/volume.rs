//! Volume control mapping for the ES9038Q2M DAC.
//!
//! The DAC attenuates in 0.5 dB steps through an 8-bit register per channel:
//! `0x00` is full scale, `0xFF` is effectively muted. The pipeline writes the
//! same value to both channels.

use platform::audio_types::{AttenuationRegister, VolumePercent};

/// Map a [`VolumePercent`] to an attenuation register value.
///
/// ```text
/// attenuation = (100 - volume_percent) * 255 / 100
/// ```
///
/// | `volume` | Register |
/// |----------|----------|
/// | 0%       | 255      |
/// | 50%      | 127      |
/// | 100%     | 0        |
pub fn volume_to_attenuation(volume: VolumePercent) -> AttenuationRegister {
    AttenuationRegister::from_volume(volume)
}

/// (left, right) attenuation for a balanced stereo volume.
pub fn stereo_attenuation(volume: VolumePercent) -> (AttenuationRegister, AttenuationRegister) {
    let att = volume_to_attenuation(volume);
    (att, att)
}
