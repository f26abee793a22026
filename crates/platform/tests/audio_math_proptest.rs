//! Property-based tests for the volume map and SAI clock math.

#![allow(clippy::arithmetic_side_effects)]

use platform::audio_config::{SaiAudioConfig, MCLK_FS_RATIO};
use platform::audio_types::{AttenuationRegister, VolumePercent};

proptest::proptest! {
    /// Every u8 lands in 0..=100 and agrees with the checked constructor.
    #[test]
    fn saturating_and_checked_constructors_agree(pct in 0u8..=255u8) {
        let v = VolumePercent::new(pct);
        proptest::prop_assert!(v.get() <= 100);
        match VolumePercent::try_new(pct) {
            Ok(checked) => proptest::prop_assert_eq!(checked, v),
            Err(e) => proptest::prop_assert_eq!(e.value, u32::from(pct)),
        }
    }

    /// Louder never means more attenuation.
    #[test]
    fn attenuation_falls_as_volume_rises(a in 0u8..=100u8, b in 0u8..=100u8) {
        let (quiet, loud) = if a <= b { (a, b) } else { (b, a) };
        let q = AttenuationRegister::from_volume(VolumePercent::new(quiet)).get();
        let l = AttenuationRegister::from_volume(VolumePercent::new(loud)).get();
        proptest::prop_assert!(l <= q, "{}% -> {}, {}% -> {}", loud, l, quiet, q);
    }

    /// MCLK tracks the stream rate at 256 fs for every realistic rate.
    #[test]
    fn mclk_is_256_fs(hz in 1u32..=768_000u32, bits in proptest::sample::select(vec![8u8, 16, 24, 32])) {
        let cfg = SaiAudioConfig::for_format(hz, bits);
        proptest::prop_assert_eq!(u64::from(cfg.mclk_hz()), u64::from(hz) * u64::from(MCLK_FS_RATIO));
    }
}
