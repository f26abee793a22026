//! Volume newtype behaviour as seen by the playback pipeline.

#![allow(clippy::unwrap_used)]

use platform::audio_types::{AttenuationRegister, VolumePercent};

// ── VolumePercent ────────────────────────────────────────────────────────────

#[test]
fn new_saturates_at_full_scale() {
    assert_eq!(VolumePercent::new(150), VolumePercent::MAX);
    assert_eq!(VolumePercent::new(0).get(), 0);
}

#[test]
fn try_new_reports_the_rejected_value() {
    let err = VolumePercent::try_new(101).unwrap_err();
    assert_eq!((err.value, err.min, err.max), (101, 0, 100));
    assert_eq!(VolumePercent::try_new(100).unwrap(), VolumePercent::MAX);
}

#[test]
fn default_is_full_scale() {
    assert_eq!(VolumePercent::default(), VolumePercent::MAX);
}

#[test]
fn volume_is_a_single_byte() {
    assert_eq!(core::mem::size_of::<VolumePercent>(), 1);
    assert_eq!(core::mem::size_of::<AttenuationRegister>(), 1);
}

// ── AttenuationRegister ──────────────────────────────────────────────────────

#[test]
fn full_scale_is_zero_attenuation() {
    assert_eq!(AttenuationRegister::from_volume(VolumePercent::MAX).get(), 0);
}

#[test]
fn silence_is_mute() {
    assert_eq!(
        AttenuationRegister::from_volume(VolumePercent::new(0)),
        AttenuationRegister::MUTE
    );
}

#[test]
fn quarter_steps_follow_the_linear_map() {
    let regs: Vec<u8> = [25, 50, 75]
        .into_iter()
        .map(|p| AttenuationRegister::from_volume(VolumePercent::new(p)).get())
        .collect();
    assert_eq!(regs, vec![191, 127, 63]);
}
