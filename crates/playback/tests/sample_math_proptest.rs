//! Property-based tests for the sample store, blending and conversion.
//! Verifies invariants hold for ALL valid inputs, not just fixed examples.

#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing, clippy::unwrap_used)]

use std::collections::VecDeque;

use playback::config::ConversionConfig;
use playback::convert::Converter;
use playback::format::Q16_ONE;
use playback::ring_buffer::RingBuffer;
use playback::{Crossfade, CrossfadeConfig, SampleFormat};
use proptest::prelude::*;

const CAP: usize = 16;

fn linear_fade(fade_length: u32) -> Crossfade<8> {
    let mut fade = Crossfade::new(SampleFormat::S16);
    fade.configure(CrossfadeConfig {
        fade_length,
        curve_exponent: 1.0,
        enabled: true,
    })
    .unwrap();
    fade
}

// ── Crossfade cycle ──────────────────────────────────────────────────────────

#[test]
fn linear_fade_hits_both_endpoints() {
    let fade = linear_fade(100);
    assert_eq!(fade.mix(12_000, -8_000, 0), 12_000);
    let near_end = fade.mix(12_000, -8_000, 99);
    assert!((near_end - -8_000).abs() <= 20_000 / 100 + 2, "{near_end}");
}

#[test]
fn fade_completes_at_length() {
    let mut fade = linear_fade(100);
    fade.start(playback::BufferState::Playing, &[0; 8]).unwrap();
    assert!(!fade.advance(99));
    assert!(fade.is_in_progress());
    assert!(fade.advance(1));
    assert!(!fade.is_in_progress());
    assert_eq!(fade.position(), 100);
}

// ── Ratio 1.0 ────────────────────────────────────────────────────────────────

#[test]
fn unit_ratio_is_bit_exact() {
    let mut store: RingBuffer<i32, 64> = RingBuffer::new(0);
    let input: Vec<i32> = (0..32).map(|i| (i * 997) % 32_768 - 16_384).collect();
    for &s in &input {
        assert!(store.append(s));
    }
    let mut conv = Converter::new(SampleFormat::S16, ConversionConfig::passthrough(44_100).unwrap());
    let mut out = [0i32; 32];
    assert_eq!(conv.fill(&mut store, &mut out), Ok(32));
    assert_eq!(out.as_slice(), input.as_slice());
    assert!(store.is_empty());
}

proptest::proptest! {
    /// The store never holds more than its capacity and stays FIFO.
    #[test]
    fn ring_buffer_respects_capacity(ops in prop::collection::vec(prop::option::of(any::<i32>()), 0..256)) {
        let mut rb: RingBuffer<i32, CAP> = RingBuffer::new(0);
        let mut model = VecDeque::new();
        for op in ops {
            match op {
                Some(v) => {
                    let accepted = rb.append(v);
                    prop_assert_eq!(accepted, model.len() < CAP);
                    if accepted {
                        model.push_back(v);
                    }
                }
                None => prop_assert_eq!(rb.remove(), model.pop_front()),
            }
            prop_assert!(rb.available() <= rb.capacity());
            prop_assert_eq!(rb.available(), model.len());
            prop_assert_eq!(rb.available() + rb.free(), CAP);
        }
    }

    /// Blending two in-range 16-bit samples never leaves the 16-bit range.
    #[test]
    fn s16_blend_stays_in_range(a in i16::MIN..=i16::MAX, b in i16::MIN..=i16::MAX, t in 0u32..=Q16_ONE) {
        let k = SampleFormat::S16.kernel();
        let mixed = (k.blend)(i32::from(a), i32::from(b), t);
        prop_assert!(i32::from(i16::MIN) <= mixed && mixed <= i32::from(i16::MAX));
        prop_assert!(mixed >= i32::from(a.min(b)) && mixed <= i32::from(a.max(b)));
    }

    /// Extremes at any factor stay clamped.
    #[test]
    fn s16_extremes_never_overflow(t in 0u32..=Q16_ONE) {
        let k = SampleFormat::S16.kernel();
        prop_assert_eq!((k.blend)(32_767, 32_767, t), 32_767);
        prop_assert_eq!((k.blend)(-32_768, -32_768, t), -32_768);
    }

    /// 24-bit signed blends stay within 24 bits.
    #[test]
    fn s24_blend_stays_in_range(a in -8_388_608i32..=8_388_607, b in -8_388_608i32..=8_388_607, t in 0u32..=Q16_ONE) {
        let mixed = (SampleFormat::S24.kernel().blend)(a, b, t);
        prop_assert!((-8_388_608..=8_388_607).contains(&mixed));
    }

    /// Unsigned formats blend around the midpoint and stay in range.
    #[test]
    fn unsigned_blend_stays_in_range(a in 0i32..=255, b in 0i32..=255, wa in 0i32..=65_535, wb in 0i32..=65_535, t in 0u32..=Q16_ONE) {
        let u8_mixed = (SampleFormat::U8.kernel().blend)(a, b, t);
        prop_assert!((0..=255).contains(&u8_mixed));
        let u16_mixed = (SampleFormat::U16.kernel().blend)(wa, wb, t);
        prop_assert!((0..=65_535).contains(&u16_mixed));
    }

    /// Float blends stay finite and within full scale.
    #[test]
    fn f32_blend_stays_in_range(a in -1.0f32..=1.0, b in -1.0f32..=1.0, t in 0u32..=Q16_ONE) {
        let raw = |v: f32| i32::from_ne_bytes(v.to_bits().to_ne_bytes());
        let mixed = (SampleFormat::F32.kernel().blend)(raw(a), raw(b), t);
        let value = f32::from_bits(u32::from_ne_bytes(mixed.to_ne_bytes()));
        prop_assert!(value.is_finite());
        prop_assert!((-1.0..=1.0).contains(&value));
    }

    /// A linear fade between two constants moves monotonically.
    #[test]
    fn linear_fade_is_monotonic(x in -20_000i32..=20_000, y in -20_000i32..=20_000, len in 1u32..=400) {
        let fade = linear_fade(len);
        let mut previous = fade.mix(x, y, 0);
        prop_assert_eq!(previous, x);
        for position in 1..=len {
            let current = fade.mix(x, y, position);
            if y >= x {
                prop_assert!(current >= previous);
            } else {
                prop_assert!(current <= previous);
            }
            previous = current;
        }
        prop_assert_eq!(previous, y);
    }

    /// Upsampled output never overshoots its input.
    #[test]
    fn upsampling_interpolates_between_neighbours(input in prop::collection::vec(-30_000i32..=30_000, 32)) {
        let mut store: RingBuffer<i32, 64> = RingBuffer::new(0);
        for &s in &input {
            prop_assert!(store.append(s));
        }
        let mut conv = Converter::new(SampleFormat::S16, ConversionConfig::new(22_050, 44_100).unwrap());
        let mut out = [0i32; 32];
        let consumed = conv.fill(&mut store, &mut out).unwrap();
        prop_assert_eq!(consumed, 16);
        let lo = *input[..consumed].iter().min().unwrap();
        let hi = *input[..consumed].iter().max().unwrap();
        for v in out {
            prop_assert!(lo <= v && v <= hi);
        }
        prop_assert_eq!(out[0], input[0]);
    }
}
