//! Sample formats and their per-format kernels.
//!
//! Every sample travels through the core as an `i32` *container*:
//!
//! | Format        | Container contents                                  |
//! |---------------|-----------------------------------------------------|
//! | S8/S16/S24/S32| sign-extended value                                 |
//! | U8/U16/U24    | raw unsigned value (`0..2^bits`)                    |
//! | U32           | raw `u32` bit pattern                               |
//! | F32           | IEEE-754 bit pattern (`f32::to_bits`)               |
//!
//! Arithmetic on a container is only meaningful through a [`SampleKernel`],
//! which is picked once per format change so the per-sample loops carry no
//! format branching. Integer blending runs in Q16 fixed point on a signed
//! working value (unsigned formats have their zero offset removed first) and
//! clamps to the format's range before narrowing.

use crate::error::ConfigError;

/// Q16 unity gain.
pub const Q16_ONE: u32 = 1 << 16;

/// Supported PCM sample formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFormat {
    /// Signed 8-bit
    S8,
    /// Unsigned 8-bit (zero at 0x80)
    U8,
    /// Signed 16-bit
    S16,
    /// Unsigned 16-bit
    U16,
    /// Signed 24-bit
    S24,
    /// Unsigned 24-bit
    U24,
    /// Signed 32-bit
    S32,
    /// Unsigned 32-bit
    U32,
    /// IEEE-754 single precision, nominal range [-1.0, 1.0]
    F32,
}

impl SampleFormat {
    /// Resolve bit depth / float / signedness into a format.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FloatWidth`] for non-32-bit float,
    /// [`ConfigError::BitDepth`] for depths outside {8, 16, 24, 32}.
    pub fn from_parts(bits_per_sample: u8, is_float: bool, is_signed: bool) -> Result<Self, ConfigError> {
        match (bits_per_sample, is_float, is_signed) {
            (32, true, _) => Ok(Self::F32),
            (_, true, _) => Err(ConfigError::FloatWidth),
            (8, false, true) => Ok(Self::S8),
            (8, false, false) => Ok(Self::U8),
            (16, false, true) => Ok(Self::S16),
            (16, false, false) => Ok(Self::U16),
            (24, false, true) => Ok(Self::S24),
            (24, false, false) => Ok(Self::U24),
            (32, false, true) => Ok(Self::S32),
            (32, false, false) => Ok(Self::U32),
            (bits, false, _) => Err(ConfigError::BitDepth(bits)),
        }
    }

    /// Bits per sample.
    pub const fn bits(self) -> u8 {
        match self {
            Self::S8 | Self::U8 => 8,
            Self::S16 | Self::U16 => 16,
            Self::S24 | Self::U24 => 24,
            Self::S32 | Self::U32 | Self::F32 => 32,
        }
    }

    /// Packed bytes per sample: `ceil(bits / 8)`.
    pub const fn bytes_per_sample(self) -> usize {
        (self.bits() as usize).div_ceil(8)
    }

    /// `true` for [`SampleFormat::F32`].
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32)
    }

    /// `true` for signed integer and float formats.
    pub const fn is_signed(self) -> bool {
        !matches!(self, Self::U8 | Self::U16 | Self::U24 | Self::U32)
    }

    /// Container value of digital silence (the zero offset for unsigned formats).
    pub const fn silence(self) -> i32 {
        match self {
            Self::U8 => 0x80,
            Self::U16 => 0x8000,
            Self::U24 => 0x80_0000,
            Self::U32 => i32::MIN,
            _ => 0,
        }
    }

    /// Decode one little-endian packed sample into a container.
    ///
    /// Returns `None` if `bytes` is shorter than [`bytes_per_sample`](Self::bytes_per_sample).
    pub fn decode_le(self, bytes: &[u8]) -> Option<i32> {
        match self {
            Self::S8 => take::<1>(bytes).map(|b| i32::from(i8::from_le_bytes(b))),
            Self::U8 => take::<1>(bytes).map(|b| i32::from(u8::from_le_bytes(b))),
            Self::S16 => take::<2>(bytes).map(|b| i32::from(i16::from_le_bytes(b))),
            Self::U16 => take::<2>(bytes).map(|b| i32::from(u16::from_le_bytes(b))),
            // Shift into the top three bytes, then arithmetic-shift back down
            // to sign-extend.
            Self::S24 => take::<3>(bytes).map(|[a, b, c]| i32::from_le_bytes([0, a, b, c]) >> 8),
            Self::U24 => take::<3>(bytes).map(|[a, b, c]| i32::from_le_bytes([a, b, c, 0])),
            Self::S32 | Self::U32 | Self::F32 => take::<4>(bytes).map(i32::from_le_bytes),
        }
    }

    /// Kernel table for this format.
    pub fn kernel(self) -> SampleKernel {
        match self {
            Self::S8 => SampleKernel::int::<8, true>(),
            Self::U8 => SampleKernel::int::<8, false>(),
            Self::S16 => SampleKernel::int::<16, true>(),
            Self::U16 => SampleKernel::int::<16, false>(),
            Self::S24 => SampleKernel::int::<24, true>(),
            Self::U24 => SampleKernel::int::<24, false>(),
            Self::S32 => SampleKernel::int::<32, true>(),
            Self::U32 => SampleKernel::int::<32, false>(),
            Self::F32 => SampleKernel {
                blend: blend_f32,
                to_q31: f32_to_q31,
                from_q31: f32_from_q31,
            },
        }
    }
}

fn take<const B: usize>(bytes: &[u8]) -> Option<[u8; B]> {
    bytes.get(..B).and_then(|s| <[u8; B]>::try_from(s).ok())
}

/// Per-format sample operations, selected at configure time.
#[derive(Clone, Copy)]
pub struct SampleKernel {
    /// `a * (1 - t) + b * t` with `t` in Q16 (`0..=Q16_ONE`), clamped to range.
    pub blend: fn(i32, i32, u32) -> i32,
    /// Container to left-justified signed Q31.
    pub to_q31: fn(i32) -> i32,
    /// Left-justified signed Q31 to container, clamped to range.
    pub from_q31: fn(i32) -> i32,
}

impl SampleKernel {
    fn int<const BITS: u32, const SIGNED: bool>() -> Self {
        Self {
            blend: blend_int::<BITS, SIGNED>,
            to_q31: int_to_q31::<BITS, SIGNED>,
            from_q31: int_from_q31::<BITS, SIGNED>,
        }
    }

    /// Re-express `raw` (in the format this kernel belongs to) in `target`'s
    /// format.
    pub fn convert_to(&self, target: &Self, raw: i32) -> i32 {
        (target.from_q31)((self.to_q31)(raw))
    }
}

impl core::fmt::Debug for SampleKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SampleKernel")
    }
}

// ── Integer kernels ──────────────────────────────────────────────────────────

/// Bit-cast helpers; `as` would trip the sign-loss lints for what is a pure
/// reinterpretation.
fn bits_u32(raw: i32) -> u32 {
    u32::from_ne_bytes(raw.to_ne_bytes())
}

fn bits_i32(raw: u32) -> i32 {
    i32::from_ne_bytes(raw.to_ne_bytes())
}

/// Signed working value of a container, centred on zero.
#[allow(clippy::arithmetic_side_effects)] // Safety: BITS in 8..=32; u32 minus 2^31 fits i64
fn working<const BITS: u32, const SIGNED: bool>(raw: i32) -> i64 {
    if SIGNED {
        i64::from(raw)
    } else {
        i64::from(bits_u32(raw)) - (1i64 << (BITS - 1))
    }
}

/// Clamp a working value to the format's range and re-apply the zero offset.
#[allow(clippy::arithmetic_side_effects)] // Safety: BITS in 8..=32, all terms within i64
#[allow(clippy::cast_possible_truncation)] // Safety: clamped to 32-bit range; U32 keeps its bit pattern
fn container<const BITS: u32, const SIGNED: bool>(value: i64) -> i32 {
    let half = 1i64 << (BITS - 1);
    let clamped = value.clamp(-half, half - 1);
    if SIGNED {
        clamped as i32
    } else {
        bits_i32((clamped + half) as u32)
    }
}

#[allow(clippy::arithmetic_side_effects)] // Safety: |w| <= 2^31, t <= 2^16, products < 2^48
fn blend_int<const BITS: u32, const SIGNED: bool>(a: i32, b: i32, t_q16: u32) -> i32 {
    let t = i64::from(t_q16.min(Q16_ONE));
    let one = i64::from(Q16_ONE);
    let wa = working::<BITS, SIGNED>(a);
    let wb = working::<BITS, SIGNED>(b);
    let mixed = (wa * (one - t) + wb * t + (1 << 15)) >> 16;
    container::<BITS, SIGNED>(mixed)
}

#[allow(clippy::arithmetic_side_effects)] // Safety: shift amount 0..=24
#[allow(clippy::cast_possible_truncation)] // Safety: clamped working value << (32 - BITS) fits i32
fn int_to_q31<const BITS: u32, const SIGNED: bool>(raw: i32) -> i32 {
    let half = 1i64 << (BITS - 1);
    let w = working::<BITS, SIGNED>(raw).clamp(-half, half - 1);
    (w << (32 - BITS)) as i32
}

#[allow(clippy::arithmetic_side_effects)] // Safety: shift amount 0..=24
fn int_from_q31<const BITS: u32, const SIGNED: bool>(q31: i32) -> i32 {
    container::<BITS, SIGNED>(i64::from(q31) >> (32 - BITS))
}

// ── Float kernels ────────────────────────────────────────────────────────────

fn f32_of(raw: i32) -> f32 {
    f32::from_bits(bits_u32(raw))
}

fn f32_container(value: f32) -> i32 {
    let v = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
    bits_i32(v.to_bits())
}

#[allow(clippy::cast_precision_loss)] // Safety: t_q16 <= 65536 is exact in f32
#[allow(clippy::arithmetic_side_effects)] // float arithmetic
fn blend_f32(a: i32, b: i32, t_q16: u32) -> i32 {
    let t = t_q16.min(Q16_ONE) as f32 / Q16_ONE as f32;
    f32_container(f32_of(a) * (1.0 - t) + f32_of(b) * t)
}

#[allow(clippy::cast_possible_truncation)] // Safety: float-to-int `as` saturates
#[allow(clippy::arithmetic_side_effects)] // float arithmetic
fn f32_to_q31(raw: i32) -> i32 {
    let v = f32_of(raw);
    if v.is_nan() {
        return 0;
    }
    (v.clamp(-1.0, 1.0) * 2_147_483_648.0) as i32
}

#[allow(clippy::cast_precision_loss)] // Safety: 8 bits of precision lost below the f32 mantissa are inaudible
#[allow(clippy::arithmetic_side_effects)] // float arithmetic
fn f32_from_q31(q31: i32) -> i32 {
    f32_container(q31 as f32 / 2_147_483_648.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_sample_is_ceil_of_bits() {
        assert_eq!(SampleFormat::S8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::U16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::S24.bytes_per_sample(), 3);
        assert_eq!(SampleFormat::F32.bytes_per_sample(), 4);
    }

    #[test]
    fn from_parts_validates() {
        assert_eq!(SampleFormat::from_parts(24, false, true), Ok(SampleFormat::S24));
        assert_eq!(SampleFormat::from_parts(32, true, true), Ok(SampleFormat::F32));
        assert_eq!(SampleFormat::from_parts(16, true, true), Err(ConfigError::FloatWidth));
        assert_eq!(SampleFormat::from_parts(12, false, true), Err(ConfigError::BitDepth(12)));
    }

    #[test]
    fn decode_s24_sign_extends() {
        let raw = SampleFormat::S24.decode_le(&[0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(raw, -1);
        let raw = SampleFormat::S24.decode_le(&[0x00, 0x00, 0x80]).unwrap();
        assert_eq!(raw, -8_388_608);
        assert_eq!(SampleFormat::S24.decode_le(&[0x01, 0x02]), None);
    }

    #[test]
    fn decode_unsigned_keeps_raw_value() {
        assert_eq!(SampleFormat::U8.decode_le(&[0xFF]), Some(255));
        assert_eq!(SampleFormat::U16.decode_le(&[0x00, 0x80]), Some(0x8000));
    }

    #[test]
    fn blend_endpoints_are_exact() {
        let k = SampleFormat::S16.kernel();
        assert_eq!((k.blend)(1000, -2000, 0), 1000);
        assert_eq!((k.blend)(1000, -2000, Q16_ONE), -2000);
        assert_eq!((k.blend)(-7, -7, Q16_ONE / 2), -7);
    }

    #[test]
    fn blend_clamps_out_of_range_containers() {
        let k = SampleFormat::S16.kernel();
        assert_eq!((k.blend)(100_000, 100_000, Q16_ONE / 3), 32_767);
        assert_eq!((k.blend)(-100_000, -100_000, Q16_ONE / 3), -32_768);
    }

    #[test]
    fn unsigned_blend_works_around_midpoint() {
        let k = SampleFormat::U8.kernel();
        // 0 and 255 are -128 and +127 in working range; halfway is ~0 -> 0x80.
        let mid = (k.blend)(0, 255, Q16_ONE / 2);
        assert!((127..=128).contains(&mid));
        assert_eq!((k.blend)(255, 255, Q16_ONE / 2), 255);
    }

    #[test]
    fn u32_silence_is_midpoint_bit_pattern() {
        let k = SampleFormat::U32.kernel();
        let s = SampleFormat::U32.silence();
        assert_eq!((k.to_q31)(s), 0);
        assert_eq!((k.blend)(s, s, 12_345), s);
    }

    #[test]
    fn float_blend_clamps_to_unit_range() {
        let k = SampleFormat::F32.kernel();
        let big = f32::to_bits(3.0) as i32;
        let out = f32::from_bits((k.blend)(big, big, Q16_ONE / 2) as u32);
        assert_eq!(out, 1.0);
    }

    #[test]
    fn convert_s16_to_s24_left_justifies() {
        let s16 = SampleFormat::S16.kernel();
        let s24 = SampleFormat::S24.kernel();
        assert_eq!(s16.convert_to(&s24, 0x1234), 0x12_3400);
        assert_eq!(s16.convert_to(&s24, -1), -256);
        assert_eq!(s24.convert_to(&s16, 0x12_3456), 0x1234);
    }

    #[test]
    fn convert_unsigned_to_signed_removes_offset() {
        let u16k = SampleFormat::U16.kernel();
        let s16 = SampleFormat::S16.kernel();
        assert_eq!(u16k.convert_to(&s16, 0x8000), 0);
        assert_eq!(u16k.convert_to(&s16, 0xFFFF), 32_767);
        assert_eq!(u16k.convert_to(&s16, 0), -32_768);
    }

    #[test]
    fn convert_float_to_s16() {
        let f = SampleFormat::F32.kernel();
        let s16 = SampleFormat::S16.kernel();
        let half = f32::to_bits(0.5) as i32;
        assert_eq!(f.convert_to(&s16, half), 16_384);
    }
}
