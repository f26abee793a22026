//! Format/rate converter: pulls samples from the store into a hardware buffer.
//!
//! Rate conversion is linear interpolation on integer rational indices:
//! output frame `i` sits at source position `i * source / target`, split into
//! an integer index and a Q16 fraction. The upper neighbour is clamped to the
//! last pulled sample, so the converter never extrapolates past the data it
//! has.

use heapless::Vec;

use crate::config::{ConversionConfig, SCRATCH_CAPACITY};
use crate::error::FillError;
use crate::format::{SampleFormat, SampleKernel};
use crate::ring_buffer::RingBuffer;

/// Converter state: active formats, rates and the interpolation scratch.
#[derive(Debug)]
pub struct Converter {
    source_format: SampleFormat,
    output_format: SampleFormat,
    source_kernel: SampleKernel,
    output_kernel: SampleKernel,
    rates: ConversionConfig,
    scratch: Vec<i32, SCRATCH_CAPACITY>,
}

impl Converter {
    /// Pass-through converter for `format` at `rates`.
    pub fn new(format: SampleFormat, rates: ConversionConfig) -> Self {
        Self {
            source_format: format,
            output_format: format,
            source_kernel: format.kernel(),
            output_kernel: format.kernel(),
            rates,
            scratch: Vec::new(),
        }
    }

    /// Format of the samples held in the store.
    pub fn source_format(&self) -> SampleFormat {
        self.source_format
    }

    /// Format written to hardware buffers.
    pub fn output_format(&self) -> SampleFormat {
        self.output_format
    }

    /// Kernel of the output format (used for mixing finished buffers).
    pub fn output_kernel(&self) -> SampleKernel {
        self.output_kernel
    }

    /// Active rate configuration.
    pub fn rates(&self) -> &ConversionConfig {
        &self.rates
    }

    /// Change the stream format. The output format follows unless it was set
    /// separately with [`set_output_format`](Self::set_output_format).
    pub fn set_source_format(&mut self, format: SampleFormat) {
        let follows = self.source_format == self.output_format;
        self.source_format = format;
        self.source_kernel = format.kernel();
        if follows {
            self.set_output_format(format);
        }
    }

    /// Change the hardware buffer format.
    pub fn set_output_format(&mut self, format: SampleFormat) {
        self.output_format = format;
        self.output_kernel = format.kernel();
    }

    /// Change the rates.
    pub fn set_rates(&mut self, rates: ConversionConfig) {
        self.rates = rates;
    }

    /// Source samples a fill of `target_frames` will consume.
    pub fn source_needed(&self, target_frames: usize) -> usize {
        self.rates.source_frames_needed(target_frames)
    }

    /// Fill `out` completely from `store`, returning the source samples consumed.
    ///
    /// Nothing is consumed on failure, so a failed fill can be retried once
    /// the store has been replenished.
    ///
    /// # Errors
    ///
    /// - [`FillError::Memory`] when a resampled fill needs more source samples
    ///   than the scratch buffer holds.
    /// - [`FillError::Underrun`] when the store holds fewer samples than needed.
    pub fn fill<const C: usize>(
        &mut self,
        store: &mut RingBuffer<i32, C>,
        out: &mut [i32],
    ) -> Result<usize, FillError> {
        if self.rates.enabled {
            self.fill_resampled(store, out)
        } else {
            self.fill_direct(store, out)
        }
    }

    fn fill_direct<const C: usize>(
        &mut self,
        store: &mut RingBuffer<i32, C>,
        out: &mut [i32],
    ) -> Result<usize, FillError> {
        if store.available() < out.len() {
            return Err(FillError::Underrun);
        }
        let convert = self.source_format != self.output_format;
        for slot in out.iter_mut() {
            let raw = store.remove().ok_or(FillError::Underrun)?;
            *slot = if convert {
                self.source_kernel.convert_to(&self.output_kernel, raw)
            } else {
                raw
            };
        }
        Ok(out.len())
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: u64 products of usize/u32 values; target_rate != 0 (validated)
    fn fill_resampled<const C: usize>(
        &mut self,
        store: &mut RingBuffer<i32, C>,
        out: &mut [i32],
    ) -> Result<usize, FillError> {
        let needed = self.source_needed(out.len());
        if needed > self.scratch.capacity() {
            return Err(FillError::Memory);
        }
        if store.available() < needed {
            return Err(FillError::Underrun);
        }

        self.scratch.clear();
        for _ in 0..needed {
            let raw = store.remove().ok_or(FillError::Underrun)?;
            self.scratch.push(raw).map_err(|_| FillError::Memory)?;
        }

        let src = u64::from(self.rates.source_rate);
        let tgt = u64::from(self.rates.target_rate);
        let last = needed - 1;
        let convert = self.source_format != self.output_format;

        for (i, slot) in out.iter_mut().enumerate() {
            let pos = i as u64 * src;
            let whole = usize::try_from(pos / tgt).unwrap_or(usize::MAX).min(last);
            let frac = u32::try_from(((pos % tgt) << 16) / tgt).unwrap_or(0);
            let next = (whole + 1).min(last);
            let a = self.scratch.get(whole).copied().unwrap_or(0);
            let b = self.scratch.get(next).copied().unwrap_or(a);
            let value = (self.source_kernel.blend)(a, b, frac);
            *slot = if convert {
                self.source_kernel.convert_to(&self.output_kernel, value)
            } else {
                value
            };
        }
        Ok(needed)
    }
}
