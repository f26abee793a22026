//! DMA-driven audio output abstraction
//!
//! The sink drains one hardware buffer per transfer and raises half/complete
//! interrupts. Interrupt delivery is outside this trait: the board support
//! code forwards those interrupts to the playback core's handoff.

/// Samples per hardware (ping/pong) buffer on the reference board.
pub const AUDIO_DMA_BUFFER_SAMPLES: usize = 1024;

/// Hardware output sink (SAI + DMA on the reference board).
///
/// All methods are non-blocking; they only program the peripheral.
pub trait TransferSink {
    /// Error type
    type Error: core::fmt::Debug;

    /// Hand `samples` to the DMA engine and start (or re-arm) the transfer.
    ///
    /// The caller must not write to `samples` until the matching completion
    /// has been observed.
    fn start_transfer(&mut self, samples: &[i32]) -> Result<(), Self::Error>;

    /// Abort any in-flight transfer.
    fn stop_transfer(&mut self);

    /// Hold the current transfer without releasing its buffer.
    fn pause_transfer(&mut self);
}

impl<T: TransferSink + ?Sized> TransferSink for &mut T {
    type Error = T::Error;

    fn start_transfer(&mut self, samples: &[i32]) -> Result<(), Self::Error> {
        T::start_transfer(self, samples)
    }

    fn stop_transfer(&mut self) {
        T::stop_transfer(self);
    }

    fn pause_transfer(&mut self) {
        T::pause_transfer(self);
    }
}
