//! DAC / codec control abstraction
//!
//! The audio stream itself reaches the DAC over I²S (see [`crate::dma`]);
//! this trait covers the out-of-band control path (I²C on the ES9038Q2M).

use crate::audio_types::AttenuationRegister;

/// DAC control trait
pub trait DacControl {
    /// Error type
    type Error: core::fmt::Debug;

    /// Wake the DAC from soft power-down.
    async fn power_up(&mut self) -> Result<(), Self::Error>;

    /// Enter soft power-down (mute + low-power state).
    async fn power_down(&mut self) -> Result<(), Self::Error>;

    /// Write per-channel attenuation.
    async fn set_volume(
        &mut self,
        left: AttenuationRegister,
        right: AttenuationRegister,
    ) -> Result<(), Self::Error>;

    /// Reprogram the DAC clocking for a new stream format.
    ///
    /// `master_clock_hz` is the MCLK the SAI will drive (see
    /// [`crate::audio_config::SaiAudioConfig::mclk_hz`]).
    async fn configure_clock(
        &mut self,
        sample_rate: u32,
        master_clock_hz: u32,
    ) -> Result<(), Self::Error>;
}

impl<T: DacControl + ?Sized> DacControl for &mut T {
    type Error = T::Error;

    async fn power_up(&mut self) -> Result<(), Self::Error> {
        T::power_up(self).await
    }

    async fn power_down(&mut self) -> Result<(), Self::Error> {
        T::power_down(self).await
    }

    async fn set_volume(
        &mut self,
        left: AttenuationRegister,
        right: AttenuationRegister,
    ) -> Result<(), Self::Error> {
        T::set_volume(self, left, right).await
    }

    async fn configure_clock(
        &mut self,
        sample_rate: u32,
        master_clock_hz: u32,
    ) -> Result<(), Self::Error> {
        T::configure_clock(self, sample_rate, master_clock_hz).await
    }
}
