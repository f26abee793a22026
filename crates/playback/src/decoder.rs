//! Decoder-facing contracts: format detection, per-format buffer sizing and
//! the next-track feed used by crossfades.
//!
//! Concrete decoders live outside this crate. The core only needs to know how
//! much data a codec wants per read and whether another track follows.

/// Audio container / codec format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioFormat {
    /// Free Lossless Audio Codec
    Flac,
    /// MPEG Layer 3
    Mp3,
    /// Waveform Audio File Format (PCM or IEEE-float payload)
    Wav,
}

impl AudioFormat {
    /// Detect the audio format from a lowercase file extension.
    ///
    /// Returns `None` when the extension is not recognised. The match is
    /// case-sensitive; callers lower-case the extension first.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "flac" => Some(Self::Flac),
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }

    /// Buffer sizing for this codec, in bytes.
    ///
    /// | Format | Max frame        | Frames per buffer |
    /// |--------|------------------|-------------------|
    /// | MP3    | 1152 × 2ch × 4 B | 32                |
    /// | FLAC   | 65536 × 8ch × 4 B| 4                 |
    /// | WAV    | 4096 × 8ch × 4 B | 8                 |
    #[allow(clippy::arithmetic_side_effects)] // Safety: constant products, all well below usize::MAX on 32-bit
    pub const fn buffer_requirements(self) -> BufferRequirements {
        match self {
            Self::Mp3 => BufferRequirements {
                min_buffer_size: 2 * 1152 * 2 * 4,
                optimal_buffer_size: 32 * 1152 * 2 * 4,
                max_frame_size: 1152 * 2 * 4,
                frames_per_buffer: 32,
            },
            Self::Flac => BufferRequirements {
                min_buffer_size: 4096 * 8 * 4,
                optimal_buffer_size: 65536 * 8 * 4,
                max_frame_size: 65536 * 8 * 4,
                frames_per_buffer: 4,
            },
            Self::Wav => BufferRequirements {
                min_buffer_size: 1024 * 8 * 4,
                optimal_buffer_size: 8192 * 8 * 4,
                max_frame_size: 4096 * 8 * 4,
                frames_per_buffer: 8,
            },
        }
    }
}

/// How much data a codec wants buffered, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferRequirements {
    /// Smallest buffer that decodes at all
    pub min_buffer_size: usize,
    /// Buffer size for steady playback
    pub optimal_buffer_size: usize,
    /// Largest single decoded frame
    pub max_frame_size: usize,
    /// Frames the optimal buffer holds
    pub frames_per_buffer: u32,
}

/// Feed for the track that follows the current one.
///
/// Samples are containers in the hardware buffer format (see
/// [`SampleFormat`](crate::format::SampleFormat)).
pub trait NextTrackSource {
    /// Whether another track is queued.
    fn has_next_track(&self) -> bool;

    /// Fill `out` with the next track's samples, returning how many were
    /// written. Fewer than `out.len()` means the decoder has nothing more
    /// right now.
    fn read_samples(&mut self, out: &mut [i32]) -> usize;
}

impl<T: NextTrackSource + ?Sized> NextTrackSource for &mut T {
    fn has_next_track(&self) -> bool {
        T::has_next_track(self)
    }

    fn read_samples(&mut self, out: &mut [i32]) -> usize {
        T::read_samples(self, out)
    }
}

/// No playlist: there is never a next track.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNextTrack;

impl NextTrackSource for NoNextTrack {
    fn has_next_track(&self) -> bool {
        false
    }

    fn read_samples(&mut self, _out: &mut [i32]) -> usize {
        0
    }
}
