//! Error types for the playback core.
//!
//! All errors are small `Copy` enums; collaborator errors are mapped into
//! these at the boundary and not retained.

use thiserror_no_std::Error;

use crate::double_buffer::BufferState;
use crate::pipeline::PipelineState;

/// Rejected configuration. Prior configuration is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Thresholds must satisfy `0 < low <= high <= capacity`.
    #[error("invalid watermark thresholds")]
    Thresholds,
    /// Chunk sizes must satisfy `0 < min <= optimal <= max <= limit`, `min` even.
    #[error("invalid read chunk sizes")]
    ReadChunks,
    /// Sample rates must be non-zero.
    #[error("sample rate must be non-zero")]
    SampleRate,
    /// Bit depth outside {8, 16, 24, 32}.
    #[error("unsupported bit depth {0}")]
    BitDepth(u8),
    /// Float samples are only supported at 32 bits.
    #[error("float samples must be 32-bit")]
    FloatWidth,
    /// Fade length must be non-zero and the curve exponent finite and positive.
    #[error("invalid crossfade parameters")]
    Crossfade,
}

/// Failure to produce a full hardware buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FillError {
    /// The sample store ran dry.
    #[error("sample store underrun")]
    Underrun,
    /// The conversion scratch buffer is too small for the request.
    #[error("conversion scratch exhausted")]
    Memory,
}

/// Double buffer manager failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Operation not valid in the current buffer state.
    #[error("operation invalid in buffer state {0:?}")]
    InvalidState(BufferState),
    /// A hardware buffer could not be filled.
    #[error("buffer fill failed: {0}")]
    Fill(#[from] FillError),
    /// The sink refused to start a transfer.
    #[error("transfer start failed")]
    Transfer,
    /// The upstream source refused to seek.
    #[error("source seek failed")]
    Seek,
}

/// Replenishment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplenishError {
    /// Every read attempt returned no data.
    #[error("read retries exhausted")]
    RetriesExhausted,
}

/// Crossfade could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrossfadeError {
    /// Crossfade is disabled.
    #[error("crossfade disabled")]
    Disabled,
    /// A crossfade is already running.
    #[error("crossfade already in progress")]
    InProgress,
    /// Buffers are not in the `Playing` state.
    #[error("buffers not playing")]
    NotPlaying,
    /// No snapshot storage is available.
    #[error("no snapshot buffer")]
    NoSnapshot,
}

/// Playback pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineError {
    /// The transition table forbids `from -> to`.
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state
        from: PipelineState,
        /// Requested state
        to: PipelineState,
    },
    /// The operation needs the pipeline to be playing.
    #[error("pipeline not playing")]
    NotPlaying,
    /// The buffer manager failed.
    #[error("buffer: {0}")]
    Buffer(#[from] BufferError),
    /// The DAC rejected a control command.
    #[error("DAC control failed")]
    Dac,
    /// Rejected configuration.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// Seeking the upstream source failed.
    #[error("seek failed")]
    Seek,
}
