//! Audio playback core: sample store, format/rate conversion, crossfade,
//! DMA double buffering and the pipeline state machine.
//!
//! # Layout
//!
//! ```text
//!  StreamSource ─▶ BufferManager ──────────────▶ TransferSink
//!                   ├ RingBuffer (sample store)     ▲
//!                   ├ Converter                     │ TransferHandoff (ISR)
//!                   └ Crossfade                     │
//!                        ▲                          │
//!  NextTrackSource ─▶ Pipeline ──▶ DacControl       │
//!                        ▲                          │
//!                   task::run ─────────────────────┘
//! ```
//!
//! # Features
//!
//! - `std`: log through `tracing`, expose `platform::mocks`
//! - `defmt`: log through `defmt`, derive `defmt::Format` on public types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(async_fn_in_trait)]

#[macro_use]
mod fmt;

pub mod config;
pub mod convert;
pub mod crossfade;
pub mod decoder;
pub mod double_buffer;
pub mod error;
pub mod format;
pub mod handoff;
pub mod pipeline;
pub mod ring_buffer;
pub mod stats;
pub mod task;
pub mod volume;

pub use config::{BufferThresholds, ConversionConfig, PipelineConfig, ReadChunkConfig, SampleFormatConfig};
pub use crossfade::{Crossfade, CrossfadeConfig};
pub use decoder::{AudioFormat, BufferRequirements, NextTrackSource, NoNextTrack};
pub use double_buffer::{BufferManager, BufferState};
pub use error::{BufferError, ConfigError, CrossfadeError, FillError, PipelineError, ReplenishError};
pub use format::SampleFormat;
pub use handoff::TransferHandoff;
pub use pipeline::{Pipeline, PipelineObserver, PipelineState};
pub use stats::{BufferStats, UnderrunCause, UnderrunObserver, UnderrunReport};
