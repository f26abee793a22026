//! Hardware Abstraction Layer (HAL) for the audio playback core
//!
//! This crate provides trait-based abstractions for every collaborator the
//! playback core talks to, enabling development and testing without physical
//! hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware: UI, catalog, task spawning)
//!         ↓
//! Playback core (double buffer, converter, crossfade, pipeline)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + PAC)
//! ```
//!
//! # Collaborators
//!
//! - [`DacControl`] - DAC/codec control (power, volume, clock)
//! - [`TransferSink`] - DMA-driven I²S output that drains hardware buffers
//! - [`StreamSource`] - Upstream decoded-data reader (file/decoder)
//!
//! # Features
//!
//! - `std`: Expose [`mocks`] to downstream test suites
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```no_run
//! use platform::DacControl;
//!
//! async fn example<D: DacControl>(dac: &mut D) {
//!     let _ = dac.power_up().await;
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // register names and chip part numbers in doc comments
#![allow(clippy::must_use_candidate)] // accessors; callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod audio;
pub mod audio_config;
pub mod audio_types;
pub mod dma;
pub mod storage;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export main high-level traits
pub use audio::DacControl;
pub use storage::StreamSource;

// Re-export DMA types
pub use dma::{TransferSink, AUDIO_DMA_BUFFER_SAMPLES};
