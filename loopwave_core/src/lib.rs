//! Seamless looped test signals.
//!
//! A periodic signal is rendered once into a [`SuperBuffer`] whose logical
//! length is a common multiple of the signal period and the audio block
//! length, then served block by block through a [`BlockCursor`]. Every block
//! continues the phase of the previous one, including across the loop seam.

pub mod buffer;
pub mod cursor;
pub mod error;
pub mod generator;
pub mod params;
pub mod plan;
pub mod signal;

pub use buffer::SuperBuffer;
pub use cursor::{BlockCursor, BlockRange, IndexWrap};
pub use error::{GeneratorError, Result};
pub use generator::Generator;
pub use params::{GeneratorConfig, SignalParams, StreamParams};
pub use plan::{BufferPlan, MAX_LOOP_SAMPLES, gcd, lcm};
pub use signal::PeriodicSignal;
pub use signal::sweep::{LogSweep, log_sweep};
pub use signal::tone::Tone;
