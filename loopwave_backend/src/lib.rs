//! Real-time playback of looped test signals.
//!
//! [`SignalController`] renders loops on the control thread and hands them
//! to a [`LoopPlayer`] running inside the audio callback. With the
//! `cpal-host` feature, [`OutputStream`] wires both to an output device.

#[cfg(feature = "cpal-host")]
pub mod audio_device;
pub mod control;
pub mod error;
pub mod rt_processing;
#[cfg(feature = "cpal-host")]
pub mod stream;

pub use control::SignalController;
pub use error::{StreamError, StreamResult};
pub use rt_processing::callback::{AudioCallback, CallbackSlot};
pub use rt_processing::loop_player::{LoopPlayer, RenderedLoop};
pub use rt_processing::performance::{PerformanceMonitor, PerformanceSnapshot};
#[cfg(feature = "cpal-host")]
pub use stream::OutputStream;
