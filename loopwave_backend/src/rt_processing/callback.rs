//! Lock-conscious realtime audio callback slot.
//!
//! - No OS mutex or syscall on the audio callback path.
//! - No allocation inside the audio thread.
//! - If the processor is busy (locked elsewhere), output silence.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::atomic::AtomicCell;
use spin::Mutex;

use super::performance::PerformanceMonitor;

/// Trait every realtime processor must implement.
///
/// `process` must not block and must not allocate.
pub trait AudioCallback: Send + 'static {
    /// Fill the interleaved `output` buffer (length == frames * channels).
    fn process(&mut self, output: &mut [f32], sample_rate: f32, channels: usize, frames: usize);
}

/// Holds the processor driven by the transport callback.
///
/// The audio thread takes the spin lock with `try_lock` only; any other
/// thread holding it makes that callback emit silence instead of waiting.
pub struct CallbackSlot {
    processor: Arc<Mutex<Box<dyn AudioCallback>>>,

    /// Frames processed since creation.
    sample_clock: AtomicU64,

    /// Runtime layout of the transport buffers. Written from the control
    /// thread while the stream is rebuilt, read by the audio thread.
    sample_rate: AtomicCell<f32>,
    channels: AtomicCell<usize>,

    monitor: Arc<PerformanceMonitor>,
}

impl CallbackSlot {
    pub fn new(
        processor: Box<dyn AudioCallback>,
        sample_rate: f32,
        channels: usize,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            processor: Arc::new(Mutex::new(processor)),
            sample_clock: AtomicU64::new(0),
            sample_rate: AtomicCell::new(sample_rate),
            channels: AtomicCell::new(channels.max(1)),
            monitor,
        }
    }

    /// Realtime entry called from the transport callback with an interleaved
    /// buffer. Returns `false` if it fell back to silence.
    pub fn process_realtime(&self, output: &mut [f32]) -> bool {
        let channels = self.channels.load();
        let frames = match output.len() / channels {
            0 => return false,
            n => n,
        };

        let _timing = self.monitor.scoped_callback();
        self.sample_clock.fetch_add(frames as u64, Ordering::Relaxed);
        self.monitor.add_frames_processed(frames as u64);

        if let Some(mut guard) = self.processor.try_lock() {
            guard.process(output, self.sample_rate.load(), channels, frames);
            true
        } else {
            output.fill(0.0);
            self.monitor.increment_silent_count();
            false
        }
    }

    /// Playback time in seconds (frames / sample_rate).
    pub fn playback_time(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate.load() as f64
    }

    pub fn frame_count(&self) -> u64 {
        self.sample_clock.load(Ordering::Relaxed)
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Update the buffer layout. Call only while no stream drives this slot.
    pub fn set_runtime_config(&self, sample_rate: f32, channels: usize) {
        self.sample_rate.store(sample_rate);
        self.channels.store(channels.max(1));
    }
}
