//! Audio-thread side of a looped signal.

use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};
use loopwave_core::{BlockCursor, IndexWrap, SuperBuffer};

use super::callback::AudioCallback;
use super::performance::PerformanceMonitor;

/// A rendered loop plus everything the audio thread needs to play it,
/// allocated up front on the control thread.
#[derive(Debug)]
pub struct RenderedLoop {
    buffer: SuperBuffer,
    wrap: IndexWrap,
    /// One mono block, refilled from `buffer` at every block boundary.
    staging: Vec<f32>,
}

impl RenderedLoop {
    pub fn new(buffer: SuperBuffer, wrap: IndexWrap) -> Self {
        let staging = vec![0.0; buffer.plan().block_len()];
        Self {
            buffer,
            wrap,
            staging,
        }
    }

    pub fn buffer(&self) -> &SuperBuffer {
        &self.buffer
    }

    pub fn wrap(&self) -> IndexWrap {
        self.wrap
    }
}

/// Plays [`RenderedLoop`]s block by block from the transport callback.
///
/// Transport buffers need not match the loop block length: blocks are
/// staged and handed out across callbacks. New loops are picked up only at
/// block boundaries; the replaced loop is sent back so it is freed off the
/// audio thread.
pub struct LoopPlayer {
    current: RenderedLoop,
    cursor: BlockCursor,
    /// Samples of the staged block already written out.
    staged_pos: usize,
    incoming: Receiver<RenderedLoop>,
    retired: Sender<RenderedLoop>,
    monitor: Arc<PerformanceMonitor>,
}

impl LoopPlayer {
    pub fn new(
        initial: RenderedLoop,
        incoming: Receiver<RenderedLoop>,
        retired: Sender<RenderedLoop>,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        let cursor = BlockCursor::new(initial.wrap);
        Self {
            staged_pos: initial.staging.len(),
            current: initial,
            cursor,
            incoming,
            retired,
            monitor,
        }
    }

    pub fn current(&self) -> &RenderedLoop {
        &self.current
    }

    pub fn cursor(&self) -> &BlockCursor {
        &self.cursor
    }

    /// Take the newest pending loop, if any. The cursor keeps counting.
    fn swap_pending(&mut self) {
        while let Ok(next) = self.incoming.try_recv() {
            self.cursor.set_wrap(next.wrap);
            let old = std::mem::replace(&mut self.current, next);
            // The old loop is freed here, on the audio thread, if the return
            // queue is full (the controller stopped draining) or disconnected
            // (every controller handle was dropped). Neither happens while a
            // controller is publishing: it drains before every send.
            let _ = self.retired.try_send(old);
            self.monitor.increment_loop_swaps();
        }
    }

    fn stage_next_block(&mut self) {
        let plan = self.current.buffer.plan();
        let range = self.cursor.next_range(plan.block_len(), plan.len());
        self.current
            .buffer
            .write_block(range, 1, &mut self.current.staging);
        self.staged_pos = 0;
    }
}

impl AudioCallback for LoopPlayer {
    fn process(&mut self, output: &mut [f32], _sample_rate: f32, channels: usize, frames: usize) {
        let mut frames_out = output[..frames * channels].chunks_exact_mut(channels);

        loop {
            if self.staged_pos == self.current.staging.len() {
                self.swap_pending();
                self.stage_next_block();
            }

            let staged = &self.current.staging[self.staged_pos..];
            let mut written = 0;
            for (&sample, frame) in staged.iter().zip(frames_out.by_ref()) {
                frame.fill(sample);
                written += 1;
            }
            self.staged_pos += written;

            if self.staged_pos < self.current.staging.len() || frames_out.len() == 0 {
                break;
            }
        }
    }
}
