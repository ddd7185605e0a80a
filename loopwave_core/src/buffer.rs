use crate::cursor::BlockRange;
use crate::error::Result;
use crate::params::StreamParams;
use crate::plan::BufferPlan;
use crate::signal::PeriodicSignal;

/// One rendered loop.
///
/// Logically the loop is `plan.len()` samples long. Only `plan.stored_len()`
/// samples are kept; since both lengths are multiples of the natural period,
/// logical index `k` reads stored sample `k % stored_len`. Samples are stored
/// once and copied into every output channel.
#[derive(Debug, Clone)]
pub struct SuperBuffer {
    samples: Vec<f32>,
    plan: BufferPlan,
    sample_rate: u32,
}

impl SuperBuffer {
    /// Validate `signal` against `stream` and render its loop.
    pub fn render<S: PeriodicSignal>(signal: &S, stream: &StreamParams) -> Result<Self> {
        let mut buffer = Self {
            samples: Vec::new(),
            plan: BufferPlan::new(1, 1)?,
            sample_rate: stream.sample_rate,
        };
        buffer.rerender(signal, stream)?;
        Ok(buffer)
    }

    /// Render `signal` into this buffer, reusing its allocation.
    pub fn rerender<S: PeriodicSignal>(&mut self, signal: &S, stream: &StreamParams) -> Result<()> {
        stream.validate()?;
        signal.validate(stream)?;

        let plan = signal.plan(stream)?;
        signal.render(&plan, stream.sample_rate, &mut self.samples)?;
        debug_assert_eq!(self.samples.len(), plan.stored_len());

        self.plan = plan;
        self.sample_rate = stream.sample_rate;
        Ok(())
    }

    pub fn plan(&self) -> &BufferPlan {
        &self.plan
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Logical loop length `N`.
    pub fn len(&self) -> usize {
        self.plan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The rendered samples, `ntimes` natural periods.
    pub fn stored(&self) -> &[f32] {
        &self.samples
    }

    /// Sample at logical index `k` of the loop.
    #[inline]
    pub fn sample(&self, k: usize) -> f32 {
        self.samples[k % self.samples.len()]
    }

    /// Copy the block `range` into `out`, interleaved over `channels`
    /// with the same sample on every channel.
    ///
    /// `out` must hold `range.len() * channels` samples. No allocation.
    pub fn write_block(&self, range: BlockRange, channels: usize, out: &mut [f32]) {
        debug_assert_eq!(out.len(), range.len() * channels);

        let stored = self.samples.len();
        // Stored index of the first sample; advanced alongside the logical index.
        let mut pos = range.start() % stored;
        let mut logical = range.start();

        for frame in out.chunks_exact_mut(channels) {
            frame.fill(self.samples[pos]);

            logical += 1;
            pos += 1;
            if logical == range.modulus() {
                logical = 0;
                pos = 0;
            } else if pos == stored {
                pos = 0;
            }
        }
    }
}
