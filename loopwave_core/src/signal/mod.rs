pub mod sweep;
pub mod tone;

use crate::error::Result;
use crate::params::{SignalParams, StreamParams};
use crate::plan::BufferPlan;

/// A signal that repeats after a whole number of samples and can therefore
/// be rendered once and looped.
pub trait PeriodicSignal: Clone + PartialEq + Send + 'static {
    /// Linear gain applied to the rendered samples.
    fn amplitude(&self) -> f64;

    fn set_amplitude(&mut self, a0: f64);

    /// Reject parameter sets that cannot produce a finite loop.
    fn validate(&self, stream: &StreamParams) -> Result<()>;

    /// Samples after which the signal repeats at `sample_rate`.
    fn cycle_len(&self, sample_rate: u32) -> usize;

    fn plan(&self, stream: &StreamParams) -> Result<BufferPlan> {
        BufferPlan::new(self.cycle_len(stream.sample_rate), stream.block_len)
    }

    /// Replace the contents of `out` with `plan.stored_len()` samples.
    fn render(&self, plan: &BufferPlan, sample_rate: u32, out: &mut Vec<f32>) -> Result<()>;
}

impl PeriodicSignal for SignalParams {
    fn amplitude(&self) -> f64 {
        match self {
            Self::Tone(tone) => tone.amplitude(),
            Self::Sweep(sweep) => sweep.amplitude(),
        }
    }

    fn set_amplitude(&mut self, a0: f64) {
        match self {
            Self::Tone(tone) => tone.set_amplitude(a0),
            Self::Sweep(sweep) => sweep.set_amplitude(a0),
        }
    }

    fn validate(&self, stream: &StreamParams) -> Result<()> {
        match self {
            Self::Tone(tone) => tone.validate(stream),
            Self::Sweep(sweep) => sweep.validate(stream),
        }
    }

    fn cycle_len(&self, sample_rate: u32) -> usize {
        match self {
            Self::Tone(tone) => tone.cycle_len(sample_rate),
            Self::Sweep(sweep) => sweep.cycle_len(sample_rate),
        }
    }

    fn render(&self, plan: &BufferPlan, sample_rate: u32, out: &mut Vec<f32>) -> Result<()> {
        match self {
            Self::Tone(tone) => tone.render(plan, sample_rate, out),
            Self::Sweep(sweep) => sweep.render(plan, sample_rate, out),
        }
    }
}
