use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::PeriodicSignal;
use crate::error::{GeneratorError, Result};
use crate::params::{StreamParams, check_finite, check_positive};
use crate::plan::{BufferPlan, MAX_LOOP_SAMPLES, period_len};

/// A pure sine tone `a0 * sin(2π·f0·t + phi0)`.
///
/// The looped period is truncated to whole samples, so the tone plays at
/// `fs / trunc(fs / f0)` rather than exactly `f0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tone {
    pub a0: f64,
    /// Frequency in Hz.
    pub f0: f64,
    /// Starting phase in radians.
    pub phi0: f64,
}

impl Tone {
    pub fn new(a0: f64, f0: f64, phi0: f64) -> Self {
        Self { a0, f0, phi0 }
    }

    /// Frequency actually produced by the looped period at `sample_rate`.
    pub fn effective_frequency(&self, sample_rate: u32) -> f64 {
        sample_rate as f64 / period_len(sample_rate, self.f0) as f64
    }
}

impl Default for Tone {
    fn default() -> Self {
        Self::new(0.1, 1000.0, 0.0)
    }
}

impl PeriodicSignal for Tone {
    fn amplitude(&self) -> f64 {
        self.a0
    }

    fn set_amplitude(&mut self, a0: f64) {
        self.a0 = a0;
    }

    fn validate(&self, stream: &StreamParams) -> Result<()> {
        check_finite("a0", self.a0)?;
        check_finite("phi0", self.phi0)?;
        check_positive("f0", self.f0)?;
        if period_len(stream.sample_rate, self.f0) < 2 {
            return Err(GeneratorError::invalid(
                "f0",
                format!(
                    "{} Hz is above the Nyquist frequency of {} Hz",
                    self.f0,
                    stream.nyquist()
                ),
            ));
        }
        if period_len(stream.sample_rate, self.f0) > MAX_LOOP_SAMPLES {
            return Err(GeneratorError::invalid(
                "f0",
                format!("{} Hz has a period longer than {MAX_LOOP_SAMPLES} samples", self.f0),
            ));
        }
        Ok(())
    }

    fn cycle_len(&self, sample_rate: u32) -> usize {
        period_len(sample_rate, self.f0)
    }

    fn render(&self, plan: &BufferPlan, _sample_rate: u32, out: &mut Vec<f32>) -> Result<()> {
        // Ramp over `ntimes` whole cycles; its end point lands on the start
        // phase again and is left out, so the loop seam is continuous.
        let n = plan.stored_len();
        let step = TAU * plan.ntimes() as f64 / n as f64;

        out.clear();
        out.extend((0..n).map(|k| (self.a0 * (step * k as f64 + self.phi0).sin()) as f32));
        Ok(())
    }
}
