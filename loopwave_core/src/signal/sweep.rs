use std::f64::consts::TAU;

use log::warn;
use serde::{Deserialize, Serialize};

use super::PeriodicSignal;
use crate::error::{GeneratorError, Result};
use crate::params::{StreamParams, check_finite, check_positive};
use crate::plan::{BufferPlan, MAX_LOOP_SAMPLES};

/// Exponential sine sweep from `fstart` to `fstop` over `len_sec` seconds,
/// followed by `pause_sec` seconds of silence before it repeats.
///
/// The instantaneous frequency moves by a constant ratio per second:
///
/// ```text
/// ω1 = 2π·fstart,  c = ln(fstop / fstart)
/// φ(t) = ω1·(len_sec / c)·(e^(t·c / len_sec) − 1)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSweep {
    pub a0: f64,
    pub fstart: f64,
    pub fstop: f64,
    pub len_sec: f64,
    pub pause_sec: f64,
}

impl LogSweep {
    pub fn new(a0: f64, fstart: f64, fstop: f64, len_sec: f64, pause_sec: f64) -> Self {
        Self {
            a0,
            fstart,
            fstop,
            len_sec,
            pause_sec,
        }
    }

    /// Samples in the audible part of the sweep.
    pub fn sweep_samples(&self, sample_rate: u32) -> usize {
        (self.len_sec * sample_rate as f64).round() as usize
    }

    /// Samples of silence appended after the sweep.
    pub fn pause_samples(&self, sample_rate: u32) -> usize {
        (self.pause_sec * sample_rate as f64).round() as usize
    }

    fn rate(&self) -> f64 {
        (self.fstop / self.fstart).ln()
    }

    /// Instantaneous phase in radians at `t` seconds into the sweep.
    pub fn phase_at(&self, t: f64) -> f64 {
        let c = self.rate();
        TAU * self.fstart * (self.len_sec / c) * ((t * c / self.len_sec).exp() - 1.0)
    }

    /// Instantaneous frequency in Hz at `t` seconds into the sweep.
    pub fn instantaneous_frequency(&self, t: f64) -> f64 {
        self.fstart * (t * self.rate() / self.len_sec).exp()
    }
}

impl Default for LogSweep {
    fn default() -> Self {
        Self::new(0.1, 125.0, 8000.0, 2.0, 0.5)
    }
}

impl PeriodicSignal for LogSweep {
    fn amplitude(&self) -> f64 {
        self.a0
    }

    fn set_amplitude(&mut self, a0: f64) {
        self.a0 = a0;
    }

    fn validate(&self, stream: &StreamParams) -> Result<()> {
        check_finite("a0", self.a0)?;
        check_positive("fstart", self.fstart)?;
        check_positive("fstop", self.fstop)?;
        check_positive("len_sec", self.len_sec)?;
        check_finite("pause_sec", self.pause_sec)?;
        if self.pause_sec < 0.0 {
            return Err(GeneratorError::invalid("pause_sec", "must not be negative"));
        }
        // ln(fstop / fstart) == 0 would divide by zero in the phase.
        if self.fstart == self.fstop {
            return Err(GeneratorError::invalid(
                "fstop",
                format!("must differ from fstart ({} Hz)", self.fstart),
            ));
        }
        if self.sweep_samples(stream.sample_rate) == 0 {
            return Err(GeneratorError::invalid(
                "len_sec",
                format!("{} s is shorter than one sample", self.len_sec),
            ));
        }
        if self.cycle_len(stream.sample_rate) > MAX_LOOP_SAMPLES {
            let name = if self.sweep_samples(stream.sample_rate) > MAX_LOOP_SAMPLES {
                "len_sec"
            } else {
                "pause_sec"
            };
            return Err(GeneratorError::invalid(
                name,
                format!(
                    "sweep plus pause ({} s + {} s) exceeds {MAX_LOOP_SAMPLES} samples",
                    self.len_sec, self.pause_sec
                ),
            ));
        }
        Ok(())
    }

    fn cycle_len(&self, sample_rate: u32) -> usize {
        self.sweep_samples(sample_rate)
            .saturating_add(self.pause_samples(sample_rate))
    }

    fn render(&self, plan: &BufferPlan, sample_rate: u32, out: &mut Vec<f32>) -> Result<()> {
        let nyquist = sample_rate as f64 / 2.0;
        if self.fstart.max(self.fstop) > nyquist {
            warn!(
                "sweep {}..{} Hz exceeds Nyquist ({} Hz) and will alias",
                self.fstart, self.fstop, nyquist
            );
        }

        let cycle = plan.period_len();
        let dt = 1.0 / sample_rate as f64;

        out.clear();
        out.reserve(plan.stored_len());
        out.extend(
            (0..self.sweep_samples(sample_rate))
                .map(|k| (self.a0 * self.phase_at(k as f64 * dt).sin()) as f32),
        );
        out.resize(cycle, 0.0);
        for _ in 1..plan.ntimes() {
            out.extend_from_within(..cycle);
        }
        Ok(())
    }
}

/// Unscaled exponential sweep: returns the time axis in seconds and the
/// signal, `round(len_sec * sample_rate)` points each.
pub fn log_sweep(
    fstart: f64,
    fstop: f64,
    len_sec: f64,
    sample_rate: u32,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let sweep = LogSweep::new(1.0, fstart, fstop, len_sec, 0.0);
    sweep.validate(&StreamParams {
        sample_rate,
        ..StreamParams::default()
    })?;

    let dt = 1.0 / sample_rate as f64;
    let t: Vec<f64> = (0..sweep.sweep_samples(sample_rate))
        .map(|k| k as f64 * dt)
        .collect();
    let s = t.iter().map(|&t| sweep.phase_at(t).sin()).collect();
    Ok((t, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_then_pause_lengths() {
        let stream = StreamParams::new(44100, 1024, 2);
        let sweep = LogSweep::new(0.1, 125.0, 8000.0, 2.0, 0.5);
        let plan = sweep.plan(&stream).unwrap();

        assert_eq!(sweep.sweep_samples(44100), 88200);
        assert_eq!(sweep.pause_samples(44100), 22050);
        assert_eq!(plan.period_len(), 88200 + 22050);
        assert_eq!(plan.ntimes(), 1);
        assert_eq!(plan.len() % plan.period_len(), 0);
        assert_eq!(plan.len() % 1024, 0);

        let mut out = Vec::new();
        sweep.render(&plan, 44100, &mut out).unwrap();
        assert_eq!(out.len(), 88200 + 22050);
        assert!(out[..88200].iter().all(|s| s.is_finite() && s.abs() <= 0.1 + 1e-6));
        assert!(out[..88200].iter().any(|s| s.abs() > 0.05));
        assert!(out[88200..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_short_cycle_is_repeated_to_fill_a_block() {
        let stream = StreamParams::new(1000, 256, 1);
        let sweep = LogSweep::new(1.0, 10.0, 100.0, 0.05, 0.05);
        let plan = sweep.plan(&stream).unwrap();
        assert_eq!(plan.period_len(), 100);
        assert_eq!(plan.ntimes(), 3);

        let mut out = Vec::new();
        sweep.render(&plan, 1000, &mut out).unwrap();
        assert_eq!(out.len(), 300);
        assert_eq!(&out[..100], &out[100..200]);
        assert_eq!(&out[..100], &out[200..]);
    }

    #[test]
    fn test_instantaneous_frequency_endpoints_and_monotonic() {
        let sweep = LogSweep::new(0.1, 125.0, 8000.0, 2.0, 0.5);
        let h = 1e-6;
        let numeric = |t: f64| (sweep.phase_at(t + h) - sweep.phase_at(t - h)) / (2.0 * h * TAU);

        assert!((sweep.instantaneous_frequency(0.0) - 125.0).abs() < 1e-9);
        assert!((sweep.instantaneous_frequency(2.0) - 8000.0).abs() < 1e-6);
        assert!((numeric(0.0) - 125.0).abs() < 1e-2);
        assert!((numeric(2.0) - 8000.0).abs() < 1e-1);

        let mut previous = 0.0;
        for i in 0..=200 {
            let f = numeric(i as f64 * 0.01);
            assert!(f > previous, "not increasing at step {i}");
            previous = f;
        }
    }

    #[test]
    fn test_downward_sweep() {
        let sweep = LogSweep::new(0.1, 3000.0, 500.0, 1.0, 0.0);
        assert!(sweep.validate(&StreamParams::default()).is_ok());
        assert!((sweep.instantaneous_frequency(1.0) - 500.0).abs() < 1e-6);
        assert!(sweep.instantaneous_frequency(0.5) < 3000.0);
    }

    #[test]
    fn test_equal_endpoints_rejected() {
        let sweep = LogSweep::new(0.1, 1000.0, 1000.0, 2.0, 0.5);
        let err = sweep.validate(&StreamParams::default()).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidParameter { name: "fstop", .. }));
        assert!(log_sweep(440.0, 440.0, 1.0, 44100).is_err());
    }

    #[test]
    fn test_other_invalid_parameters() {
        let stream = StreamParams::default();
        assert!(LogSweep::new(0.1, 0.0, 8000.0, 2.0, 0.5).validate(&stream).is_err());
        assert!(LogSweep::new(0.1, 125.0, -1.0, 2.0, 0.5).validate(&stream).is_err());
        assert!(LogSweep::new(0.1, 125.0, 8000.0, 0.0, 0.5).validate(&stream).is_err());
        assert!(LogSweep::new(0.1, 125.0, 8000.0, 2.0, -0.5).validate(&stream).is_err());
        assert!(LogSweep::new(0.1, 125.0, 8000.0, 1e-9, 0.5).validate(&stream).is_err());
    }

    #[test]
    fn test_oversized_cycle_rejected() {
        let stream = StreamParams::default();
        let err = LogSweep::new(0.1, 125.0, 8000.0, 1e300, 0.5).validate(&stream).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidParameter { name: "len_sec", .. }));
        let err = LogSweep::new(0.1, 125.0, 8000.0, 2.0, 1e300).validate(&stream).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidParameter { name: "pause_sec", .. }));
        assert_eq!(LogSweep::new(0.1, 125.0, 8000.0, 1e300, 1e300).cycle_len(44100), usize::MAX);
        assert!(log_sweep(125.0, 8000.0, 1e300, 44100).is_err());
    }

    #[test]
    fn test_free_function_matches_length() {
        let (t, s) = log_sweep(125.0, 8000.0, 2.0, 44100).unwrap();
        assert_eq!(t.len(), 88200);
        assert_eq!(s.len(), 88200);
        assert_eq!(t[0], 0.0);
        assert!((t[1] - 1.0 / 44100.0).abs() < 1e-12);
        assert!(s[0].abs() < 1e-12);
    }
}
