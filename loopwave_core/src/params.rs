use serde::{Deserialize, Serialize};

use crate::cursor::IndexWrap;
use crate::error::{GeneratorError, Result};
use crate::plan::MAX_LOOP_SAMPLES;
use crate::signal::sweep::LogSweep;
use crate::signal::tone::Tone;

/// Parameters shared by every signal: how the loop is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per block handed to the audio callback.
    pub block_len: usize,
    /// Output channels; every channel carries the same signal.
    pub nchannels: u16,
}

impl StreamParams {
    pub fn new(sample_rate: u32, block_len: usize, nchannels: u16) -> Self {
        Self {
            sample_rate,
            block_len,
            nchannels,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(GeneratorError::invalid("fs", "sample rate must be greater than zero"));
        }
        if self.block_len == 0 {
            return Err(GeneratorError::invalid("block_len", "must be greater than zero"));
        }
        if self.nchannels == 0 {
            return Err(GeneratorError::invalid("nchannels", "need at least one channel"));
        }
        if self.block_len.saturating_mul(self.nchannels as usize) > MAX_LOOP_SAMPLES {
            return Err(GeneratorError::invalid(
                "block_len",
                format!(
                    "{} frames x {} channels exceeds {MAX_LOOP_SAMPLES} samples",
                    self.block_len, self.nchannels
                ),
            ));
        }
        Ok(())
    }

    /// Interleaved samples in one block.
    pub fn block_samples(&self) -> usize {
        self.block_len * self.nchannels as usize
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }
}

impl Default for StreamParams {
    fn default() -> Self {
        Self::new(44100, 1024, 2)
    }
}

/// Either signal, selected at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SignalParams {
    Tone(Tone),
    Sweep(LogSweep),
}

impl Default for SignalParams {
    fn default() -> Self {
        Self::Tone(Tone::default())
    }
}

impl From<Tone> for SignalParams {
    fn from(tone: Tone) -> Self {
        Self::Tone(tone)
    }
}

impl From<LogSweep> for SignalParams {
    fn from(sweep: LogSweep) -> Self {
        Self::Sweep(sweep)
    }
}

/// Complete generator configuration, loadable from JSON.
///
/// ```json
/// {
///   "stream": { "sample_rate": 48000, "block_len": 256, "nchannels": 2 },
///   "signal": { "kind": "sweep", "fstart": 20.0, "fstop": 20000.0 },
///   "wrap": "exact"
/// }
/// ```
///
/// Omitted fields take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub stream: StreamParams,
    pub signal: SignalParams,
    pub wrap: IndexWrap,
}

impl GeneratorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        use crate::signal::PeriodicSignal;

        self.stream.validate()?;
        self.signal.validate(&self.stream)
    }
}

pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GeneratorError::invalid(name, format!("must be finite, got {value}")))
    }
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<()> {
    check_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(GeneratorError::invalid(name, format!("must be greater than zero, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream, StreamParams::new(44100, 1024, 2));
        assert_eq!(config.wrap, IndexWrap::Exact);
        assert!(matches!(config.signal, SignalParams::Tone(_)));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = GeneratorConfig::from_json_str(
            r#"{ "signal": { "kind": "sweep", "fstart": 3000.0, "fstop": 500.0 }, "wrap": "legacy" }"#,
        )
        .unwrap();

        assert_eq!(config.stream, StreamParams::default());
        assert_eq!(config.wrap, IndexWrap::Legacy);
        match config.signal {
            SignalParams::Sweep(sweep) => {
                assert_eq!(sweep.fstart, 3000.0);
                assert_eq!(sweep.fstop, 500.0);
                assert_eq!(sweep.len_sec, 2.0);
                assert_eq!(sweep.pause_sec, 0.5);
                assert_eq!(sweep.a0, 0.1);
            }
            other => panic!("expected sweep, got {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip_preserves_config() {
        let config = GeneratorConfig {
            stream: StreamParams::new(48000, 256, 1),
            signal: Tone::new(0.5, 440.0, 0.25).into(),
            wrap: IndexWrap::Legacy,
        };
        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"kind\": \"tone\""));
        assert_eq!(GeneratorConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_block_size_is_bounded() {
        assert!(StreamParams::new(44100, MAX_LOOP_SAMPLES, 1).validate().is_ok());
        let err = StreamParams::new(44100, MAX_LOOP_SAMPLES, 2).validate().unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidParameter { name: "block_len", .. }));
        assert!(StreamParams::new(44100, usize::MAX, 2).validate().is_err());
    }

    #[test]
    fn test_invalid_json_values_rejected() {
        let err = GeneratorConfig::from_json_str(
            r#"{ "signal": { "kind": "sweep", "fstart": 1000.0, "fstop": 1000.0 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidParameter { name: "fstop", .. }));

        let err = GeneratorConfig::from_json_str(r#"{ "stream": { "block_len": 0 } }"#).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidParameter { name: "block_len", .. }));

        let err = GeneratorConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, GeneratorError::Config(_)));
    }
}
