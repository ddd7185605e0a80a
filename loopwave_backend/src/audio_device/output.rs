use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{
    BufferSize, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize,
    SupportedStreamConfigRange,
};
use log::{info, warn};
use loopwave_core::StreamParams;

use crate::error::{StreamError, StreamResult};

/// Sample formats the stream can write, best first.
const FORMAT_PREFERENCE: [SampleFormat; 3] = [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

/// Stream layout agreed with the device.
#[derive(Debug, Clone)]
pub struct NegotiatedOutput {
    pub stream_config: StreamConfig,
    pub sample_format: SampleFormat,
}

impl fmt::Display for NegotiatedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch @ {}Hz, buffer: {:?}, format: {:?}",
            self.stream_config.channels,
            self.stream_config.sample_rate.0,
            self.stream_config.buffer_size,
            self.sample_format
        )
    }
}

/// Default output device of the default host.
pub fn default_output_device() -> StreamResult<cpal::Device> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or_else(|| {
        StreamError::DeviceUnavailable(format!("no default output device on {}", host.id().name()))
    })?;
    info!(
        "using output device {} ({})",
        device.name().unwrap_or_else(|_| "Unknown Device".to_string()),
        host.id().name()
    );
    Ok(device)
}

/// Find a device configuration that runs `params` unchanged.
pub fn negotiate(device: &cpal::Device, params: &StreamParams) -> StreamResult<NegotiatedOutput> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| StreamError::DeviceUnavailable(format!("failed to query output configs: {e}")))?
        .collect();
    choose_config(&ranges, params)
}

/// Pick the best range: exact channel count, sample rate inside the range,
/// preferred sample format. The block length is requested as a fixed buffer
/// size when the range allows it.
pub fn choose_config(
    ranges: &[SupportedStreamConfigRange],
    params: &StreamParams,
) -> StreamResult<NegotiatedOutput> {
    let fits = |range: &&SupportedStreamConfigRange| {
        range.channels() == params.nchannels
            && range.min_sample_rate().0 <= params.sample_rate
            && params.sample_rate <= range.max_sample_rate().0
    };

    let range = FORMAT_PREFERENCE
        .iter()
        .find_map(|&format| {
            ranges
                .iter()
                .filter(fits)
                .find(|range| range.sample_format() == format)
        })
        .ok_or_else(|| {
            let available: Vec<String> = ranges
                .iter()
                .map(|r| {
                    format!(
                        "{}ch {}-{}Hz {:?}",
                        r.channels(),
                        r.min_sample_rate().0,
                        r.max_sample_rate().0,
                        r.sample_format()
                    )
                })
                .collect();
            StreamError::UnsupportedConfig(format!(
                "{}ch @ {}Hz not offered; available: [{}]",
                params.nchannels,
                params.sample_rate,
                available.join(", ")
            ))
        })?;

    let requested = u32::try_from(params.block_len).unwrap_or(u32::MAX);
    // Blocks are staged across callbacks, so a device-chosen buffer size
    // still plays correctly; it only changes latency.
    let buffer_size = match range.buffer_size() {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&requested) => {
            BufferSize::Fixed(requested)
        }
        SupportedBufferSize::Range { min, max } => {
            warn!(
                "block length {} outside device buffer range {}..={}, using device default",
                params.block_len, min, max
            );
            BufferSize::Default
        }
        SupportedBufferSize::Unknown => BufferSize::Fixed(requested),
    };

    Ok(NegotiatedOutput {
        stream_config: StreamConfig {
            channels: params.nchannels,
            sample_rate: SampleRate(params.sample_rate),
            buffer_size,
        },
        sample_format: range.sample_format(),
    })
}
