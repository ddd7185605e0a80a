//! cpal-backed output stream for a looped signal.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, StreamConfig};
use dasp::sample::FromSample;
use log::{error, info, warn};
use loopwave_core::{
    Generator, GeneratorConfig, IndexWrap, PeriodicSignal, SignalParams, StreamParams,
};

use crate::audio_device::output::{NegotiatedOutput, default_output_device, negotiate};
use crate::control::SignalController;
use crate::error::{StreamError, StreamResult};
use crate::rt_processing::callback::CallbackSlot;
use crate::rt_processing::performance::PerformanceSnapshot;

/// Transport buffers larger than this many blocks are converted in chunks.
const SCRATCH_BLOCKS: usize = 4;

struct Running {
    stream: cpal::Stream,
    params: StreamParams,
}

/// Plays a [`PeriodicSignal`] on an output device.
///
/// ```no_run
/// use loopwave_backend::OutputStream;
/// use loopwave_core::{StreamParams, Tone};
///
/// let mut out = OutputStream::open(Tone::new(0.1, 1000.0, 0.0), StreamParams::new(44100, 512, 2))?;
/// out.play()?;
/// for k in 0..13 {
///     out.update(|g| g.set_f0(1000.0 * 2f64.powf(k as f64 / 12.0)))?;
///     std::thread::sleep(std::time::Duration::from_millis(150));
/// }
/// out.stop()?;
/// # Ok::<(), loopwave_backend::StreamError>(())
/// ```
pub struct OutputStream<S: PeriodicSignal> {
    controller: SignalController<S>,
    slot: Arc<CallbackSlot>,
    device: cpal::Device,
    running: Option<Running>,
}

impl<S: PeriodicSignal> OutputStream<S> {
    /// Prepare `signal` for the default output device. Nothing plays until
    /// [`play`](Self::play).
    pub fn open(signal: S, params: StreamParams) -> StreamResult<Self> {
        Self::with_device(default_output_device()?, signal, params, IndexWrap::default())
    }

    pub fn with_device(
        device: cpal::Device,
        signal: S,
        params: StreamParams,
        wrap: IndexWrap,
    ) -> StreamResult<Self> {
        let (controller, player) = SignalController::new(signal, params, wrap)?;
        let slot = Arc::new(CallbackSlot::new(
            Box::new(player),
            params.sample_rate as f32,
            params.nchannels as usize,
            Arc::clone(controller.monitor()),
        ));
        Ok(Self {
            controller,
            slot,
            device,
            running: None,
        })
    }

    /// Handle for changing parameters from other threads.
    pub fn controller(&self) -> &SignalController<S> {
        &self.controller
    }

    /// Change parameters; see [`SignalController::update`].
    ///
    /// Sample rate and channel changes reach the device on the next
    /// [`play`](Self::play).
    pub fn update<F, R>(&self, f: F) -> StreamResult<R>
    where
        F: FnOnce(&mut Generator<S>) -> loopwave_core::Result<R>,
    {
        let out = self.controller.update(f)?;
        if let Some(running) = &self.running {
            let params = self.controller.stream();
            if needs_rebuild(&running.params, &params) {
                warn!(
                    "stream runs {}ch @ {}Hz, signal now wants {}ch @ {}Hz; restart with play()",
                    running.params.nchannels,
                    running.params.sample_rate,
                    params.nchannels,
                    params.sample_rate
                );
            }
        }
        Ok(out)
    }

    /// Start (or resume) playback. Rebuilds the device stream first if the
    /// sample rate or channel count changed since it was opened.
    pub fn play(&mut self) -> StreamResult<()> {
        let params = self.controller.stream();
        let stale = self
            .running
            .as_ref()
            .is_some_and(|running| needs_rebuild(&running.params, &params));
        if stale {
            info!("rebuilding output stream for {}ch @ {}Hz", params.nchannels, params.sample_rate);
            self.running = None;
            self.slot.monitor().reset_all();
        }

        if self.running.is_none() {
            let negotiated = negotiate(&self.device, &params)?;
            info!("opening output stream: {negotiated}");
            self.slot
                .set_runtime_config(params.sample_rate as f32, params.nchannels as usize);
            self.slot
                .monitor()
                .set_block_budget(params.block_len, params.sample_rate as f32);
            let stream = self.build(&negotiated, params.block_samples() * SCRATCH_BLOCKS)?;
            self.running = Some(Running { stream, params });
        }

        if let Some(running) = &self.running {
            running
                .stream
                .play()
                .map_err(|e| StreamError::DeviceUnavailable(format!("failed to start stream: {e}")))?;
        }
        Ok(())
    }

    /// Pause playback. The stream stays open for a later [`play`](Self::play).
    pub fn stop(&mut self) -> StreamResult<()> {
        if let Some(running) = &self.running {
            running
                .stream
                .pause()
                .map_err(|e| StreamError::DeviceUnavailable(format!("failed to stop stream: {e}")))?;
            info!("output stream stopped after {:.2}s", self.slot.playback_time());
        }
        Ok(())
    }

    /// Seconds of audio delivered since the stream was opened.
    pub fn playback_time(&self) -> f64 {
        self.slot.playback_time()
    }

    pub fn stats(&self) -> PerformanceSnapshot {
        self.slot.monitor().snapshot(false)
    }

    fn build(&self, negotiated: &NegotiatedOutput, scratch_len: usize) -> StreamResult<cpal::Stream> {
        let config = &negotiated.stream_config;
        let slot = Arc::clone(&self.slot);
        match negotiated.sample_format {
            SampleFormat::F32 => build_stream::<f32>(&self.device, config, slot, scratch_len),
            SampleFormat::I16 => build_stream::<i16>(&self.device, config, slot, scratch_len),
            SampleFormat::U16 => build_stream::<u16>(&self.device, config, slot, scratch_len),
            other => Err(StreamError::UnsupportedConfig(format!(
                "sample format {other:?} is not supported"
            ))),
        }
    }
}

impl OutputStream<SignalParams> {
    /// Open the default output device for a JSON-style configuration.
    pub fn from_config(config: &GeneratorConfig) -> StreamResult<Self> {
        config.validate()?;
        Self::with_device(
            default_output_device()?,
            config.signal.clone(),
            config.stream,
            config.wrap,
        )
    }
}

/// A device stream is bound to its sample rate and channel count; block
/// length changes are absorbed by the loop player.
fn needs_rebuild(running: &StreamParams, wanted: &StreamParams) -> bool {
    running.sample_rate != wanted.sample_rate || running.nchannels != wanted.nchannels
}

/// Fill a transport buffer of any length through the `f32` scratch buffer.
fn fill_converted<T>(slot: &CallbackSlot, scratch: &mut [f32], data: &mut [T])
where
    T: FromSample<f32>,
{
    for chunk in data.chunks_mut(scratch.len()) {
        let staged = &mut scratch[..chunk.len()];
        slot.process_realtime(staged);
        for (out, &sample) in chunk.iter_mut().zip(staged.iter()) {
            *out = T::from_sample_(sample);
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    slot: Arc<CallbackSlot>,
    scratch_len: usize,
) -> StreamResult<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    // Allocated here, reused by every callback.
    let mut scratch = vec![0.0f32; scratch_len.max(config.channels as usize)];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_converted(&slot, &mut scratch, data);
            },
            |err| error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| StreamError::DeviceUnavailable(format!("failed to build stream: {e}")))
}
