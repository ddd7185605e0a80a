use log::debug;

use crate::buffer::SuperBuffer;
use crate::cursor::{BlockCursor, IndexWrap};
use crate::error::{GeneratorError, Result};
use crate::params::{GeneratorConfig, SignalParams, StreamParams};
use crate::signal::PeriodicSignal;
use crate::signal::sweep::LogSweep;
use crate::signal::tone::Tone;

/// Endless block source for one periodic signal.
///
/// Setters validate the complete parameter set and, on success, mark the
/// rendered loop stale. The loop is rebuilt on the next [`read`](Self::read)
/// (or an explicit [`regenerate`](Self::regenerate)); a rejected setter
/// changes nothing.
///
/// ```
/// use loopwave_core::{Generator, StreamParams, Tone};
///
/// let mut sine = Generator::new(Tone::new(0.1, 1000.0, 0.0), StreamParams::new(44100, 512, 2))?;
/// let block = sine.read()?;
/// assert_eq!(block.len(), 512 * 2);
///
/// sine.set_f0(2000.0)?;
/// assert!(sine.is_dirty());
/// # Ok::<(), loopwave_core::GeneratorError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Generator<S: PeriodicSignal> {
    signal: S,
    stream: StreamParams,
    buffer: SuperBuffer,
    dirty: bool,
    cursor: BlockCursor,
    block: Vec<f32>,
}

impl<S: PeriodicSignal> Generator<S> {
    pub fn new(signal: S, stream: StreamParams) -> Result<Self> {
        let buffer = SuperBuffer::render(&signal, &stream)?;
        Ok(Self {
            block: vec![0.0; stream.block_samples()],
            signal,
            stream,
            buffer,
            dirty: false,
            cursor: BlockCursor::default(),
        })
    }

    pub fn with_wrap(mut self, wrap: IndexWrap) -> Self {
        self.cursor.set_wrap(wrap);
        self
    }

    pub fn signal(&self) -> &S {
        &self.signal
    }

    pub fn stream(&self) -> &StreamParams {
        &self.stream
    }

    pub fn wrap(&self) -> IndexWrap {
        self.cursor.wrap()
    }

    pub fn set_wrap(&mut self, wrap: IndexWrap) {
        self.cursor.set_wrap(wrap);
    }

    /// `true` when parameters changed since the loop was last rendered.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The last rendered loop. Stale while [`is_dirty`](Self::is_dirty).
    pub fn buffer(&self) -> &SuperBuffer {
        &self.buffer
    }

    pub fn cursor(&self) -> &BlockCursor {
        &self.cursor
    }

    /// Apply `f` to a copy of the parameters and commit it if valid.
    ///
    /// Invalidates the rendered loop when anything changed.
    pub fn update<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut S, &mut StreamParams),
    {
        let mut signal = self.signal.clone();
        let mut stream = self.stream;
        f(&mut signal, &mut stream);

        if signal == self.signal && stream == self.stream {
            return Ok(());
        }
        stream.validate()?;
        signal.validate(&stream)?;
        signal.plan(&stream)?;

        self.signal = signal;
        self.stream = stream;
        self.dirty = true;
        Ok(())
    }

    pub fn a0(&self) -> f64 {
        self.signal.amplitude()
    }

    /// Set the amplitude. Invalidates the loop.
    pub fn set_a0(&mut self, a0: f64) -> Result<()> {
        self.update(|signal, _| signal.set_amplitude(a0))
    }

    pub fn fs(&self) -> u32 {
        self.stream.sample_rate
    }

    /// Set the sample rate. Changes the loop plan.
    pub fn set_fs(&mut self, sample_rate: u32) -> Result<()> {
        self.update(|_, stream| stream.sample_rate = sample_rate)
    }

    pub fn block_len(&self) -> usize {
        self.stream.block_len
    }

    /// Set the block length. Changes the loop plan and the block size
    /// returned by [`read`](Self::read).
    pub fn set_block_len(&mut self, block_len: usize) -> Result<()> {
        self.update(|_, stream| stream.block_len = block_len)
    }

    pub fn nchannels(&self) -> u16 {
        self.stream.nchannels
    }

    /// Set the channel count. Changes the block size returned by
    /// [`read`](Self::read).
    pub fn set_nchannels(&mut self, nchannels: u16) -> Result<()> {
        self.update(|_, stream| stream.nchannels = nchannels)
    }

    /// Rebuild the loop if parameters changed. Idempotent.
    ///
    /// The block cursor is kept: its counter continues into the new loop.
    pub fn regenerate(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        self.buffer.rerender(&self.signal, &self.stream)?;
        self.block.resize(self.stream.block_samples(), 0.0);
        self.dirty = false;

        let plan = self.buffer.plan();
        debug!(
            "rendered loop: N = {} ({} blocks of {}), {} samples stored",
            plan.len(),
            plan.nblocks(),
            plan.block_len(),
            plan.stored_len()
        );
        Ok(())
    }

    /// Next block, interleaved, `block_len * nchannels` samples.
    pub fn read(&mut self) -> Result<&[f32]> {
        self.regenerate()?;
        let range = self.next_range();
        self.buffer
            .write_block(range, self.stream.nchannels as usize, &mut self.block);
        Ok(&self.block)
    }

    /// Like [`read`](Self::read) but writes into `out`, which must hold
    /// exactly `block_len * nchannels` samples.
    pub fn read_into(&mut self, out: &mut [f32]) -> Result<()> {
        self.regenerate()?;
        if out.len() != self.stream.block_samples() {
            return Err(GeneratorError::invalid(
                "block_len",
                format!(
                    "output holds {} samples, a block is {}",
                    out.len(),
                    self.stream.block_samples()
                ),
            ));
        }
        let range = self.next_range();
        self.buffer
            .write_block(range, self.stream.nchannels as usize, out);
        Ok(())
    }

    fn next_range(&mut self) -> crate::cursor::BlockRange {
        let plan = self.buffer.plan();
        self.cursor.next_range(plan.block_len(), plan.len())
    }
}

impl Generator<Tone> {
    pub fn f0(&self) -> f64 {
        self.signal.f0
    }

    /// Set the tone frequency. Changes the loop plan.
    pub fn set_f0(&mut self, f0: f64) -> Result<()> {
        self.update(|tone, _| tone.f0 = f0)
    }

    pub fn phi0(&self) -> f64 {
        self.signal.phi0
    }

    /// Set the starting phase in radians. Invalidates the loop.
    pub fn set_phi0(&mut self, phi0: f64) -> Result<()> {
        self.update(|tone, _| tone.phi0 = phi0)
    }
}

impl Generator<LogSweep> {
    pub fn fstart(&self) -> f64 {
        self.signal.fstart
    }

    /// Set the start frequency. Rejected if it equals `fstop`.
    pub fn set_fstart(&mut self, fstart: f64) -> Result<()> {
        self.update(|sweep, _| sweep.fstart = fstart)
    }

    pub fn fstop(&self) -> f64 {
        self.signal.fstop
    }

    /// Set the stop frequency. Rejected if it equals `fstart`.
    pub fn set_fstop(&mut self, fstop: f64) -> Result<()> {
        self.update(|sweep, _| sweep.fstop = fstop)
    }

    /// Set both sweep bounds at once.
    pub fn set_range(&mut self, fstart: f64, fstop: f64) -> Result<()> {
        self.update(|sweep, _| {
            sweep.fstart = fstart;
            sweep.fstop = fstop;
        })
    }

    pub fn len_sec(&self) -> f64 {
        self.signal.len_sec
    }

    /// Set the sweep duration. Changes the loop plan.
    pub fn set_len_sec(&mut self, len_sec: f64) -> Result<()> {
        self.update(|sweep, _| sweep.len_sec = len_sec)
    }

    pub fn pause_sec(&self) -> f64 {
        self.signal.pause_sec
    }

    /// Set the silence after each sweep. Changes the loop plan.
    pub fn set_pause_sec(&mut self, pause_sec: f64) -> Result<()> {
        self.update(|sweep, _| sweep.pause_sec = pause_sec)
    }
}

impl Generator<SignalParams> {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self::new(config.signal.clone(), config.stream)?.with_wrap(config.wrap))
    }
}
