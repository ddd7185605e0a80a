//! Control-thread side of a looped signal.
//!
//! Parameter changes are validated and rendered here, never on the audio
//! thread. The finished loop is handed to the [`LoopPlayer`] through a
//! one-slot queue; if the player has not picked up the previous loop yet,
//! that one is discarded and the newest wins. Swapped-out loops travel back
//! on a second queue, which also tells the controller when the player is gone.

use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, TryRecvError, bounded};
use log::debug;
use loopwave_core::{
    Generator, GeneratorConfig, IndexWrap, PeriodicSignal, SignalParams, StreamParams,
};
use parking_lot::Mutex;

use crate::error::{StreamError, StreamResult};
use crate::rt_processing::loop_player::{LoopPlayer, RenderedLoop};
use crate::rt_processing::performance::PerformanceMonitor;

/// Loops the audio thread may hand back before it frees them itself.
const RETIRED_CAPACITY: usize = 8;

struct ControlState<S: PeriodicSignal> {
    generator: Generator<S>,
    published_wrap: IndexWrap,
    pending_tx: Sender<RenderedLoop>,
    /// Second handle on the pending queue, used to discard unplayed loops.
    pending_rx: Receiver<RenderedLoop>,
    retired_rx: Receiver<RenderedLoop>,
    monitor: Arc<PerformanceMonitor>,
}

impl<S: PeriodicSignal> ControlState<S> {
    /// Free the loops the player swapped out. Fails once the player (and
    /// with it the only sender on the retired queue) has been dropped.
    fn collect_retired(&self) -> StreamResult<()> {
        loop {
            match self.retired_rx.try_recv() {
                Ok(old) => drop(old),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(StreamError::Disconnected),
            }
        }
    }

    fn publish(&mut self) -> StreamResult<bool> {
        self.collect_retired()?;

        let wrap = self.generator.wrap();
        if !self.generator.is_dirty() && wrap == self.published_wrap {
            return Ok(false);
        }
        self.generator.regenerate()?;

        let update = RenderedLoop::new(self.generator.buffer().clone(), wrap);
        let discarded = self.pending_rx.try_iter().count();
        if discarded > 0 {
            debug!("discarded {discarded} loop(s) the player never picked up");
        }
        self.pending_tx
            .try_send(update)
            .map_err(|_| StreamError::Disconnected)?;
        self.published_wrap = wrap;

        let stream = self.generator.stream();
        self.monitor
            .set_block_budget(stream.block_len, stream.sample_rate as f32);

        let plan = self.generator.buffer().plan();
        debug!(
            "published loop: N = {}, period {} samples, {} blocks",
            plan.len(),
            plan.period_len(),
            plan.nblocks()
        );
        Ok(true)
    }
}

/// Thread-safe handle for changing a playing signal.
///
/// Cloning gives another handle on the same signal.
pub struct SignalController<S: PeriodicSignal> {
    state: Arc<Mutex<ControlState<S>>>,
    monitor: Arc<PerformanceMonitor>,
}

impl<S: PeriodicSignal> Clone for SignalController<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            monitor: Arc::clone(&self.monitor),
        }
    }
}

impl<S: PeriodicSignal> SignalController<S> {
    /// Render the first loop and build the matching audio-thread player.
    pub fn new(signal: S, stream: StreamParams, wrap: IndexWrap) -> StreamResult<(Self, LoopPlayer)> {
        let generator = Generator::new(signal, stream)?.with_wrap(wrap);
        let monitor = Arc::new(PerformanceMonitor::new(
            stream.block_len,
            stream.sample_rate as f32,
            0.1,
        ));

        let (pending_tx, pending_rx) = bounded(1);
        let (retired_tx, retired_rx) = bounded(RETIRED_CAPACITY);

        let initial = RenderedLoop::new(generator.buffer().clone(), wrap);
        let player = LoopPlayer::new(initial, pending_rx.clone(), retired_tx, Arc::clone(&monitor));

        let state = ControlState {
            generator,
            published_wrap: wrap,
            pending_tx,
            pending_rx,
            retired_rx,
            monitor: Arc::clone(&monitor),
        };
        let controller = Self {
            state: Arc::new(Mutex::new(state)),
            monitor,
        };
        Ok((controller, player))
    }

    /// Change parameters through the generator's setters and publish the
    /// new loop if anything changed.
    ///
    /// ```ignore
    /// controller.update(|g| g.set_f0(440.0))?;
    /// ```
    ///
    /// If `f` fails, nothing is published. Once the player has been dropped
    /// every update fails with [`StreamError::Disconnected`] and leaves the
    /// parameters untouched.
    pub fn update<F, R>(&self, f: F) -> StreamResult<R>
    where
        F: FnOnce(&mut Generator<S>) -> loopwave_core::Result<R>,
    {
        let mut state = self.state.lock();
        state.collect_retired()?;
        let out = f(&mut state.generator)?;
        state.publish()?;
        Ok(out)
    }

    /// Set the amplitude of either signal kind.
    pub fn set_a0(&self, a0: f64) -> StreamResult<()> {
        self.update(|g| g.set_a0(a0))
    }

    pub fn set_wrap(&self, wrap: IndexWrap) -> StreamResult<()> {
        self.update(|g| {
            g.set_wrap(wrap);
            Ok(())
        })
    }

    pub fn signal(&self) -> S {
        self.state.lock().generator.signal().clone()
    }

    pub fn stream(&self) -> StreamParams {
        *self.state.lock().generator.stream()
    }

    pub fn wrap(&self) -> IndexWrap {
        self.state.lock().generator.wrap()
    }

    /// Metrics recorded by the audio thread for this signal.
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }
}

impl SignalController<SignalParams> {
    pub fn from_config(config: &GeneratorConfig) -> StreamResult<(Self, LoopPlayer)> {
        config.validate()?;
        Self::new(config.signal.clone(), config.stream, config.wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt_processing::callback::AudioCallback;
    use loopwave_core::{GeneratorError, LogSweep, Tone};

    fn tone() -> (SignalController<Tone>, LoopPlayer) {
        SignalController::new(
            Tone::new(0.1, 1000.0, 0.0),
            StreamParams::new(44100, 512, 2),
            IndexWrap::Exact,
        )
        .unwrap()
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn play_block(player: &mut LoopPlayer) -> Vec<f32> {
        let mut out = vec![0.0; 1024];
        player.process(&mut out, 44100.0, 2, 512);
        out
    }

    #[test]
    fn test_update_reaches_player() {
        init_logging();
        let (controller, mut player) = tone();
        play_block(&mut player);
        assert_eq!(player.current().buffer().plan().period_len(), 44);

        controller.update(|g| g.set_f0(441.0)).unwrap();
        play_block(&mut player);
        assert_eq!(player.current().buffer().plan().period_len(), 100);
        assert_eq!(controller.signal().f0, 441.0);
    }

    #[test]
    fn test_newest_update_wins() {
        let (controller, mut player) = tone();
        controller.update(|g| g.set_f0(441.0)).unwrap();
        controller.update(|g| g.set_f0(882.0)).unwrap();
        controller.set_a0(0.5).unwrap();

        play_block(&mut player);
        assert_eq!(player.current().buffer().plan().period_len(), 50);
        assert!(player.current().buffer().stored().iter().any(|s| *s > 0.4));
        assert_eq!(controller.monitor().snapshot(false).loop_swaps, 1);
    }

    #[test]
    fn test_rejected_update_publishes_nothing() {
        let (controller, mut player) = SignalController::new(
            LogSweep::default(),
            StreamParams::new(44100, 1024, 2),
            IndexWrap::Exact,
        )
        .unwrap();

        let err = controller.update(|g| g.set_fstop(125.0)).unwrap_err();
        assert!(matches!(
            err,
            StreamError::Generator(GeneratorError::InvalidParameter { name: "fstop", .. })
        ));

        let mut out = vec![0.0; 2048];
        player.process(&mut out, 44100.0, 2, 1024);
        assert_eq!(controller.monitor().snapshot(false).loop_swaps, 0);
        assert_eq!(controller.signal().fstop, 8000.0);
    }

    #[test]
    fn test_unchanged_update_publishes_nothing() {
        let (controller, mut player) = tone();
        controller.update(|g| g.set_f0(1000.0)).unwrap();
        play_block(&mut player);
        assert_eq!(controller.monitor().snapshot(false).loop_swaps, 0);
    }

    #[test]
    fn test_block_budget_tracks_block_len() {
        let (controller, _player) = SignalController::new(
            Tone::new(0.1, 1000.0, 0.0),
            StreamParams::new(48000, 480, 2),
            IndexWrap::Exact,
        )
        .unwrap();
        let budget = |c: &SignalController<Tone>| c.monitor().snapshot(false).block_budget_nanos;
        assert!((budget(&controller) - 1e7).abs() < 1e-3);

        controller.update(|g| g.set_block_len(48)).unwrap();
        assert!((budget(&controller) - 1e6).abs() < 1e-3);

        controller.update(|g| g.set_fs(96000)).unwrap();
        assert!((budget(&controller) - 5e5).abs() < 1e-3);
    }

    #[test]
    fn test_dropped_player_is_reported() {
        let (controller, player) = tone();
        drop(player);

        let err = controller.update(|g| g.set_f0(440.0)).unwrap_err();
        assert!(matches!(err, StreamError::Disconnected));
        assert_eq!(controller.signal().f0, 1000.0);
        assert!(matches!(controller.set_a0(0.5), Err(StreamError::Disconnected)));
    }

    #[test]
    fn test_wrap_change_is_published() {
        let (controller, mut player) = tone();
        controller.set_wrap(IndexWrap::Legacy).unwrap();
        play_block(&mut player);
        assert_eq!(player.cursor().wrap(), IndexWrap::Legacy);
        assert_eq!(controller.wrap(), IndexWrap::Legacy);
    }

    #[test]
    fn test_retired_loops_are_freed_by_controller() {
        let (controller, mut player) = tone();
        for f0 in [441.0, 882.0, 1764.0] {
            controller.update(|g| g.set_f0(f0)).unwrap();
            play_block(&mut player);
        }
        assert_eq!(controller.monitor().snapshot(false).loop_swaps, 3);
        // The next publish drains everything the player sent back.
        controller.set_a0(0.2).unwrap();
        assert!(controller.state.lock().retired_rx.is_empty());
    }

    #[test]
    fn test_handle_is_shared_across_threads() {
        let (controller, mut player) = tone();
        let remote = controller.clone();
        std::thread::spawn(move || remote.update(|g| g.set_block_len(256)))
            .join()
            .unwrap()
            .unwrap();

        let mut out = vec![0.0; 512];
        player.process(&mut out, 44100.0, 2, 256);
        assert_eq!(player.current().buffer().plan().block_len(), 256);
        assert_eq!(controller.stream().block_len, 256);
    }

    #[test]
    fn test_from_config() {
        let config = GeneratorConfig::from_json_str(r#"{ "wrap": "legacy" }"#).unwrap();
        let (controller, player) = SignalController::from_config(&config).unwrap();
        assert_eq!(controller.wrap(), IndexWrap::Legacy);
        assert_eq!(player.cursor().wrap(), IndexWrap::Legacy);
    }
}
