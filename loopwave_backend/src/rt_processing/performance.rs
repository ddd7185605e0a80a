use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam::atomic::AtomicCell;
use quanta::{Clock, Instant as QuantaInstant};

/// Snapshot of playback metrics for logging (non-RT).
#[derive(Debug, Clone)]
pub struct PerformanceSnapshot {
    /// Frames delivered to the transport.
    pub frames_processed: u64,
    pub callback_count: u64,
    /// Callbacks answered with silence because the processor was busy.
    pub silent_count: u64,
    /// Loops swapped in on the audio thread after a parameter change.
    pub loop_swaps: u64,
    pub min_callback_nanos: Option<u64>,
    pub max_callback_nanos: Option<u64>,
    /// EMA of callback duration in nanoseconds.
    pub ema_callback_nanos: f64,
    /// Time budget of one block at the configured rate.
    pub block_budget_nanos: f64,
    /// EMA callback duration as a share of the block budget.
    pub avg_load_percent: f64,
    pub timestamp: Instant,
}

/// Real-time-safe playback monitor.
///
/// The `add_*`/`increment_*` methods and [`scoped_callback`](Self::scoped_callback)
/// touch atomics only and may run on the audio thread. The EMA has a single
/// writer (the audio thread) and is kept in an [`AtomicCell`].
pub struct PerformanceMonitor {
    clock: Clock,
    /// Block layout the load figures are measured against.
    block_len: AtomicCell<usize>,
    sample_rate: AtomicCell<f32>,

    frames_processed: AtomicU64,
    callback_count: AtomicU64,
    silent_count: AtomicU64,
    loop_swaps: AtomicU64,

    min_callback_nanos: AtomicU64,
    max_callback_nanos: AtomicU64,
    ema_callback_nanos: AtomicCell<f64>,
    ema_alpha: f64,
}

impl PerformanceMonitor {
    /// `ema_alpha` in `(0, 1]`; values around 0.05..0.2 smooth well.
    pub fn new(block_len: usize, sample_rate: f32, ema_alpha: f64) -> Self {
        Self {
            clock: Clock::new(),
            block_len: AtomicCell::new(block_len),
            sample_rate: AtomicCell::new(sample_rate),
            frames_processed: AtomicU64::new(0),
            callback_count: AtomicU64::new(0),
            silent_count: AtomicU64::new(0),
            loop_swaps: AtomicU64::new(0),
            min_callback_nanos: AtomicU64::new(u64::MAX),
            max_callback_nanos: AtomicU64::new(0),
            ema_callback_nanos: AtomicCell::new(0.0),
            ema_alpha: ema_alpha.clamp(f64::EPSILON, 1.0),
        }
    }

    /// Measure load against a new block layout. Peaks and EMA are kept.
    pub fn set_block_budget(&self, block_len: usize, sample_rate: f32) {
        self.block_len.store(block_len);
        self.sample_rate.store(sample_rate);
    }

    #[inline(always)]
    pub fn add_frames_processed(&self, n: u64) {
        self.frames_processed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn increment_silent_count(&self) {
        self.silent_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn increment_loop_swaps(&self) {
        self.loop_swaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one callback duration. Updates min, max and EMA.
    #[inline(always)]
    pub fn record_callback_duration_nanos(&self, nanos: u64) {
        self.min_callback_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_callback_nanos.fetch_max(nanos, Ordering::Relaxed);

        let old = self.ema_callback_nanos.load();
        let alpha = self.ema_alpha;
        self.ema_callback_nanos
            .store(alpha * nanos as f64 + (1.0 - alpha) * old);
    }

    /// Counts a callback and records its duration when the guard drops.
    #[inline(always)]
    pub fn scoped_callback(&self) -> RealtimeGuard<'_> {
        self.callback_count.fetch_add(1, Ordering::Relaxed);
        RealtimeGuard {
            monitor: self,
            start: self.clock.now(),
        }
    }

    /// Read all metrics. With `reset_peaks` the min/max/EMA restart from
    /// scratch afterwards. Not real-time safe.
    pub fn snapshot(&self, reset_peaks: bool) -> PerformanceSnapshot {
        let min_raw = self.min_callback_nanos.load(Ordering::Relaxed);
        let max_raw = self.max_callback_nanos.load(Ordering::Relaxed);
        let ema = self.ema_callback_nanos.load();
        let sample_rate = self.sample_rate.load() as f64;
        let block_budget_nanos = if sample_rate > 0.0 {
            self.block_len.load() as f64 / sample_rate * 1e9
        } else {
            0.0
        };
        let avg_load_percent = if block_budget_nanos > 0.0 {
            ema / block_budget_nanos * 100.0
        } else {
            0.0
        };

        if reset_peaks {
            self.min_callback_nanos.store(u64::MAX, Ordering::Relaxed);
            self.max_callback_nanos.store(0, Ordering::Relaxed);
            self.ema_callback_nanos.store(0.0);
        }

        PerformanceSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            callback_count: self.callback_count.load(Ordering::Relaxed),
            silent_count: self.silent_count.load(Ordering::Relaxed),
            loop_swaps: self.loop_swaps.load(Ordering::Relaxed),
            min_callback_nanos: (min_raw != u64::MAX).then_some(min_raw),
            max_callback_nanos: (max_raw != 0).then_some(max_raw),
            ema_callback_nanos: ema,
            block_budget_nanos,
            avg_load_percent,
            timestamp: Instant::now(),
        }
    }

    /// Reset every counter, e.g. when a stream is rebuilt.
    pub fn reset_all(&self) {
        self.frames_processed.store(0, Ordering::Relaxed);
        self.callback_count.store(0, Ordering::Relaxed);
        self.silent_count.store(0, Ordering::Relaxed);
        self.loop_swaps.store(0, Ordering::Relaxed);
        self.min_callback_nanos.store(u64::MAX, Ordering::Relaxed);
        self.max_callback_nanos.store(0, Ordering::Relaxed);
        self.ema_callback_nanos.store(0.0);
    }
}

/// Records callback latency on drop. Atomics only.
pub struct RealtimeGuard<'a> {
    monitor: &'a PerformanceMonitor,
    start: QuantaInstant,
}

impl Drop for RealtimeGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self
            .monitor
            .clock
            .now()
            .saturating_duration_since(self.start)
            .as_nanos();
        self.monitor
            .record_callback_duration_nanos(u64::try_from(elapsed).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_track_min_max_ema() {
        let monitor = PerformanceMonitor::new(512, 51200.0, 0.5);
        monitor.record_callback_duration_nanos(1_000);
        monitor.record_callback_duration_nanos(3_000);

        let snap = monitor.snapshot(true);
        assert_eq!(snap.min_callback_nanos, Some(1_000));
        assert_eq!(snap.max_callback_nanos, Some(3_000));
        // 0.5 * 3000 + 0.5 * (0.5 * 1000)
        assert!((snap.ema_callback_nanos - 1_750.0).abs() < 1e-9);
        assert!((snap.block_budget_nanos - 1e7).abs() < 1e-3);
        assert!((snap.avg_load_percent - 0.0175).abs() < 1e-9);

        let after = monitor.snapshot(false);
        assert_eq!(after.min_callback_nanos, None);
        assert_eq!(after.max_callback_nanos, None);
    }

    #[test]
    fn test_block_budget_follows_layout() {
        let monitor = PerformanceMonitor::new(480, 48000.0, 1.0);
        monitor.record_callback_duration_nanos(500_000);
        assert!((monitor.snapshot(false).avg_load_percent - 5.0).abs() < 1e-9);

        monitor.set_block_budget(48, 48000.0);
        let snap = monitor.snapshot(false);
        assert!((snap.block_budget_nanos - 1e6).abs() < 1e-3);
        assert!((snap.avg_load_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_scoped_callback_counts() {
        let monitor = PerformanceMonitor::new(64, 48000.0, 0.1);
        {
            let _guard = monitor.scoped_callback();
        }
        monitor.add_frames_processed(64);
        monitor.increment_loop_swaps();

        let snap = monitor.snapshot(false);
        assert_eq!(snap.callback_count, 1);
        assert_eq!(snap.frames_processed, 64);
        assert_eq!(snap.loop_swaps, 1);
        assert!(snap.max_callback_nanos.is_some() || snap.min_callback_nanos == Some(0));

        monitor.reset_all();
        assert_eq!(monitor.snapshot(false).callback_count, 0);
    }
}
