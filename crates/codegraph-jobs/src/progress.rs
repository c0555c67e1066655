use codegraph_core::ProgressSink;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::store::AnalysisRunStore;

/// Throttles `AnalysisRun` progress writes to roughly once every 500ms
/// (spec §4.9 step 8 "flushed at most every ~500 ms to avoid storm writes"),
/// grounded on `repotoire/workers/progress.py`'s `ProgressTracker`. The last
/// update of a job is always flushed regardless of the throttle, so a caller
/// that reaches 100% right after a throttled write isn't left stale.
pub struct ProgressTracker<S: AnalysisRunStore> {
    store: Arc<S>,
    analysis_run_id: Uuid,
    last_flush: Mutex<Instant>,
    min_interval: Duration,
}

impl<S: AnalysisRunStore> ProgressTracker<S> {
    pub fn new(store: Arc<S>, analysis_run_id: Uuid) -> Self {
        Self {
            store,
            analysis_run_id,
            last_flush: Mutex::new(Instant::now() - Duration::from_secs(1)),
            min_interval: Duration::from_millis(500),
        }
    }

    pub async fn update(&self, percent: u8, current_step: &str) {
        let should_flush = {
            let mut last = self.last_flush.lock();
            if last.elapsed() >= self.min_interval || percent >= 100 {
                *last = Instant::now();
                true
            } else {
                false
            }
        };
        if should_flush {
            if let Err(err) = self.store.update_progress(self.analysis_run_id, percent, current_step).await {
                tracing::warn!(
                    analysis_run_id = %self.analysis_run_id,
                    error = %err,
                    "failed to flush analysis progress"
                );
            }
        }
    }

    /// Forces the next `update` call through regardless of the throttle,
    /// used right before a terminal status transition.
    pub async fn flush_now(&self, percent: u8, current_step: &str) {
        *self.last_flush.lock() = Instant::now();
        if let Err(err) = self.store.update_progress(self.analysis_run_id, percent, current_step).await {
            tracing::warn!(
                analysis_run_id = %self.analysis_run_id,
                error = %err,
                "failed to flush terminal analysis progress"
            );
        }
    }
}

/// Adapts a `ProgressTracker` to the Ingestion Pipeline's `ProgressSink`
/// seam, scaling its 0-100 callback range into the slice of the overall job
/// the caller reserves for it (spec §4.9 step 8's 20-60%/60-90% banding,
/// grounded on `tasks.py`'s `ingestion_progress`/`analysis_progress`
/// closures).
pub struct BandedProgressSink<'a, S: AnalysisRunStore> {
    tracker: &'a ProgressTrackerHandle<S>,
    band_start: u8,
    band_width: u8,
}

/// A `Send + Sync` handle usable from inside a `ProgressSink` callback,
/// which is not itself `async`.
pub struct ProgressTrackerHandle<S: AnalysisRunStore> {
    handle: tokio::runtime::Handle,
    tracker: Arc<ProgressTracker<S>>,
}

impl<S: AnalysisRunStore + 'static> ProgressTrackerHandle<S> {
    pub fn new(tracker: Arc<ProgressTracker<S>>) -> Self {
        Self { handle: tokio::runtime::Handle::current(), tracker }
    }

    pub fn band(&self, band_start: u8, band_width: u8) -> BandedProgressSink<'_, S> {
        BandedProgressSink { tracker: self, band_start, band_width }
    }
}

impl<'a, S: AnalysisRunStore + 'static> ProgressSink for BandedProgressSink<'a, S> {
    fn on_progress(&self, percent: u8, current_step: &str) {
        let scaled = self.band_start
            + ((percent as u32 * self.band_width as u32) / 100).min(self.band_width as u32) as u8;
        let tracker = self.tracker.tracker.clone();
        let step = current_step.to_string();
        self.tracker.handle.spawn(async move {
            tracker.update(scaled, &step).await;
        });
    }
}
