//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring frame sampling,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressInfo`]
//! for progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use reelscan::{
//!     ExtractOptions, ExtractionError, FrameExtractor, ProgressCallback,
//!     ProgressInfo, VideoSource,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {}% complete", info.operation, info.percentage);
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_progress(Arc::new(PrintProgress));
//! let extractor = FrameExtractor::new(options);
//! let result = extractor.extract_blocking(&VideoSource::from_path("input.mp4"))?;
//! # Ok::<(), ExtractionError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Seeking, rasterizing and encoding sampled frames.
    FrameSampling,
}

/// A snapshot of extraction progress.
///
/// Delivered to [`ProgressCallback::on_progress`] once per completed frame.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many frames have been sampled so far.
    pub current: u64,
    /// Total frames that will be sampled.
    pub total: u64,
    /// `round(100 * current / total)`, at least 1 once a frame is done and
    /// never lower than a previous report.
    pub percentage: u8,
    /// Wall-clock time elapsed since sampling started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Timestamp of the frame that was just sampled.
    pub current_timestamp: Option<Duration>,
}

/// Trait for receiving progress updates during extraction.
///
/// Implementations must be [`Send`] and [`Sync`] because an extraction
/// future may move between runtime worker threads.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called after each sampled frame.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads or tasks; call
/// [`cancel`](CancellationToken::cancel) from anywhere to request
/// cancellation. The sampler checks the token before each seek.
///
/// # Example
///
/// ```
/// use reelscan::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks sampling progress and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: u64,
    current: u64,
    last_percentage: u8,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            last_percentage: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one completed frame and report it.
    pub(crate) fn advance(&mut self, timestamp: Option<Duration>) {
        self.current += 1;

        let percentage = completion_percentage(self.current, self.total).max(self.last_percentage);
        self.last_percentage = percentage;

        let elapsed = self.start_time.elapsed();
        let remaining = self.total.saturating_sub(self.current);
        let estimated_remaining = u32::try_from(self.current)
            .ok()
            .zip(u32::try_from(remaining).ok())
            .map(|(done, left)| elapsed / done * left);

        let info = ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_timestamp: timestamp,
        };

        self.callback.on_progress(&info);
    }
}

/// `round(100 * current / total)`, clamped to `0..=100`.
///
/// Any completed work reports at least 1, so large totals never open with 0.
pub(crate) fn completion_percentage(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    if current == 0 {
        return 0;
    }
    let ratio = current.min(total) as f64 / total as f64;
    ((ratio * 100.0).round() as u8).max(1)
}
