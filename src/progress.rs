//! Stage progress and run cancellation.
//!
//! Stages report through a [`ProgressCallback`]: the recognition stage once
//! per batch of cues, the export and conversion stages once per finished
//! job. A [`CancellationToken`] shared by every stage (and by the interrupt
//! handler in the binary) stops the run between jobs, between cues, and
//! while a tool is streaming into the live window.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use sub2srt::{
//!     CaptionRecognizer, JobItem, ProgressCallback, ProgressInfo, RecognizeOptions,
//!     Sub2SrtError, Toolchain,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% of cues read", info.operation);
//!         }
//!     }
//! }
//!
//! let options = RecognizeOptions::new().with_progress(Arc::new(PrintProgress));
//! let recognizer = CaptionRecognizer::with_tesseract(&Toolchain::discover(), options)?;
//! let job = JobItem::new("/tmp/work/subtitles.xml", "/videos");
//! recognizer.process(&job, Path::new("/tmp/work"))?;
//! # Ok::<(), Sub2SrtError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// The stage a progress report comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Containers whose subtitle tracks have been exported.
    TrackExport,
    /// Subtitle streams converted into event lists.
    Conversion,
    /// Cues of one event list read by the recogniser.
    Recognition,
}

/// One progress report.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Which stage is reporting.
    pub operation: OperationType,
    /// Items finished so far: cues for recognition, jobs otherwise.
    pub current: u64,
    /// Items expected, when the stage knows up front.
    pub total: Option<u64>,
    /// `current / total` as a percentage, when `total` is known and
    /// non-zero.
    pub percentage: Option<f32>,
    /// Time since the stage started on this unit of work.
    pub elapsed: Duration,
    /// Remaining time extrapolated from the average item so far.
    pub estimated_remaining: Option<Duration>,
}

/// Receives progress reports.
///
/// Callbacks run on stage worker threads, and on rayon workers when cues
/// are recognised in parallel, hence the [`Send`] and [`Sync`] bounds.
/// A callback can only observe; stopping a run goes through
/// [`CancellationToken`].
pub trait ProgressCallback: Send + Sync {
    /// Handle one report.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards every report. Used when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Shared stop flag for a pipeline run.
///
/// Clones observe the same flag. Once cancelled a token stays cancelled.
///
/// # Example
///
/// ```
/// use sub2srt::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handler = token.clone();
/// assert!(!token.is_cancelled());
///
/// handler.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every stage to stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` once any clone has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Counts finished items for one stage and reports every `batch_size`.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    batch_size: u64,
    started: Instant,
    done: u64,
    unreported: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            batch_size: batch_size.max(1),
            started: Instant::now(),
            done: 0,
            unreported: 0,
        }
    }

    /// One more item finished.
    pub(crate) fn advance(&mut self) {
        self.done += 1;
        self.unreported += 1;
        if self.unreported >= self.batch_size {
            self.unreported = 0;
            self.callback.on_progress(&self.snapshot());
        }
    }

    /// Report the final count, whether or not a batch just ended.
    pub(crate) fn finish(&mut self) {
        self.unreported = 0;
        self.callback.on_progress(&self.snapshot());
    }

    fn snapshot(&self) -> ProgressInfo {
        let elapsed = self.started.elapsed();
        let total = self.total;

        let percentage = total
            .filter(|&total| total > 0)
            .map(|total| self.done as f32 * 100.0 / total as f32);
        let estimated_remaining = total
            .filter(|_| self.done > 0)
            .map(|total| {
                let left = total.saturating_sub(self.done);
                elapsed.mul_f64(left as f64 / self.done as f64)
            });

        ProgressInfo {
            operation: self.operation,
            current: self.done,
            total,
            percentage,
            elapsed,
            estimated_remaining,
        }
    }
}
