//! The three-stage pipeline coordinator.
//!
//! A [`Pipeline`] wires the stages together with [`BoundedQueue`]s:
//!
//! ```text
//! to_extract -> [TrackExporter] -> to_convert -> [FormatConverter] -> to_recognize -> [CaptionRecognizer]
//! ```
//!
//! Each stage runs on its own thread and drains its input queue
//! sequentially. The input decides where the run starts (see
//! [`EntryStage`]); stages upstream of the entry point are never built, so
//! their tools need not be installed. A job that fails is logged and
//! recorded in the [`PipelineReport`] while the other jobs carry on; a
//! failure for which [`Sub2SrtError::stops_run`] holds cancels every stage
//! and is returned from [`Pipeline::run`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sub2srt::{Pipeline, PipelineOptions, Sub2SrtError, Toolchain};
//!
//! let pipeline = Pipeline::new(Toolchain::discover(), PipelineOptions::new("/videos/out"));
//! let report = pipeline.run(Path::new("/videos/movie.mkv"))?;
//! for path in &report.written {
//!     println!("wrote {}", path.display());
//! }
//! # Ok::<(), Sub2SrtError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use crate::config::PipelineOptions;
use crate::convert::{EVENT_LIST_EXTENSION, FormatConverter};
use crate::error::Sub2SrtError;
use crate::export::{TrackExporter, is_container};
use crate::progress::{CancellationToken, OperationType, ProgressTracker};
use crate::queue::{BoundedQueue, JobItem, JobReceiver};
use crate::recognize::{CaptionRecognizer, RecognitionOutcome, TextRecognizer};
use crate::toolchain::Toolchain;

/// How often idle stage workers check for cancellation.
const STAGE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-run scratch space: `tracks/` for exported streams and `subtitles/`
/// for per-job converter output. Removed when dropped.
#[derive(Debug)]
pub struct WorkingDirectory {
    root: TempDir,
}

impl WorkingDirectory {
    /// Create a fresh working directory under `parent`, or under the
    /// system temporary directory when `parent` is `None`.
    ///
    /// # Errors
    ///
    /// [`Sub2SrtError::IoError`] if the directory cannot be created.
    pub fn create(parent: Option<&Path>) -> Result<Self, Sub2SrtError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sub2srt-");
        let root = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        log::debug!("Working directory: {}", root.path().display());
        Ok(Self { root })
    }

    /// The working directory itself.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// `{working}/tracks`, created on first use.
    pub fn tracks(&self) -> Result<PathBuf, Sub2SrtError> {
        self.subdirectory("tracks")
    }

    /// `{working}/subtitles`, created on first use.
    pub fn subtitles(&self) -> Result<PathBuf, Sub2SrtError> {
        self.subdirectory("subtitles")
    }

    fn subdirectory(&self, name: &str) -> Result<PathBuf, Sub2SrtError> {
        let path = self.root.path().join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

/// The stage a run starts at, decided by the input path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryStage {
    /// A Matroska container, or a directory holding one.
    Export,
    /// A binary `.sup` subtitle stream.
    Convert,
    /// An XML event list.
    Recognize,
}

impl EntryStage {
    /// Classify `path`.
    ///
    /// # Errors
    ///
    /// - [`Sub2SrtError::NotFound`] if the path does not exist.
    /// - [`Sub2SrtError::InvalidInput`] for empty files and unsupported
    ///   extensions.
    pub fn detect(path: &Path) -> Result<Self, Sub2SrtError> {
        if !path.exists() {
            return Err(Sub2SrtError::not_found(path, "input does not exist"));
        }
        if path.is_dir() {
            return Ok(EntryStage::Export);
        }
        if fs::metadata(path)?.len() == 0 {
            return Err(Sub2SrtError::invalid_input(path, "file is empty"));
        }
        if is_container(path) {
            return Ok(EntryStage::Export);
        }

        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some("sup") => Ok(EntryStage::Convert),
            Some(EVENT_LIST_EXTENSION) => Ok(EntryStage::Recognize),
            _ => Err(Sub2SrtError::invalid_input(
                path,
                "expected a Matroska container, a .sup stream, an .xml event list, or a directory",
            )),
        }
    }
}

impl Display for EntryStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            EntryStage::Export => write!(f, "track export"),
            EntryStage::Convert => write!(f, "conversion"),
            EntryStage::Recognize => write!(f, "recognition"),
        }
    }
}

/// A job that failed without stopping the run.
#[derive(Debug)]
pub struct JobFailure {
    /// Queue the job was taken from.
    pub stage: &'static str,
    /// The job's input artifact.
    pub input: PathBuf,
    /// What went wrong.
    pub error: Sub2SrtError,
}

/// Summary of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Caption files written, in completion order.
    pub written: Vec<PathBuf>,
    /// Caption files left untouched because they already existed.
    pub skipped: Vec<PathBuf>,
    /// Jobs that failed.
    pub failures: Vec<JobFailure>,
}

impl PipelineReport {
    /// Returns `true` if no job failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, outcome: RecognitionOutcome) {
        match outcome {
            RecognitionOutcome::Written { path, .. } => self.written.push(path),
            RecognitionOutcome::Skipped { path } => self.skipped.push(path),
        }
    }
}

/// Shared state the stage workers report into.
#[derive(Default)]
struct RunState {
    report: Mutex<PipelineReport>,
    fatal: Mutex<Option<Sub2SrtError>>,
}

impl RunState {
    fn fail(&self, stage: &'static str, job: &JobItem, error: Sub2SrtError, token: &CancellationToken) {
        if error.stops_run() {
            log::error!("Stopping run: {stage} failed on {job}: {error}");
            token.cancel();
            let mut fatal = self.fatal.lock().unwrap_or_else(|p| p.into_inner());
            // Keep the root cause rather than the cancellations it triggers.
            if fatal
                .as_ref()
                .is_none_or(|existing| matches!(existing, Sub2SrtError::Cancelled))
            {
                *fatal = Some(error);
            }
            return;
        }

        log::error!("{stage} failed on {job}: {error}");
        self.report
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .failures
            .push(JobFailure {
                stage,
                input: job.input_path().to_path_buf(),
                error,
            });
    }
}

/// Runs inputs through the stages.
pub struct Pipeline {
    toolchain: Toolchain,
    options: PipelineOptions,
    recognizer: Option<Arc<dyn TextRecognizer>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Pipeline")
            .field("toolchain", &self.toolchain)
            .field("options", &self.options)
            .field("has_custom_recognizer", &self.recognizer.is_some())
            .finish()
    }
}

impl Pipeline {
    /// A pipeline using the tools in `toolchain`.
    pub fn new(toolchain: Toolchain, options: PipelineOptions) -> Self {
        Self {
            toolchain,
            options,
            recognizer: None,
        }
    }

    /// Recognise with `recognizer` instead of `tesseract`.
    #[must_use]
    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// The options this pipeline runs with.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run `input` through every stage from its [`EntryStage`] on.
    ///
    /// The working directory is created for this run and removed before
    /// returning.
    ///
    /// # Errors
    ///
    /// - [`Sub2SrtError::NotFound`] or [`Sub2SrtError::InvalidInput`] if the
    ///   input cannot be classified.
    /// - [`Sub2SrtError::MissingDependency`] if a needed tool is missing.
    /// - [`Sub2SrtError::Interrupted`] or [`Sub2SrtError::Cancelled`] if the
    ///   run was stopped.
    ///
    /// Per-job failures are reported in [`PipelineReport::failures`].
    pub fn run(&self, input: &Path) -> Result<PipelineReport, Sub2SrtError> {
        let entry = EntryStage::detect(input)?;
        let input = std::path::absolute(input)?;
        let output_dir = std::path::absolute(&self.options.output_dir)?;
        log::info!("Starting at {entry} with {}", input.display());

        let token = self.options.cancellation.clone();
        let exporter = (entry <= EntryStage::Export)
            .then(|| {
                TrackExporter::new(&self.toolchain, self.options.export.clone())
                    .map(|exporter| exporter.with_cancellation(token.clone()))
            })
            .transpose()?;
        let converter = (entry <= EntryStage::Convert)
            .then(|| {
                FormatConverter::new(&self.toolchain, self.options.export.live_window)
                    .map(|converter| converter.with_cancellation(token.clone()))
            })
            .transpose()?;
        let recognizer = self.caption_recognizer(&token)?;

        let working = WorkingDirectory::create(self.options.working_root.as_deref())?;
        let tracks_dir = working.tracks()?;
        let subtitles_dir = working.subtitles()?;

        let capacity = self.options.queue_capacity;
        let (extract_tx, extract_rx) = BoundedQueue::new("to_extract", capacity).split();
        let (convert_tx, convert_rx) = BoundedQueue::new("to_convert", capacity).split();
        let (recognize_tx, recognize_rx) = BoundedQueue::new("to_recognize", capacity).split();

        let seed = JobItem::new(input, output_dir);
        match entry {
            EntryStage::Export => extract_tx.publish(seed)?,
            EntryStage::Convert => convert_tx.publish(seed)?,
            EntryStage::Recognize => recognize_tx.publish(seed)?,
        }
        drop(extract_tx);

        let state = RunState::default();
        let progress = &self.options.recognize.progress;

        thread::scope(|scope| {
            match exporter {
                Some(exporter) => {
                    let state = &state;
                    let token = &token;
                    let tracks_dir = &tracks_dir;
                    scope.spawn(move || {
                        let mut tracker =
                            ProgressTracker::new(Arc::clone(progress), OperationType::TrackExport, None, 1);
                        drain(&extract_rx, token, state, |job| {
                            for exported in exporter.export(job, tracks_dir)? {
                                convert_tx.publish(exported)?;
                            }
                            tracker.advance();
                            Ok(())
                        });
                    });
                }
                None => drop((extract_rx, convert_tx)),
            }

            match converter {
                Some(converter) => {
                    let state = &state;
                    let token = &token;
                    let subtitles_dir = &subtitles_dir;
                    scope.spawn(move || {
                        let mut tracker =
                            ProgressTracker::new(Arc::clone(progress), OperationType::Conversion, None, 1);
                        drain(&convert_rx, token, state, |job| {
                            recognize_tx.publish(converter.convert(job, subtitles_dir)?)?;
                            tracker.advance();
                            Ok(())
                        });
                    });
                }
                None => drop((convert_rx, recognize_tx)),
            }

            let state = &state;
            let token = &token;
            let working_dir = working.path();
            scope.spawn(move || {
                drain(&recognize_rx, token, state, |job| {
                    let outcome = recognizer.process(job, working_dir)?;
                    state
                        .report
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .record(outcome);
                    Ok(())
                });
            });
        });

        if let Some(error) = state.fatal.into_inner().unwrap_or_else(|p| p.into_inner()) {
            return Err(error);
        }
        if token.is_cancelled() {
            return Err(Sub2SrtError::Cancelled);
        }

        let report = state.report.into_inner().unwrap_or_else(|p| p.into_inner());
        log::info!(
            "Run complete: {} written, {} skipped, {} failed",
            report.written.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn caption_recognizer(
        &self,
        token: &CancellationToken,
    ) -> Result<CaptionRecognizer, Sub2SrtError> {
        let options = self
            .options
            .recognize
            .clone()
            .with_cancellation(token.clone());
        match &self.recognizer {
            Some(recognizer) => Ok(CaptionRecognizer::new(Arc::clone(recognizer), options)),
            None => CaptionRecognizer::with_tesseract(&self.toolchain, options),
        }
    }
}

/// Drain `receiver` one job at a time until it closes or the run is
/// cancelled.
fn drain<F>(receiver: &JobReceiver, token: &CancellationToken, state: &RunState, mut handle: F)
where
    F: FnMut(&JobItem) -> Result<(), Sub2SrtError>,
{
    while !token.is_cancelled() {
        let job = match receiver.next_job_timeout(STAGE_POLL_INTERVAL) {
            Ok(Some(job)) => job,
            Ok(None) => continue,
            Err(()) => break,
        };
        log::debug!("Queue {}: took {job}", receiver.name());
        if let Err(error) = handle(&job) {
            state.fail(receiver.name(), &job, error, token);
        }
    }
    log::debug!("Queue {}: stage finished", receiver.name());
}

