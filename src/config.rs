//! Stage and pipeline configuration.
//!
//! [`ExportOptions`], [`RecognizeOptions`] and [`PipelineOptions`] are
//! builders that thread track selection, cue limits, progress callbacks,
//! cancellation tokens and other operational settings through the stages
//! without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sub2srt::{
//!     CancellationToken, ExportOptions, PipelineOptions, ProgressCallback, ProgressInfo,
//!     RecognizeOptions, SelectionMode, language_allow_list,
//! };
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = PipelineOptions::new("/videos/out")
//!     .with_export(
//!         ExportOptions::new()
//!             .with_selection(SelectionMode::All)
//!             .with_languages(language_allow_list(&["en", "de"])?),
//!     )
//!     .with_recognize(
//!         RecognizeOptions::new()
//!             .with_progress(Arc::new(LogProgress))
//!             .with_limit(Some(100))
//!             .with_overwrite(true),
//!     )
//!     .with_cancellation(token.clone());
//! # Ok::<(), sub2srt::Sub2SrtError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Codec exported when no codec allow-list is given.
pub const DEFAULT_CODEC: &str = "S_HDMV/PGS";

/// Characters the recogniser may emit: Latin letters, digits, common
/// punctuation, and music-note glyphs used for lyrics.
pub const DEFAULT_CHARACTER_WHITELIST: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789♪♩♫♬,.`~[](){}!@#$%^&*<>?+:-_/\\ '\"";

/// Which of the matching tracks to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// The first matching track in dump order, regardless of the default
    /// flag.
    #[default]
    First,
    /// The first default-flagged track, falling back to dump order.
    PreferDefault,
    /// Every matching track.
    All,
}

/// Track selection and display settings for the export stage.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub(crate) selection: SelectionMode,
    pub(crate) languages: Vec<String>,
    pub(crate) codecs: Vec<String>,
    pub(crate) live_window: Option<usize>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportOptions {
    /// Defaults: first PGS track in any language, no live window.
    pub fn new() -> Self {
        Self {
            selection: SelectionMode::First,
            languages: Vec::new(),
            codecs: vec![DEFAULT_CODEC.to_string()],
            live_window: None,
        }
    }

    /// Choose between the first, default, or every matching track.
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionMode) -> Self {
        self.selection = selection;
        self
    }

    /// Accept only these language codes. An empty list accepts any
    /// language. Use [`language_allow_list`](crate::language_allow_list)
    /// to expand user input into every alternate spelling.
    #[must_use]
    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    /// Accept only these codec IDs. An empty list accepts any codec.
    #[must_use]
    pub fn with_codecs(mut self, codecs: Vec<String>) -> Self {
        self.codecs = codecs;
        self
    }

    /// Stream tool output into a scrolling terminal window of `height`
    /// lines instead of capturing it. `None` disables the window.
    #[must_use]
    pub fn with_live_window(mut self, height: Option<usize>) -> Self {
        self.live_window = height;
        self
    }
}

/// Recogniser engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrSettings {
    /// Tesseract OCR engine mode (`--oem`).
    pub engine_mode: u8,
    /// Tesseract page segmentation mode (`--psm`).
    pub page_segmentation: u8,
    /// Characters the engine may produce.
    pub whitelist: String,
    /// Tesseract language model, e.g. `"eng"`.
    pub model: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            engine_mode: 3,
            page_segmentation: 6,
            whitelist: DEFAULT_CHARACTER_WHITELIST.to_string(),
            model: None,
        }
    }
}

/// Settings for the recognition stage.
///
/// All fields have sensible defaults; a default-constructed value
/// recognises every cue and never overwrites existing output.
#[derive(Clone)]
pub struct RecognizeOptions {
    pub(crate) limit: Option<usize>,
    pub(crate) overwrite: bool,
    pub(crate) ocr: OcrSettings,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
}

impl Debug for RecognizeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RecognizeOptions")
            .field("limit", &self.limit)
            .field("overwrite", &self.overwrite)
            .field("ocr", &self.ocr)
            .field("has_progress", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognizeOptions {
    /// Defaults: no cue limit, no overwrite, no progress callback, no
    /// cancellation, batch size 1.
    pub fn new() -> Self {
        Self {
            limit: None,
            overwrite: false,
            ocr: OcrSettings::default(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Stop after this many cues across the whole event list.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Replace an existing caption file instead of skipping the job.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Override the recogniser engine settings.
    #[must_use]
    pub fn with_ocr(mut self, ocr: OcrSettings) -> Self {
        self.ocr = ocr;
        self
    }

    /// Attach a progress callback, invoked every
    /// [`batch_size`](RecognizeOptions::with_batch_size) cues.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, recognition stops and returns
    /// [`Sub2SrtError::Cancelled`](crate::Sub2SrtError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum
    /// of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured cue limit.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether existing output may be replaced.
    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

/// Settings for a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub(crate) output_dir: PathBuf,
    pub(crate) working_root: Option<PathBuf>,
    pub(crate) queue_capacity: usize,
    pub(crate) export: ExportOptions,
    pub(crate) recognize: RecognizeOptions,
    pub(crate) cancellation: CancellationToken,
}

impl PipelineOptions {
    /// Write caption files into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            working_root: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            export: ExportOptions::new(),
            recognize: RecognizeOptions::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Create the per-run working directory under `root` instead of the
    /// system temporary directory.
    #[must_use]
    pub fn with_working_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.working_root = Some(root.into());
        self
    }

    /// Capacity of each stage queue. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Export stage settings.
    #[must_use]
    pub fn with_export(mut self, export: ExportOptions) -> Self {
        self.export = export;
        self
    }

    /// Recognition stage settings.
    #[must_use]
    pub fn with_recognize(mut self, recognize: RecognizeOptions) -> Self {
        self.recognize = recognize;
        self
    }

    /// Share a cancellation token with every stage. Also attached to the
    /// recognition settings.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.recognize = self.recognize.with_cancellation(token.clone());
        self.cancellation = token;
        self
    }

    /// The token observed by every stage.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
