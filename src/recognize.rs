//! Stage 3: caption recognition.
//!
//! [`CaptionRecognizer`] reads an event list, normalises each cue bitmap
//! with [`normalize_image`], hands it to a [`TextRecognizer`], and writes one
//! caption block per cue. Output is staged in the working directory and
//! moved into place only once every cue has been written.
//!
//! The engine sits behind the [`TextRecognizer`] trait so the stage can be
//! driven by [`TesseractRecognizer`] in production and by a stub in tests.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat};
use tempfile::NamedTempFile;

use crate::config::{OcrSettings, RecognizeOptions};
use crate::error::Sub2SrtError;
use crate::events::{EventList, load_event_list};
use crate::process::run_captured;
use crate::progress::{OperationType, ProgressTracker};
use crate::queue::JobItem;
use crate::timecode::convert_timecode;
use crate::toolchain::{Tool, Toolchain};

/// Extension of the caption files this stage writes.
pub const CAPTION_EXTENSION: &str = "srt";

/// Gaussian sigma matching a 5x5 kernel with automatic sigma.
const BLUR_SIGMA: f32 = 1.1;

/// Turns one normalised cue bitmap into text.
///
/// Implementations must be [`Send`] and [`Sync`]; with the `rayon` feature
/// enabled, cues of one file are recognised concurrently.
pub trait TextRecognizer: Send + Sync {
    /// Recognise the text in `image`.
    fn recognize(&self, image: &GrayImage) -> Result<String, Sub2SrtError>;
}

/// [`TextRecognizer`] backed by the `tesseract` command-line engine.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    settings: OcrSettings,
}

impl TesseractRecognizer {
    /// # Errors
    ///
    /// [`Sub2SrtError::MissingDependency`] if `tesseract` is not available.
    pub fn new(toolchain: &Toolchain, settings: OcrSettings) -> Result<Self, Sub2SrtError> {
        Ok(Self {
            binary: toolchain.require(Tool::Tesseract)?,
            settings,
        })
    }

    /// The engine invocation for one image, writing text to stdout.
    pub fn command(&self, image_path: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(image_path)
            .arg("stdout")
            .arg("--oem")
            .arg(self.settings.engine_mode.to_string())
            .arg("--psm")
            .arg(self.settings.page_segmentation.to_string());
        if let Some(model) = &self.settings.model {
            command.arg("-l").arg(model);
        }
        command
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", self.settings.whitelist));
        command
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &GrayImage) -> Result<String, Sub2SrtError> {
        let staged = tempfile::Builder::new()
            .prefix("cue-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(staged.path(), ImageFormat::Png)?;

        let output = run_captured(&mut self.command(staged.path()))?.check()?;
        Ok(output.stdout)
    }
}

/// Normalise a cue bitmap for recognition: grayscale, 2x cubic upscale,
/// Gaussian smoothing, then inversion to dark text on a light background.
pub fn normalize_image(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let upscaled = imageops::resize(
        &gray,
        gray.width().saturating_mul(2),
        gray.height().saturating_mul(2),
        FilterType::CatmullRom,
    );
    let mut smoothed = imageops::blur(&upscaled, BLUR_SIGMA);
    imageops::invert(&mut smoothed);
    smoothed
}

/// Result of processing one event list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// The caption file was written.
    Written {
        /// Final caption file.
        path: PathBuf,
        /// Number of caption blocks written.
        cues: usize,
    },
    /// The caption file already existed and overwriting was disabled.
    Skipped {
        /// The existing caption file.
        path: PathBuf,
    },
}

impl RecognitionOutcome {
    /// The caption file this outcome refers to.
    pub fn path(&self) -> &Path {
        match self {
            RecognitionOutcome::Written { path, .. } | RecognitionOutcome::Skipped { path } => {
                path
            }
        }
    }
}

/// A cue that passed validation and is ready for recognition.
#[derive(Debug, Clone)]
pub(crate) struct PlannedCue {
    pub(crate) sequence: usize,
    pub(crate) start: String,
    pub(crate) end: String,
    pub(crate) image: PathBuf,
}

/// Recognises the cues of event lists and writes caption files.
#[derive(Clone)]
pub struct CaptionRecognizer {
    recognizer: Arc<dyn TextRecognizer>,
    options: RecognizeOptions,
}

impl std::fmt::Debug for CaptionRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionRecognizer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CaptionRecognizer {
    /// Recognise with an arbitrary engine.
    pub fn new(recognizer: Arc<dyn TextRecognizer>, options: RecognizeOptions) -> Self {
        Self {
            recognizer,
            options,
        }
    }

    /// Recognise with `tesseract`, configured from `options`.
    ///
    /// # Errors
    ///
    /// [`Sub2SrtError::MissingDependency`] if `tesseract` is not available.
    pub fn with_tesseract(
        toolchain: &Toolchain,
        options: RecognizeOptions,
    ) -> Result<Self, Sub2SrtError> {
        let tesseract = TesseractRecognizer::new(toolchain, options.ocr.clone())?;
        Ok(Self::new(Arc::new(tesseract), options))
    }

    /// The options this recogniser runs with.
    pub fn options(&self) -> &RecognizeOptions {
        &self.options
    }

    /// Where the caption file for `job` is written: the event list's stem
    /// with the caption extension, inside the job's output directory.
    pub fn output_path(job: &JobItem) -> PathBuf {
        let stem = job
            .input_path()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "subtitles".to_string());
        job.output_dir()
            .join(format!("{stem}.{CAPTION_EXTENSION}"))
    }

    /// Recognise the event list named by `job`, staging output under
    /// `working_dir`.
    ///
    /// Returns [`RecognitionOutcome::Skipped`] without reading the event
    /// list when the caption file exists and overwriting is disabled.
    ///
    /// # Errors
    ///
    /// - [`Sub2SrtError::MalformedEvents`] if the event list is unusable.
    /// - [`Sub2SrtError::ImageError`] if a cue bitmap cannot be decoded.
    /// - [`Sub2SrtError::Process`] if the engine fails.
    /// - [`Sub2SrtError::Cancelled`] if cancelled; nothing is written.
    pub fn process(
        &self,
        job: &JobItem,
        working_dir: &Path,
    ) -> Result<RecognitionOutcome, Sub2SrtError> {
        let destination = Self::output_path(job);
        if destination.exists() && !self.options.overwrite {
            log::warn!(
                "Caption file {} exists and overwrite is disabled, skipping {job}",
                destination.display()
            );
            return Ok(RecognitionOutcome::Skipped { path: destination });
        }

        let events = load_event_list(job.input_path())?;
        log::info!(
            "Format: '{}' Subtitle Language: '{}', Frame Rate: '{}'",
            events.video_format,
            events.language,
            events.frame_rate_label
        );

        let base_dir = job.input_path().parent().unwrap_or_else(|| Path::new("."));
        let cues = self.plan(&events, base_dir);
        log::info!("Recognising {} cues from {job}", cues.len());

        let texts = self.recognize_cues(&cues)?;

        fs::create_dir_all(working_dir)?;
        let mut staged = tempfile::Builder::new()
            .prefix(&format!("subtitles.{}.", events.language))
            .suffix(&format!(".{CAPTION_EXTENSION}"))
            .tempfile_in(working_dir)?;
        log::debug!("Writing to temporary output file {}", staged.path().display());

        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            for (cue, text) in cues.iter().zip(&texts) {
                write!(
                    writer,
                    "{}\n{} --> {}\n{}\n\n",
                    cue.sequence, cue.start, cue.end, text
                )?;
            }
            writer.flush()?;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        persist_output(staged, &destination)?;

        log::info!(
            "Caption file {} complete. {} captions created.",
            destination.display(),
            cues.len()
        );
        Ok(RecognitionOutcome::Written {
            path: destination,
            cues: cues.len(),
        })
    }

    /// Select the cues to recognise. Numbering follows document position,
    /// so a skipped cue still consumes its number; the limit counts
    /// positions across every `Events` section.
    fn plan(&self, events: &EventList, base_dir: &Path) -> Vec<PlannedCue> {
        let mut planned = Vec::new();
        for (index, event) in events.events.iter().enumerate() {
            let sequence = index + 1;
            if self.options.limit.is_some_and(|limit| sequence > limit) {
                log::info!("Cue limit reached after {} cues", sequence - 1);
                break;
            }

            let Some(image) = event.image_path(base_dir) else {
                log::warn!("Cue {sequence}: no image file found, skipping");
                continue;
            };
            if !image.is_file() {
                log::warn!(
                    "Cue {sequence}: image file {} does not exist, skipping",
                    image.display()
                );
                continue;
            }

            let (Some(start), Some(end)) = (&event.start_timecode, &event.end_timecode) else {
                log::warn!("Cue {sequence}: missing InTC or OutTC, skipping");
                continue;
            };
            let timestamps = convert_timecode(start, events.frame_rate).and_then(|start| {
                convert_timecode(end, events.frame_rate).map(|end| (start, end))
            });
            match timestamps {
                Ok((start, end)) => planned.push(PlannedCue {
                    sequence,
                    start,
                    end,
                    image,
                }),
                Err(error) => log::warn!("Cue {sequence}: {error}, skipping"),
            }
        }
        planned
    }

    #[cfg(not(feature = "rayon"))]
    fn recognize_cues(&self, cues: &[PlannedCue]) -> Result<Vec<String>, Sub2SrtError> {
        let mut tracker = self.tracker(cues.len());
        let mut texts = Vec::with_capacity(cues.len());
        for cue in cues {
            if self.options.is_cancelled() {
                return Err(Sub2SrtError::Cancelled);
            }
            texts.push(self.recognize_cue(cue)?);
            tracker.advance();
        }
        tracker.finish();
        Ok(texts)
    }

    #[cfg(feature = "rayon")]
    fn recognize_cues(&self, cues: &[PlannedCue]) -> Result<Vec<String>, Sub2SrtError> {
        let tracker = std::sync::Mutex::new(self.tracker(cues.len()));
        let texts = crate::rayon::recognize_parallel(self, cues, &tracker)?;
        tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .finish();
        Ok(texts)
    }

    fn tracker(&self, total: usize) -> ProgressTracker {
        ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::Recognition,
            Some(total as u64),
            self.options.batch_size,
        )
    }

    pub(crate) fn recognize_cue(&self, cue: &PlannedCue) -> Result<String, Sub2SrtError> {
        let bitmap = image::open(&cue.image)?;
        let text = self.recognizer.recognize(&normalize_image(&bitmap))?;
        Ok(text.trim().to_string())
    }
}

/// Move the staged file into place. When a rename cannot cross file
/// systems the content is copied into a second temporary file beside
/// `destination`, which is then renamed over it.
fn persist_output(staged: NamedTempFile, destination: &Path) -> Result<(), Sub2SrtError> {
    match staged.persist(destination) {
        Ok(_) => Ok(()),
        Err(error) => {
            log::debug!(
                "Renaming into {} failed ({}), copying instead",
                destination.display(),
                error.error
            );
            copy_into_place(error.file.path(), destination)
        }
    }
}

fn copy_into_place(source: &Path, destination: &Path) -> Result<(), Sub2SrtError> {
    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut sibling = NamedTempFile::new_in(parent)?;
    std::io::copy(&mut fs::File::open(source)?, sibling.as_file_mut())?;
    sibling.as_file().sync_all()?;
    sibling
        .persist(destination)
        .map_err(|error| error.error)?;
    Ok(())
}
