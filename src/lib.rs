//! # sub2srt
//!
//! Turn image-based subtitle tracks into plain-text SubRip caption files.
//!
//! `sub2srt` drives three external tools through a queued, three-stage
//! pipeline:
//!
//! 1. **Track export**: `mkvinfo` lists a Matroska container's tracks and
//!    `mkvextract` pulls the selected PGS subtitle tracks out as `.sup`
//!    streams.
//! 2. **Conversion**: BDSup2Sub turns each `.sup` stream into an XML event
//!    list plus one PNG per cue.
//! 3. **Recognition**: each cue bitmap is normalised with the
//!    [`image`](https://crates.io/crates/image) crate and read by
//!    `tesseract`; frame timecodes become caption timestamps and the
//!    blocks are written to a `.srt` file.
//!
//! Stages are connected by bounded queues, so a container with several
//! subtitle tracks fans out into several caption files while each stage
//! works on a different track.
//!
//! ## Quick Start
//!
//! ### Convert a Container
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sub2srt::{Pipeline, PipelineOptions, Toolchain};
//!
//! let pipeline = Pipeline::new(Toolchain::discover(), PipelineOptions::new("subs"));
//! let report = pipeline.run(Path::new("movie.mkv")).unwrap();
//! assert!(report.is_success());
//! ```
//!
//! ### Pick Tracks by Language
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sub2srt::{
//!     ExportOptions, Pipeline, PipelineOptions, SelectionMode, Toolchain, language_allow_list,
//! };
//!
//! let export = ExportOptions::new()
//!     .with_selection(SelectionMode::All)
//!     .with_languages(language_allow_list(&["en", "fr"]).unwrap());
//! let options = PipelineOptions::new("subs").with_export(export);
//! Pipeline::new(Toolchain::discover(), options)
//!     .run(Path::new("movie.mkv"))
//!     .unwrap();
//! ```
//!
//! ### List Tracks Without Extracting
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sub2srt::{ExportOptions, Toolchain, TrackExporter, TrackFilter};
//!
//! let exporter = TrackExporter::new(&Toolchain::discover(), ExportOptions::new()).unwrap();
//! for track in exporter
//!     .list_tracks(Path::new("movie.mkv"), &TrackFilter::unrestricted())
//!     .unwrap()
//! {
//!     println!("{} {} {}", track.id, track.codec, track.language);
//! }
//! ```
//!
//! ## Features
//!
//! - **Entry at any stage**: a container or directory, a `.sup` stream, or
//!   an `.xml` event list
//! - **Track filtering**: by codec, by language (any ISO 639 spelling), first,
//!   default-preferring, or every match
//! - **Live tool output**: extraction and conversion can stream into a
//!   scrolling terminal window
//! - **Safe output**: captions are staged and moved into place only once
//!   complete; existing files are skipped unless overwriting is enabled
//! - **Progress & cancellation**: callbacks per cue and a shared
//!   `CancellationToken` that also terminates running tools
//! - **Pluggable recognition**: any [`TextRecognizer`] can stand in for
//!   `tesseract`
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Recognise the cues of one file across rayon threads |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! MKVToolNix (`mkvinfo`, `mkvextract`), a Java runtime with the BDSup2Sub
//! jar (named by `BDSUP2SUB_JAR`), and `tesseract` must be installed for the
//! stages that use them.

pub mod config;
pub mod convert;
pub mod error;
pub mod events;
pub mod export;
pub mod language;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod queue;
#[cfg(feature = "rayon")]
mod rayon;
pub mod recognize;
pub mod timecode;
pub mod toolchain;
pub mod tracks;

pub use config::{
    DEFAULT_CHARACTER_WHITELIST, DEFAULT_CODEC, ExportOptions, OcrSettings, PipelineOptions,
    RecognizeOptions, SelectionMode,
};
pub use convert::FormatConverter;
pub use error::{ProcessFailure, Sub2SrtError};
pub use events::{CaptionEvent, EventList, load_event_list, parse_event_list};
pub use export::{TrackExporter, resolve_container, select_tracks};
pub use language::{LanguageCodes, language_allow_list, resolve_language};
pub use pipeline::{EntryStage, JobFailure, Pipeline, PipelineReport, WorkingDirectory};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use queue::{BoundedQueue, DEFAULT_QUEUE_CAPACITY, JobItem, JobReceiver, JobSender};
pub use recognize::{
    CaptionRecognizer, RecognitionOutcome, TesseractRecognizer, TextRecognizer, normalize_image,
};
pub use timecode::{Timecode, convert_timecode, format_caption_timestamp, parse_frame_rate};
pub use toolchain::{BDSUP2SUB_JAR_ENV, Tool, Toolchain};
pub use tracks::{TrackField, TrackFilter, TrackRecord, parse_tracks};
