//! Stage 1: subtitle track export.
//!
//! [`TrackExporter`] lists a container's tracks with `mkvinfo`, filters them
//! with the [`TrackFilter`] built from its [`ExportOptions`], and pulls each
//! selected track out with one `mkvextract` invocation.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sub2srt::{ExportOptions, JobItem, SelectionMode, Sub2SrtError, Toolchain, TrackExporter};
//!
//! let exporter = TrackExporter::new(
//!     &Toolchain::discover(),
//!     ExportOptions::new().with_selection(SelectionMode::All),
//! )?;
//! let job = JobItem::new("/videos/movie.mkv", "/videos");
//! for exported in exporter.export(&job, Path::new("/tmp/work/tracks"))? {
//!     println!("exported {exported}");
//! }
//! # Ok::<(), Sub2SrtError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{ExportOptions, SelectionMode};
use crate::error::Sub2SrtError;
use crate::process::{LiveWindow, run_captured, run_with_live_window};
use crate::progress::CancellationToken;
use crate::queue::JobItem;
use crate::toolchain::{Tool, Toolchain};
use crate::tracks::{SUBTITLES, TrackField, TrackFilter, TrackRecord, parse_tracks};

/// File extensions treated as Matroska containers.
pub const CONTAINER_EXTENSIONS: &[&str] = &["mkv", "mks", "mk3d"];

/// Extracts subtitle tracks from Matroska containers.
#[derive(Debug, Clone)]
pub struct TrackExporter {
    mkvinfo: PathBuf,
    mkvextract: PathBuf,
    options: ExportOptions,
    cancellation: Option<CancellationToken>,
}

impl TrackExporter {
    /// Create an exporter using the demuxer binaries in `toolchain`.
    ///
    /// # Errors
    ///
    /// [`Sub2SrtError::MissingDependency`] if `mkvinfo` or `mkvextract` is
    /// not available.
    pub fn new(toolchain: &Toolchain, options: ExportOptions) -> Result<Self, Sub2SrtError> {
        Ok(Self {
            mkvinfo: toolchain.require(Tool::MkvInfo)?,
            mkvextract: toolchain.require(Tool::MkvExtract)?,
            options,
            cancellation: None,
        })
    }

    /// Observe `token` while extraction output is streaming.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The filter applied to the track dump: subtitle tracks in the
    /// configured codecs and languages.
    pub fn filter(&self) -> TrackFilter {
        TrackFilter::new()
            .with_any(TrackField::Id)
            .with_allowed(TrackField::Type, [SUBTITLES])
            .with_allowed(TrackField::Codec, self.options.codecs.iter().cloned())
            .with_allowed(TrackField::Language, self.options.languages.iter().cloned())
            .with_any(TrackField::Default)
            .with_any(TrackField::Forced)
            .with_any(TrackField::Name)
    }

    /// List the tracks of `container` that pass `filter`.
    ///
    /// # Errors
    ///
    /// - [`Sub2SrtError::Process`] if `mkvinfo` cannot start.
    /// - [`Sub2SrtError::Export`] if `mkvinfo` exits non-zero.
    pub fn list_tracks(
        &self,
        container: &Path,
        filter: &TrackFilter,
    ) -> Result<Vec<TrackRecord>, Sub2SrtError> {
        let output = run_captured(
            Command::new(&self.mkvinfo)
                .env("LC_ALL", "C")
                .arg(container),
        )?
        .check()
        .map_err(|source| Sub2SrtError::Export {
            container: container.to_path_buf(),
            source,
        })?;

        Ok(parse_tracks(&output.stdout, filter))
    }

    /// Extract the selected subtitle tracks of the job's container into
    /// `tracks_dir`, returning one successor job per exported file in dump
    /// order.
    ///
    /// # Errors
    ///
    /// - [`Sub2SrtError::NotFound`] if no container is found, or it holds no
    ///   eligible track.
    /// - [`Sub2SrtError::AmbiguousInput`] if a directory input holds several
    ///   containers.
    /// - [`Sub2SrtError::Export`] if `mkvinfo` or `mkvextract` fails.
    /// - [`Sub2SrtError::Interrupted`] if cancelled while extracting.
    pub fn export(&self, job: &JobItem, tracks_dir: &Path) -> Result<Vec<JobItem>, Sub2SrtError> {
        let container = resolve_container(job.input_path())?;
        log::info!("Extracting subtitle tracks from {}", container.display());

        let tracks = self.list_tracks(&container, &self.filter())?;
        let selected = select_tracks(tracks, self.options.selection);
        if selected.is_empty() {
            return Err(Sub2SrtError::not_found(
                &container,
                "no subtitle track matches the requested codecs and languages",
            ));
        }

        fs::create_dir_all(tracks_dir)?;
        let stem = container
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "subtitles".to_string());

        let mut exported = Vec::with_capacity(selected.len());
        for track in &selected {
            let destination = tracks_dir.join(track.derived_filename(&stem));
            self.extract_track(&container, track, &destination)?;
            log::info!(
                "Extracted track {} ({}) to {}",
                track.id,
                track.language,
                destination.display()
            );
            exported.push(job.successor(destination));
        }

        Ok(exported)
    }

    fn extract_track(
        &self,
        container: &Path,
        track: &TrackRecord,
        destination: &Path,
    ) -> Result<(), Sub2SrtError> {
        let mut command = Command::new(&self.mkvextract);
        command
            .env("LC_ALL", "C")
            .arg(container)
            .arg("tracks")
            .arg(format!("{}:{}", track.id, destination.display()));

        let result = match self.options.live_window {
            Some(height) => {
                let header = vec![
                    format!("Extracting subtitles from '{}'", container.display()),
                    format!(
                        " - Track {} [{}] {} -> '{}'",
                        track.id,
                        track.codec,
                        track.language,
                        destination.display()
                    ),
                ];
                let window = LiveWindow::new(height).with_header(header);
                run_with_live_window(&mut command, &window, self.cancellation.as_ref())
            }
            None => run_captured(&mut command)?
                .check()
                .map(|_| ())
                .map_err(Sub2SrtError::from),
        };

        result.map_err(|error| match error {
            Sub2SrtError::Process(source) => Sub2SrtError::Export {
                container: container.to_path_buf(),
                source,
            },
            other => other,
        })
    }
}

/// Apply a [`SelectionMode`] to tracks in dump order.
pub fn select_tracks(tracks: Vec<TrackRecord>, selection: SelectionMode) -> Vec<TrackRecord> {
    match selection {
        SelectionMode::All => tracks,
        SelectionMode::First => tracks.into_iter().take(1).collect(),
        SelectionMode::PreferDefault => {
            let preferred = tracks
                .iter()
                .position(|track| track.is_default)
                .unwrap_or(0);
            tracks.into_iter().skip(preferred).take(1).collect()
        }
    }
}

/// Resolve a job input to exactly one container.
///
/// A file is returned as-is. A directory must hold exactly one file with a
/// [container extension](CONTAINER_EXTENSIONS).
///
/// # Errors
///
/// - [`Sub2SrtError::NotFound`] if the path does not exist or a directory
///   holds no container.
/// - [`Sub2SrtError::AmbiguousInput`] if a directory holds several.
pub fn resolve_container(path: &Path) -> Result<PathBuf, Sub2SrtError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(Sub2SrtError::not_found(path, "input container does not exist"));
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|candidate| candidate.is_file() && is_container(candidate))
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Err(Sub2SrtError::not_found(
            path,
            "directory contains no Matroska container",
        )),
        1 => Ok(candidates.remove(0)),
        _ => Err(Sub2SrtError::AmbiguousInput {
            directory: path.to_path_buf(),
            candidates,
        }),
    }
}

/// Returns `true` if `path` has a container extension.
pub fn is_container(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            CONTAINER_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}
