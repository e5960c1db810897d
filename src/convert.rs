//! Stage 2: binary subtitle conversion.
//!
//! [`FormatConverter`] runs BDSup2Sub on each exported `.sup` stream,
//! producing an XML event list plus one PNG per cue inside a fresh
//! per-job directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use crate::error::Sub2SrtError;
use crate::process::{LiveWindow, run_captured, run_with_live_window};
use crate::progress::CancellationToken;
use crate::queue::JobItem;
use crate::toolchain::{Tool, Toolchain};

/// Extension of the event lists the converter writes.
pub const EVENT_LIST_EXTENSION: &str = "xml";

const CONVERTER_CREDITS: [&str; 2] = [
    " * URL: https://github.com/mjuhasz/BDSup2Sub",
    " * Documentation: https://github.com/mjuhasz/BDSup2Sub/wiki",
];

/// Converts binary subtitle streams into XML event lists.
#[derive(Debug)]
pub struct FormatConverter {
    java: PathBuf,
    jar: PathBuf,
    live_window: Option<usize>,
    cancellation: Option<CancellationToken>,
    header: Mutex<Vec<String>>,
}

impl FormatConverter {
    /// Create a converter and query the converter's version for the
    /// live-window header.
    ///
    /// # Errors
    ///
    /// - [`Sub2SrtError::MissingDependency`] if `java` or the converter jar
    ///   is not available.
    /// - [`Sub2SrtError::Process`] if `java` cannot be started.
    pub fn new(toolchain: &Toolchain, live_window: Option<usize>) -> Result<Self, Sub2SrtError> {
        let java = toolchain.require(Tool::Java)?;
        let jar = toolchain.require(Tool::BdSup2Sub)?;
        log::debug!("Using java binary '{}'", java.display());

        let version = run_captured(
            Command::new(&java)
                .arg("-jar")
                .arg(&jar)
                .arg("--version"),
        )?;
        let banner = [version.stdout.trim(), version.stderr.trim()]
            .into_iter()
            .find(|text| !text.is_empty())
            .unwrap_or("BDSup2Sub")
            .to_string();
        if !version.success() {
            log::debug!("Converter version query failed: {}", version.stderr.trim());
        }

        let mut header = vec![banner];
        header.extend(CONVERTER_CREDITS.iter().map(|line| line.to_string()));

        Ok(Self {
            java,
            jar,
            live_window,
            cancellation: None,
            header: Mutex::new(header),
        })
    }

    /// Observe `token` while converter output is streaming.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The current live-window header: version banner, project links, and
    /// one line per file converted so far.
    pub fn header(&self) -> Vec<String> {
        self.header
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Convert the stream named by `job` into an event list inside a new
    /// directory under `subtitles_dir`.
    ///
    /// # Errors
    ///
    /// - [`Sub2SrtError::NotFound`] if the input stream does not exist.
    /// - [`Sub2SrtError::Conversion`] if the converter fails or leaves no
    ///   event list behind.
    /// - [`Sub2SrtError::Interrupted`] if cancelled while converting.
    pub fn convert(&self, job: &JobItem, subtitles_dir: &Path) -> Result<JobItem, Sub2SrtError> {
        let input = job.input_path();
        if !input.is_file() {
            return Err(Sub2SrtError::not_found(input, "subtitle stream does not exist"));
        }

        fs::create_dir_all(subtitles_dir)?;
        let job_dir = tempfile::Builder::new()
            .prefix("subtitles-")
            .tempdir_in(subtitles_dir)?
            .keep();
        let output = job_dir.join(event_list_name(input));

        log::info!("Converting {} to an XML event list", input.display());
        let mut command = Command::new(&self.java);
        command
            .arg("-jar")
            .arg(&self.jar)
            .arg("-o")
            .arg(&output)
            .arg(input);

        let header = self.push_header(format!(" - Converting SUP File: '{}'", file_name(input)));
        let result = match self.live_window {
            Some(height) => {
                let window = LiveWindow::new(height).with_header(header);
                run_with_live_window(&mut command, &window, self.cancellation.as_ref())
            }
            None => run_captured(&mut command)?
                .check()
                .map(|_| ())
                .map_err(Sub2SrtError::from),
        };

        result.map_err(|error| match error {
            Sub2SrtError::Process(failure) => Sub2SrtError::Conversion {
                input: input.to_path_buf(),
                reason: failure.to_string(),
            },
            other => other,
        })?;

        if !output.is_file() {
            log::error!("File not found: '{}'", output.display());
            return Err(Sub2SrtError::Conversion {
                input: input.to_path_buf(),
                reason: format!("converter produced no event list at {}", output.display()),
            });
        }

        log::info!("Finished converting {}", input.display());
        Ok(job.successor(output))
    }

    fn push_header(&self, line: String) -> Vec<String> {
        let mut header = self
            .header
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        header.push(line);
        header.clone()
    }
}

/// The event-list file name for a stream: its file name with the
/// extension replaced.
pub fn event_list_name(input: &Path) -> PathBuf {
    Path::new(&file_name(input)).with_extension(EVENT_LIST_EXTENSION)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subtitles".to_string())
}
