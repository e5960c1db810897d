//! External process execution.
//!
//! Two ways to run a tool are provided:
//!
//! - [`run_captured`] waits for the process and hands back its exit code,
//!   stdout and stderr for programmatic use.
//! - [`run_with_live_window`] streams the combined stdout/stderr into a
//!   fixed-height scrolling region of the terminal, repainting a header and
//!   the last `height` lines on every new line. It is for progress display
//!   only; nothing it prints can be captured by the caller.
//!
//! # Example
//!
//! ```no_run
//! use std::process::Command;
//!
//! use sub2srt::process::{LiveWindow, run_captured, run_with_live_window};
//!
//! let output = run_captured(Command::new("mkvinfo").arg("movie.mkv"))?;
//! println!("{} lines of track info", output.stdout.lines().count());
//!
//! let window = LiveWindow::new(10).with_header(vec!["Extracting".to_string()]);
//! run_with_live_window(
//!     Command::new("mkvextract").args(["movie.mkv", "tracks", "2:subs.sup"]),
//!     &window,
//!     None,
//! )?;
//! # Ok::<(), sub2srt::Sub2SrtError>(())
//! ```

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::error::{ProcessFailure, Sub2SrtError};
use crate::progress::CancellationToken;

const CLEAR_SCREEN: &str = "\x1b[2J";
const CURSOR_HOME: &str = "\x1b[H";
const CLEAR_LINE: &str = "\x1b[K";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Number of trailing output lines kept for error reports.
const FAILURE_TAIL_LINES: usize = 20;

/// Serialises terminal ownership between concurrently running stages.
static TERMINAL: Mutex<()> = Mutex::new(());

/// Result of a [`run_captured`] invocation.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// The command line, rendered for display.
    pub command: String,
    /// Exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Everything written to stdout, lossily decoded as UTF-8.
    pub stdout: String,
    /// Everything written to stderr, lossily decoded as UTF-8.
    pub stderr: String,
}

impl CapturedOutput {
    /// Returns `true` if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into a [`ProcessFailure`].
    pub fn check(self) -> Result<Self, ProcessFailure> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProcessFailure {
                command: self.command,
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Render a command line for logs and error messages.
pub fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `command` to completion, capturing its output.
///
/// A non-zero exit is **not** an error here; inspect
/// [`CapturedOutput::exit_code`] or call [`CapturedOutput::check`].
///
/// # Errors
///
/// [`Sub2SrtError::Process`] if the process cannot be started.
pub fn run_captured(command: &mut Command) -> Result<CapturedOutput, Sub2SrtError> {
    let rendered = describe(command);
    log::debug!("Running: {rendered}");

    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|error| ProcessFailure {
            command: rendered.clone(),
            exit_code: None,
            stderr: error.to_string(),
        })?;

    Ok(CapturedOutput {
        command: rendered,
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Layout of the scrolling terminal region used by [`run_with_live_window`].
#[derive(Debug, Clone)]
pub struct LiveWindow {
    height: usize,
    width: usize,
    header: Vec<String>,
}

impl LiveWindow {
    /// A window showing the last `height` lines (at least one).
    pub fn new(height: usize) -> Self {
        Self {
            height: height.max(1),
            width: 80,
            header: Vec::new(),
        }
    }

    /// Lines printed above the scrolling region, framed by banners.
    #[must_use]
    pub fn with_header(mut self, header: Vec<String>) -> Self {
        self.header = header;
        self
    }

    /// Width of the header banners.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Number of output lines kept on screen.
    pub fn height(&self) -> usize {
        self.height
    }
}

/// Bounded ring of the most recent output lines.
#[derive(Debug)]
pub(crate) struct ScrollBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl ScrollBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub(crate) fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Repaint the window: cursor home, header, then the buffered lines.
    pub(crate) fn render<W: Write>(&self, window: &LiveWindow, out: &mut W) -> std::io::Result<()> {
        write!(out, "{CURSOR_HOME}")?;
        if !window.header.is_empty() {
            let banner = "-".repeat(window.width);
            writeln!(out, "{banner}{CLEAR_LINE}")?;
            for line in &window.header {
                writeln!(out, "{line}{CLEAR_LINE}")?;
            }
            writeln!(out, "{banner}{CLEAR_LINE}")?;
            writeln!(out, "{CLEAR_LINE}")?;
        }
        for line in &self.lines {
            writeln!(out, "{line}{CLEAR_LINE}")?;
        }
        out.flush()
    }
}

/// Run `command`, streaming its combined output into a scrolling window on
/// stderr.
///
/// When `cancellation` fires while the process is running, the child is
/// killed and reaped before [`Sub2SrtError::Interrupted`] is returned.
///
/// # Errors
///
/// - [`Sub2SrtError::Process`] if the process cannot start or exits
///   non-zero; the failure carries the tail of the streamed output.
/// - [`Sub2SrtError::Interrupted`] on cancellation.
pub fn run_with_live_window(
    command: &mut Command,
    window: &LiveWindow,
    cancellation: Option<&CancellationToken>,
) -> Result<(), Sub2SrtError> {
    let _terminal = TERMINAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    run_with_live_window_into(command, window, cancellation, &mut out)
}

/// [`run_with_live_window`] painting into an arbitrary writer.
pub fn run_with_live_window_into<W: Write>(
    command: &mut Command,
    window: &LiveWindow,
    cancellation: Option<&CancellationToken>,
    out: &mut W,
) -> Result<(), Sub2SrtError> {
    let rendered = describe(command);
    log::debug!("Running with live window: {rendered}");

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| ProcessFailure {
            command: rendered.clone(),
            exit_code: None,
            stderr: error.to_string(),
        })?;

    let (sender, receiver) = crossbeam_channel::unbounded::<String>();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        let sender = sender.clone();
        readers.push(thread::spawn(move || forward_lines(stdout, sender)));
    }
    if let Some(stderr) = child.stderr.take() {
        let sender = sender.clone();
        readers.push(thread::spawn(move || forward_lines(stderr, sender)));
    }
    drop(sender);

    let mut screen = ScrollBuffer::new(window.height);
    let mut tail = ScrollBuffer::new(FAILURE_TAIL_LINES);
    write!(out, "{CLEAR_SCREEN}")?;

    loop {
        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            log::warn!("Interrupt received, terminating `{rendered}`");
            let _ = child.kill();
            let _ = child.wait();
            return Err(Sub2SrtError::Interrupted { command: rendered });
        }

        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                screen.push(line.clone());
                tail.push(line);
                screen.render(window, out)?;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for reader in readers {
        let _ = reader.join();
    }
    let status = child.wait()?;

    if status.success() {
        Ok(())
    } else {
        Err(ProcessFailure {
            command: rendered,
            exit_code: status.code(),
            stderr: tail.lines().collect::<Vec<_>>().join("\n"),
        }
        .into())
    }
}

/// Forward every line of `stream` to `sender`, treating carriage returns as
/// line breaks so in-place progress counters scroll like ordinary lines.
fn forward_lines<R: Read>(stream: R, sender: Sender<String>) {
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                for segment in buffer.split(|&byte| byte == b'\r' || byte == b'\n') {
                    if segment.is_empty() {
                        continue;
                    }
                    let line = String::from_utf8_lossy(segment).into_owned();
                    if sender.send(line).is_err() {
                        return;
                    }
                }
            }
        }
    }
}
