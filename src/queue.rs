//! Job items and the bounded queues that connect pipeline stages.
//!
//! Each stage boundary is a [`BoundedQueue`] of [`JobItem`]s. Producers
//! block when the queue is full and consumers block when it is empty; once
//! every [`JobSender`] has been dropped and the queue is empty, the
//! consumer's iterator ends, which is how a stage learns its upstream has
//! finished.
//!
//! # Example
//!
//! ```
//! use sub2srt::{BoundedQueue, JobItem};
//!
//! let queue = BoundedQueue::new("to_convert", 2);
//! let (sender, receiver) = queue.split();
//!
//! sender.publish(JobItem::new("/tmp/work/tracks/movie.2.eng.sup", "/videos"))?;
//! drop(sender);
//!
//! let drained: Vec<JobItem> = receiver.iter().collect();
//! assert_eq!(drained.len(), 1);
//! # Ok::<(), sub2srt::Sub2SrtError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::error::Sub2SrtError;

/// Capacity of each stage boundary.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// A unit of work handed from one stage to the next.
///
/// Immutable once published; consumed exactly once by the next stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobItem {
    input_path: PathBuf,
    output_dir: PathBuf,
}

impl JobItem {
    /// A job reading `input_path` whose final artifacts go to `output_dir`.
    pub fn new(input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Artifact produced by the previous stage (or the user's source).
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Where the final caption file should be written.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The successor job for a stage artifact, keeping the output directory.
    pub fn successor(&self, input_path: impl Into<PathBuf>) -> Self {
        Self::new(input_path, self.output_dir.clone())
    }
}

impl Display for JobItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.input_path.display())
    }
}

/// A FIFO channel of jobs with a fixed capacity.
#[derive(Debug)]
pub struct BoundedQueue {
    name: &'static str,
    sender: Sender<JobItem>,
    receiver: Receiver<JobItem>,
}

impl BoundedQueue {
    /// Create a queue holding at most `capacity` outstanding jobs
    /// (at least one).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            name,
            sender,
            receiver,
        }
    }

    /// Queue name, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Split into the producer and consumer halves.
    pub fn split(self) -> (JobSender, JobReceiver) {
        (
            JobSender {
                name: self.name,
                sender: self.sender,
            },
            JobReceiver {
                name: self.name,
                receiver: self.receiver,
            },
        )
    }
}

/// Producer half of a [`BoundedQueue`]. Cloneable; the queue closes when
/// the last clone is dropped.
#[derive(Debug, Clone)]
pub struct JobSender {
    name: &'static str,
    sender: Sender<JobItem>,
}

impl JobSender {
    /// Publish a job, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// [`Sub2SrtError::Cancelled`] if the consumer has gone away.
    pub fn publish(&self, job: JobItem) -> Result<(), Sub2SrtError> {
        log::debug!("Queue {}: publishing {job}", self.name);
        self.sender.send(job).map_err(|_| Sub2SrtError::Cancelled)
    }

    /// Publish a job, waiting at most `timeout` for space.
    ///
    /// Returns the job back when the queue stayed full.
    ///
    /// # Errors
    ///
    /// [`Sub2SrtError::Cancelled`] if the consumer has gone away.
    pub fn publish_timeout(
        &self,
        job: JobItem,
        timeout: Duration,
    ) -> Result<Option<JobItem>, Sub2SrtError> {
        match self.sender.send_timeout(job, timeout) {
            Ok(()) => Ok(None),
            Err(SendTimeoutError::Timeout(job)) => Ok(Some(job)),
            Err(SendTimeoutError::Disconnected(_)) => Err(Sub2SrtError::Cancelled),
        }
    }

    /// Number of jobs waiting in the queue.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    /// Returns `true` if no jobs are waiting.
    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

/// Consumer half of a [`BoundedQueue`].
#[derive(Debug)]
pub struct JobReceiver {
    name: &'static str,
    receiver: Receiver<JobItem>,
}

impl JobReceiver {
    /// Block until a job arrives; `None` once the queue is drained.
    pub fn next_job(&self) -> Option<JobItem> {
        self.receiver.recv().ok()
    }

    /// Wait at most `timeout` for a job.
    ///
    /// `Ok(None)` on timeout, `Err(())` once the queue is drained.
    pub(crate) fn next_job_timeout(&self, timeout: Duration) -> Result<Option<JobItem>, ()> {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => Ok(Some(job)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(()),
        }
    }

    /// Blocking iterator that ends once the queue is drained.
    pub fn iter(&self) -> impl Iterator<Item = JobItem> + '_ {
        self.receiver.iter()
    }

    /// Queue name, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of jobs waiting in the queue.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if no jobs are waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
