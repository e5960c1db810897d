//! Parallel cue recognition.
//!
//! Cues of one event list are independent once it has been parsed, so with
//! the `rayon` feature enabled [`recognize_parallel`] spreads them across the
//! rayon thread pool. Results are collected in cue order, so caption blocks
//! are written in the same order as the sequential path writes them.
//!
//! The public API is exposed through
//! [`CaptionRecognizer::process`](crate::CaptionRecognizer::process); this
//! module contains only the internal implementation.

use std::sync::Mutex;

use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::Sub2SrtError;
use crate::progress::ProgressTracker;
use crate::recognize::{CaptionRecognizer, PlannedCue};

/// Recognise `cues` on the rayon pool, returning their texts in input
/// order.
///
/// The first failure (or an observed cancellation) is returned; cues
/// already running on other workers finish but their results are dropped.
pub(crate) fn recognize_parallel(
    recognizer: &CaptionRecognizer,
    cues: &[PlannedCue],
    tracker: &Mutex<ProgressTracker>,
) -> Result<Vec<String>, Sub2SrtError> {
    if cues.is_empty() {
        return Ok(Vec::new());
    }

    cues.par_iter()
        .map(|cue| {
            if recognizer.options().is_cancelled() {
                return Err(Sub2SrtError::Cancelled);
            }
            let text = recognizer.recognize_cue(cue)?;
            tracker
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .advance();
            Ok(text)
        })
        .collect()
}
