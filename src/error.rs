use std::path::PathBuf;
use std::time::Duration;

use crate::playlist::EntryId;

pub type PlaylistResult<T> = std::result::Result<T, PlaylistError>;

/// Data-integrity failures surfaced to playlist callers. None of them leave a
/// partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaylistError {
    #[error("path is already in the playlist: {}", .0.display())]
    DuplicatePath(PathBuf),
    #[error("no playlist entry with id {0}")]
    NotFound(EntryId),
    #[error("nothing to undo")]
    EmptyStack,
}

/// Numeric and timing problems in the analysis path. These are absorbed
/// (logged and counted), never returned as errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anomaly {
    /// NaN or infinite samples were replaced with silence before the transform.
    NonFiniteInput { count: usize },
    /// A tick overran its budget and its frame was dropped.
    DeadlineMiss {
        tick: u64,
        elapsed: Duration,
        budget: Duration,
    },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anomaly::NonFiniteInput { count } => {
                write!(f, "{} non-finite samples clamped to zero", count)
            }
            Anomaly::DeadlineMiss {
                tick,
                elapsed,
                budget,
            } => write!(
                f,
                "tick {} took {:.2}ms (budget {:.2}ms), frame dropped",
                tick,
                elapsed.as_secs_f64() * 1000.0,
                budget.as_secs_f64() * 1000.0
            ),
        }
    }
}
