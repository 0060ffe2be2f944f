//! Flattening configuration and checkpoint observers.
//!
//! [`FlattenConfig`] decides whether unresolved fields are an error, and whether the
//! bundled [`TracingObserver`] reports checkpoints. Custom observers implement
//! [`FlattenObserver`] and are passed to the `*_observed` variants of the flatten calls.

use crate::output::{Offset, OutputSink};

/// Configuration for flattening a region tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenConfig {
    /// Fail finalization if any deferred field or post-processing bound is unresolved.
    /// When disabled unresolved fields keep their zero placeholder and render as pending
    pub enforce_complete: bool,

    /// Report checkpoints through `tracing` when no explicit observer is supplied
    pub trace_checkpoints: bool,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl FlattenConfig {
    /// Creates the configuration for production images
    ///
    /// Every deferred field must be resolved by finalization.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            enforce_complete: true,
            trace_checkpoints: false,
        }
    }

    /// Creates a configuration for inspecting partial builds
    ///
    /// Unresolved fields are tolerated and every checkpoint is traced.
    #[must_use]
    pub fn diagnostic() -> Self {
        Self {
            enforce_complete: false,
            trace_checkpoints: true,
        }
    }

    /// Creates a configuration that tolerates unresolved fields without tracing
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            enforce_complete: false,
            trace_checkpoints: false,
        }
    }
}

/// A well-defined point of the flattening process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// A top-level segment has been written to the sink
    Segment {
        /// Position of the segment in the top-level region
        index: usize,
        /// Write offset after the segment
        offset: Offset,
    },
    /// All post-processing entries have run
    PostProcessed {
        /// Entries that ran
        applied: usize,
        /// Entries skipped because a bound was unresolved
        skipped: usize,
    },
    /// Finalization completed its checks
    Finalized {
        /// Final image size
        size: usize,
        /// Deferred fields still holding a placeholder
        unresolved: usize,
    },
}

/// Receives checkpoints during flattening.
///
/// Observers see the sink read-only; they cannot influence bytes or resolution order.
pub trait FlattenObserver {
    /// Called at each checkpoint.
    fn checkpoint(&mut self, checkpoint: &Checkpoint, sink: &dyn OutputSink);
}

/// Observer that ignores every checkpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FlattenObserver for NoopObserver {
    fn checkpoint(&mut self, _checkpoint: &Checkpoint, _sink: &dyn OutputSink) {}
}

/// Observer that forwards checkpoints to `tracing`.
///
/// Segment checkpoints are emitted at `trace` level, the others at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FlattenObserver for TracingObserver {
    fn checkpoint(&mut self, checkpoint: &Checkpoint, sink: &dyn OutputSink) {
        match *checkpoint {
            Checkpoint::Segment { index, offset } => {
                tracing::trace!(index, offset, "flattened segment");
            }
            Checkpoint::PostProcessed { applied, skipped } => {
                tracing::debug!(applied, skipped, "post-processing complete");
            }
            Checkpoint::Finalized { size, unresolved } => {
                let pending = sink.diagnostic_view().pending().count();
                tracing::debug!(size, unresolved, pending, "finalized layout");
            }
        }
    }
}
