//! The live result of traversing a region tree, and its finalization.
//!
//! A [`Layout`] owns everything a traversal left behind: the patch subscriptions of deferred
//! fields that were still unresolved, and the queued post-processing entries. The bytes are
//! already in the sink. Values may keep resolving while the layout is alive, patching the
//! sink in place. [`Layout::finalize`] then runs post-processing, checks for unresolved
//! fields and removes every remaining subscription.
//!
//! Dropping a layout without finalizing it also removes the subscriptions, so a tree that
//! failed halfway through traversal never patches a sink later.

use std::{cell::Cell, fmt, rc::Rc};

use crate::{
    error::UnresolvedField,
    output::{DiagnosticView, Offset, SharedSink},
    postprocess::PostProcessEntry,
    region::config::{Checkpoint, FlattenConfig, FlattenObserver, NoopObserver, TracingObserver},
    Error, Result,
};

type Cleanup = Box<dyn FnOnce()>;

/// A deferred field written as a placeholder.
pub(crate) struct PendingField {
    pub(crate) offset: Offset,
    pub(crate) width: usize,
    pub(crate) label: Option<String>,
    pub(crate) patched: Rc<Cell<bool>>,
}

impl PendingField {
    fn report(&self) -> UnresolvedField {
        UnresolvedField {
            offset: self.offset,
            width: self.width,
            label: self.label.clone(),
        }
    }
}

/// Outcome of a successful finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenSummary {
    /// Size of the sink after finalization
    pub size: usize,
    /// Deferred fields written as placeholders during traversal
    pub deferred_fields: usize,
    /// Placeholders never patched, only non-empty when complete output is not enforced
    pub unresolved: Vec<UnresolvedField>,
    /// Post-processing entries that ran
    pub post_processed: usize,
    /// Post-processing entries skipped for unresolved bounds or unpatched fields in range
    pub skipped_post_processing: usize,
}

impl FlattenSummary {
    /// Returns `true` if every field and every post-processing entry was resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.skipped_post_processing == 0
    }
}

/// A traversed region tree whose pending fields are still being patched.
pub struct Layout {
    sink: SharedSink,
    fields: Vec<PendingField>,
    entries: Vec<PostProcessEntry>,
    cleanups: Vec<Cleanup>,
}

impl Layout {
    pub(crate) fn new(sink: SharedSink) -> Self {
        Self {
            sink,
            fields: Vec::new(),
            entries: Vec::new(),
            cleanups: Vec::new(),
        }
    }

    pub(crate) fn sink(&self) -> &SharedSink {
        &self.sink
    }

    pub(crate) fn push_field(&mut self, field: PendingField) {
        self.fields.push(field);
    }

    pub(crate) fn push_entry(&mut self, entry: PostProcessEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn push_cleanup<F: FnOnce() + 'static>(&mut self, cleanup: F) {
        self.cleanups.push(Box::new(cleanup));
    }

    /// Deferred fields that still hold their placeholder.
    #[must_use]
    pub fn pending_fields(&self) -> Vec<UnresolvedField> {
        self.fields
            .iter()
            .filter(|field| !field.patched.get())
            .map(PendingField::report)
            .collect()
    }

    /// Current size of the sink.
    #[must_use]
    pub fn size(&self) -> usize {
        self.sink.borrow().write_offset()
    }

    /// Renders the sink as it currently stands.
    #[must_use]
    pub fn diagnostic_view(&self) -> DiagnosticView {
        self.sink.borrow().diagnostic_view()
    }

    /// Runs post-processing, checks completeness and releases all subscriptions.
    ///
    /// With [`FlattenConfig::trace_checkpoints`] set, checkpoints are reported through
    /// [`TracingObserver`].
    ///
    /// # Errors
    ///
    /// - [`Error::PostProcessingRange`] for entries with unresolved bounds, if complete
    ///   output is enforced
    /// - [`Error::Unresolved`] listing every unpatched field, if complete output is enforced
    /// - Any error raised by a post-processing derivation or the patches it triggers
    ///
    /// Entries whose range still holds an unpatched placeholder are skipped in either mode;
    /// strict finalization already reports those fields through [`Error::Unresolved`].
    ///
    /// Several failures are reported together as [`Error::Aggregate`].
    pub fn finalize(self, config: &FlattenConfig) -> Result<FlattenSummary> {
        if config.trace_checkpoints {
            self.finalize_observed(config, &mut TracingObserver)
        } else {
            self.finalize_observed(config, &mut NoopObserver)
        }
    }

    /// Like [`Layout::finalize`], reporting checkpoints to `observer`.
    ///
    /// # Errors
    ///
    /// See [`Layout::finalize`].
    pub fn finalize_observed(
        mut self,
        config: &FlattenConfig,
        observer: &mut dyn FlattenObserver,
    ) -> Result<FlattenSummary> {
        let mut errors = Vec::new();

        let (applied, skipped) = self.post_process(config.enforce_complete, &mut errors);
        observer.checkpoint(
            &Checkpoint::PostProcessed { applied, skipped },
            &*self.sink.borrow(),
        );

        let unresolved = self.pending_fields();
        if !unresolved.is_empty() {
            tracing::debug!(count = unresolved.len(), "unresolved fields at finalization");
            if config.enforce_complete {
                errors.push(Error::Unresolved(unresolved.clone()));
            }
        }

        let size = self.size();
        observer.checkpoint(
            &Checkpoint::Finalized {
                size,
                unresolved: unresolved.len(),
            },
            &*self.sink.borrow(),
        );
        self.release();

        if let Some(error) = Error::from_many(errors) {
            return Err(error);
        }

        Ok(FlattenSummary {
            size,
            deferred_fields: self.fields.len(),
            unresolved,
            post_processed: applied,
            skipped_post_processing: skipped,
        })
    }

    fn post_process(&self, enforce_complete: bool, errors: &mut Vec<Error>) -> (usize, usize) {
        let mut applied = 0;
        let mut skipped = 0;

        for (index, entry) in self.entries.iter().enumerate() {
            match entry.bounds() {
                (Some(start), Some(end)) if self.covers_pending(start, end) => {
                    // Results resolve once and never over placeholders
                    skipped += 1;
                    tracing::debug!(index, start, end, "skipping post-processing entry over unresolved fields");
                }
                (Some(start), Some(end)) => {
                    let bytes = self.sink.borrow().read_range(start, end);
                    match bytes.and_then(|bytes| entry.apply(&bytes)) {
                        Ok(()) => applied += 1,
                        Err(error) => errors.push(error),
                    }
                }
                (start, end) => {
                    skipped += 1;
                    if enforce_complete {
                        errors.push(Error::PostProcessingRange { index, start, end });
                    } else {
                        tracing::debug!(index, "skipping post-processing entry with unresolved bounds");
                    }
                }
            }
        }

        (applied, skipped)
    }

    fn covers_pending(&self, start: Offset, end: Offset) -> bool {
        self.fields.iter().any(|field| {
            !field.patched.get() && field.offset < end && start < field.offset + field.width
        })
    }

    fn release(&mut self) {
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
    }
}

impl Drop for Layout {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("size", &self.size())
            .field("deferred_fields", &self.fields.len())
            .field("post_processing", &self.entries.len())
            .finish_non_exhaustive()
    }
}
