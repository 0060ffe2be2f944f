//! Binary regions: append-only segment lists that flatten into a sink.
//!
//! A [`Region`] records writes in program order without needing their values yet. Each write
//! becomes a segment: bytes that are known now, a fixed-width field whose value is a
//! [`Resolvable`], a marker capturing the offset at that point, a nested region, or a
//! post-processing registration. Flattening walks the tree in pre-order and produces the
//! linear image.
//!
//! # Key Components
//!
//! - [`Region`] - The segment list and its write operations
//! - [`Layout`] - A traversed tree whose placeholders are still being patched
//! - [`FlattenSummary`] - What finalization found
//! - [`FlattenConfig`] - Strict or tolerant finalization, checkpoint tracing
//! - [`FlattenObserver`] / [`Checkpoint`] / [`TracingObserver`] - Checkpoint reporting
//!
//! # Flattening
//!
//! 1. **Traversal**: every segment writes at the current end of the sink. Unresolved
//!    deferred fields write an all-zero placeholder of their width and subscribe a patch at
//!    that offset. Markers resolve to the write offset. Post-processing entries are queued.
//! 2. **Post-processing**: queued entries read their finished range and resolve their
//!    results, in traversal order. An entry whose range still holds a placeholder is
//!    skipped and its result stays unresolved.
//! 3. **Completion check**: with [`FlattenConfig::enforce_complete`], any placeholder still
//!    unpatched fails the build with one error listing every such field.
//! 4. **Cleanup**: all remaining patch subscriptions are dropped.
//!
//! [`Region::flatten`] does all four steps. [`Region::layout`] stops after the traversal and
//! returns a [`Layout`], so values may resolve after traversal and before
//! [`Layout::finalize`].
//!
//! # Nesting
//!
//! [`Region::write_region`] takes the child by value. Once embedded, a region can no longer be
//! written to, so the parent sees exactly the segments it was given.
//!
//! # Usage Examples
//!
//! ```rust
//! use snapforge::{format::{U16Le, U8}, FlattenConfig, ImageBuffer, Region, Resolvable};
//!
//! let target = Resolvable::<i64>::new();
//! let mut region = Region::new();
//! region.write_fixed(U8, 0x01, None)?;
//! region.write_fixed(U16Le, &target, Some("target"))?;
//! region.write_fixed(U8, 0x02, None)?;
//!
//! let sink = ImageBuffer::shared();
//! let layout = region.layout(&sink)?;
//! assert_eq!(sink.borrow().as_slice(), &[0x01, 0x00, 0x00, 0x02]);
//!
//! target.resolve(300)?;
//! layout.finalize(&FlattenConfig::strict())?;
//! assert_eq!(sink.borrow().as_slice(), &[0x01, 0x2C, 0x01, 0x02]);
//! # Ok::<(), snapforge::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! Regions hold [`Resolvable`] handles and are neither [`Send`] nor [`Sync`].

mod config;
mod layout;
mod segment;

pub use config::{Checkpoint, FlattenConfig, FlattenObserver, NoopObserver, TracingObserver};
pub use layout::{FlattenSummary, Layout};

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    format::{FieldFormat, FieldValue, FixedFormat, IntoFieldValue, RawBytes, Text},
    output::{DiagnosticView, ImageBuffer, Offset, OutputSink, SharedSink},
    postprocess::PostProcessEntry,
    resolve::Resolvable,
    Result,
};
use segment::{Deferred, Direct, Marker, PostProcess, Segment};

/// An ordered, append-only list of segments.
#[derive(Default)]
pub struct Region {
    segments: Vec<Box<dyn Segment>>,
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a fixed-width field whose value is either known or deferred.
    ///
    /// Known values are encoded immediately. Deferred values are written as a placeholder
    /// at flatten time unless they are resolved by then.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] if a known value does not fit `format`. The
    /// region is left unchanged. Deferred values that turn out not to fit fail the
    /// resolution that delivers them.
    pub fn write_fixed<F, V>(&mut self, format: F, value: V, label: Option<&str>) -> Result<()>
    where
        F: FixedFormat,
        V: IntoFieldValue<F::Value>,
    {
        match value.into_field_value() {
            FieldValue::Known(value) => self.write(format, &value, label),
            FieldValue::Deferred(value) => {
                self.push(Deferred {
                    format,
                    value,
                    label: label.map(str::to_string),
                });
                Ok(())
            }
        }
    }

    /// Writes a known value through any format, including variable-width ones.
    ///
    /// # Errors
    ///
    /// Returns the encoding error of `format`; the region is left unchanged.
    pub fn write<F: FieldFormat>(
        &mut self,
        format: F,
        value: &F::Value,
        label: Option<&str>,
    ) -> Result<()> {
        let bytes = format.encode(value)?;
        self.push(Direct {
            bytes,
            value: format.describe(Some(value), label),
        });
        Ok(())
    }

    /// Writes null-terminated UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidText`] if `text` contains a NUL character.
    pub fn write_text(&mut self, text: &str, label: Option<&str>) -> Result<()> {
        self.write(Text, &text.to_string(), label)
    }

    /// Writes a raw run of bytes.
    pub fn write_bytes(&mut self, bytes: &[u8], label: Option<&str>) {
        let bytes = bytes.to_vec();
        self.push(Direct {
            value: RawBytes.describe(Some(&bytes), label),
            bytes,
        });
    }

    /// Embeds `region` at the current position.
    pub fn write_region(&mut self, region: Region) {
        self.segments.push(Box::new(region));
    }

    /// Returns a marker that resolves to the offset of the next byte written.
    pub fn current_address(&mut self) -> Resolvable<Offset> {
        let marker = Resolvable::derived();
        self.push(Marker {
            marker: marker.clone(),
        });
        marker
    }

    /// Resolves `marker` to the offset of the next byte written.
    ///
    /// Unlike [`Region::current_address`] the marker can be created, and referenced by
    /// earlier writes, before its position is known. This is how forward jumps and forward
    /// table references are expressed.
    pub fn mark(&mut self, marker: &Resolvable<Offset>) {
        self.push(Marker {
            marker: marker.clone(),
        });
    }

    /// Registers a derivation over `[start, end)` that runs after traversal.
    ///
    /// The returned value resolves when post-processing runs; writing it as a deferred field
    /// anywhere in the tree patches the derived value into the image.
    pub fn post_process<T, D>(
        &mut self,
        start: &Resolvable<Offset>,
        end: &Resolvable<Offset>,
        derive: D,
    ) -> Resolvable<T>
    where
        T: Clone + fmt::Debug + PartialEq + 'static,
        D: Fn(&[u8]) -> T + 'static,
    {
        let (entry, result) = PostProcessEntry::new(start, end, derive);
        self.push(PostProcess { entry });
        result
    }

    /// Number of top-level segments. A nested region counts as one.
    #[must_use]
    pub fn len_segments(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Traverses the tree into `sink` and returns the live layout.
    ///
    /// # Errors
    ///
    /// Returns the first error raised during traversal, typically a marker resolution that
    /// triggered a failing patch. Subscriptions made so far are released.
    pub fn layout<S: OutputSink + 'static>(&self, sink: &Rc<RefCell<S>>) -> Result<Layout> {
        self.layout_observed(sink, &mut NoopObserver)
    }

    /// Like [`Region::layout`], reporting a checkpoint after each top-level segment.
    ///
    /// # Errors
    ///
    /// See [`Region::layout`].
    pub fn layout_observed<S: OutputSink + 'static>(
        &self,
        sink: &Rc<RefCell<S>>,
        observer: &mut dyn FlattenObserver,
    ) -> Result<Layout> {
        let shared: SharedSink = sink.clone();
        let mut layout = Layout::new(shared);
        tracing::debug!(
            segments = self.segments.len(),
            start = layout.size(),
            "flattening region"
        );

        for (index, segment) in self.segments.iter().enumerate() {
            segment.emit(&mut layout)?;

            let sink = layout.sink().borrow();
            observer.checkpoint(
                &Checkpoint::Segment {
                    index,
                    offset: sink.write_offset(),
                },
                &*sink,
            );
        }

        Ok(layout)
    }

    /// Traverses the tree into `sink` and finalizes it.
    ///
    /// # Errors
    ///
    /// Any traversal error, or the finalization errors of [`Layout::finalize`].
    pub fn flatten<S: OutputSink + 'static>(
        &self,
        sink: &Rc<RefCell<S>>,
        config: &FlattenConfig,
    ) -> Result<FlattenSummary> {
        if config.trace_checkpoints {
            self.flatten_observed(sink, config, &mut TracingObserver)
        } else {
            self.flatten_observed(sink, config, &mut NoopObserver)
        }
    }

    /// Like [`Region::flatten`], reporting checkpoints to `observer`.
    ///
    /// # Errors
    ///
    /// See [`Region::flatten`].
    pub fn flatten_observed<S: OutputSink + 'static>(
        &self,
        sink: &Rc<RefCell<S>>,
        config: &FlattenConfig,
        observer: &mut dyn FlattenObserver,
    ) -> Result<FlattenSummary> {
        let summary = self
            .layout_observed(sink, observer)?
            .finalize_observed(config, observer)?;
        tracing::debug!(
            size = summary.size,
            deferred = summary.deferred_fields,
            unresolved = summary.unresolved.len(),
            "flattened region"
        );
        Ok(summary)
    }

    /// Flattens into a fresh [`ImageBuffer`] and returns its bytes.
    ///
    /// # Errors
    ///
    /// See [`Region::flatten`].
    pub fn to_bytes(&self, config: &FlattenConfig) -> Result<Vec<u8>> {
        let sink = ImageBuffer::shared();
        self.flatten(&sink, config)?;
        let bytes = sink.borrow().to_bytes();
        Ok(bytes)
    }

    /// Renders the tree as it currently resolves, tolerating unresolved fields.
    ///
    /// # Errors
    ///
    /// Only traversal errors; unresolved fields render as pending.
    pub fn diagnostic_view(&self) -> Result<DiagnosticView> {
        let sink = ImageBuffer::shared();
        self.flatten(&sink, &FlattenConfig::quiet())?;
        let view = sink.borrow().diagnostic_view();
        Ok(view)
    }

    fn push<S: Segment + 'static>(&mut self, segment: S) {
        self.segments.push(Box::new(segment));
    }
}

impl Segment for Region {
    fn emit(&self, layout: &mut Layout) -> Result<()> {
        for segment in &self.segments {
            segment.emit(layout)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("segments", &self.segments.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::{I8, U16Le, U32Le, U8},
        postprocess::checksum,
        Error,
    };

    #[test]
    fn test_placeholder_then_reflatten() {
        let deferred = Resolvable::<i64>::new();
        let mut region = Region::new();
        region.write_fixed(U8, 0x01, None).unwrap();
        region.write_fixed(U16Le, &deferred, Some("pending")).unwrap();
        region.write_fixed(U8, 0x02, None).unwrap();

        let first = region.to_bytes(&FlattenConfig::quiet()).unwrap();
        assert_eq!(first, vec![0x01, 0x00, 0x00, 0x02]);

        deferred.resolve(300).unwrap();
        let second = region.to_bytes(&FlattenConfig::strict()).unwrap();
        assert_eq!(second, vec![0x01, 0x2C, 0x01, 0x02]);
    }

    #[test]
    fn test_out_of_range_leaves_region_unchanged() {
        let mut region = Region::new();
        let err = region.write_fixed(U8, 256, None).unwrap_err();
        assert!(matches!(err, Error::ValueOutOfRange { .. }));
        assert!(region.is_empty());
    }

    #[test]
    fn test_marker_resolves_to_write_offset() {
        let mut region = Region::new();
        region.write_bytes(&[0; 3], None);
        let here = region.current_address();
        region.write_fixed(U16Le, here.as_i64().unwrap(), Some("self")).unwrap();

        let bytes = region.to_bytes(&FlattenConfig::strict()).unwrap();
        assert_eq!(here.value(), Some(3));
        assert_eq!(bytes, vec![0, 0, 0, 3, 0]);
    }

    #[test]
    fn test_forward_marker() {
        let end = Resolvable::<Offset>::new();
        let mut region = Region::new();
        region
            .write_fixed(U32Le, end.as_i64().unwrap(), Some("size"))
            .unwrap();
        region.write_bytes(&[0xAA; 4], None);
        region.mark(&end);

        let bytes = region.to_bytes(&FlattenConfig::strict()).unwrap();
        assert_eq!(bytes[..4], [8, 0, 0, 0]);
    }

    #[test]
    fn test_marker_cannot_be_resolved_by_caller() {
        let mut region = Region::new();
        let marker = region.current_address();
        assert!(matches!(marker.resolve(0), Err(Error::DerivedResolve)));
    }

    #[test]
    fn test_nested_regions_flatten_in_pre_order() {
        let mut inner = Region::new();
        inner.write_bytes(&[2, 3], None);
        let inner_start = Resolvable::<Offset>::new();

        let mut outer = Region::new();
        outer.write_fixed(U8, 1, None).unwrap();
        outer.mark(&inner_start);
        outer.write_region(inner);
        outer.write_fixed(U8, 4, None).unwrap();

        assert_eq!(outer.len_segments(), 4);
        let bytes = outer.to_bytes(&FlattenConfig::strict()).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
        assert_eq!(inner_start.value(), Some(1));
    }

    #[test]
    fn test_post_process_over_marked_range() {
        let mut region = Region::new();
        region.write_fixed(U8, 0xFF, None).unwrap();
        let start = region.current_address();
        region.write_bytes(&[1, 2, 3, 4, 5], None);
        let end = region.current_address();
        let sum = region.post_process(&start, &end, checksum::sum8);

        let sink = ImageBuffer::shared();
        let summary = region.flatten(&sink, &FlattenConfig::strict()).unwrap();
        assert_eq!(sum.value(), Some(15));
        assert_eq!(summary.size, 6);
        assert_eq!(summary.post_processed, 1);
    }

    #[test]
    fn test_post_process_waits_for_fields_in_range() {
        let value = Resolvable::<i64>::new();
        let mut region = Region::new();
        let start = region.current_address();
        region.write_fixed(U8, &value, Some("late")).unwrap();
        region.write_fixed(U8, 3, None).unwrap();
        let end = region.current_address();
        let sum = region.post_process(&start, &end, checksum::sum8);

        let view = region.diagnostic_view().unwrap();
        assert_eq!(view.pending().count(), 1);
        assert_eq!(sum.value(), None);

        let summary = region
            .flatten(&ImageBuffer::shared(), &FlattenConfig::quiet())
            .unwrap();
        assert_eq!((summary.post_processed, summary.skipped_post_processing), (0, 1));
        assert_eq!(sum.value(), None);

        value.resolve(5).unwrap();
        let bytes = region.to_bytes(&FlattenConfig::strict()).unwrap();
        assert_eq!(bytes, vec![5, 3]);
        assert_eq!(sum.value(), Some(8));
    }

    #[test]
    fn test_post_process_ignores_placeholders_outside_range() {
        let mut region = Region::new();
        region
            .write_fixed(U16Le, Resolvable::<i64>::new(), Some("outside"))
            .unwrap();
        let start = region.current_address();
        region.write_bytes(&[1, 2], None);
        let end = region.current_address();
        let sum = region.post_process(&start, &end, checksum::sum8);

        let summary = region
            .flatten(&ImageBuffer::shared(), &FlattenConfig::quiet())
            .unwrap();
        assert_eq!(summary.post_processed, 1);
        assert_eq!(sum.value(), Some(3));
    }

    #[test]
    fn test_enforce_complete_reports_every_field() {
        let a = Resolvable::<i64>::new();
        let b = Resolvable::<i64>::new();
        let mut region = Region::new();
        region.write_fixed(U16Le, &a, Some("a")).unwrap();
        region.write_fixed(U8, 0, None).unwrap();
        region.write_fixed(U8, &b, Some("b")).unwrap();

        let sink = ImageBuffer::shared();
        let err = region.flatten(&sink, &FlattenConfig::strict()).unwrap_err();
        let fields = err.unresolved_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!((fields[0].offset, fields[0].width), (0, 2));
        assert_eq!(fields[1].label.as_deref(), Some("b"));
        assert_eq!(a.pending_subscribers(), 0);
        assert_eq!(b.pending_subscribers(), 0);

        for _ in 0..3 {
            let summary = region.flatten(&ImageBuffer::shared(), &FlattenConfig::quiet()).unwrap();
            assert_eq!(summary.unresolved.len(), 2);
            assert!(!summary.is_complete());
        }
        assert_eq!(a.pending_subscribers(), 0);
        assert_eq!(b.pending_subscribers(), 0);
    }

    #[test]
    fn test_unresolved_post_process_bounds() {
        let start = Resolvable::<Offset>::new();
        let mut region = Region::new();
        let end = region.current_address();
        let _sum = region.post_process(&start, &end, checksum::sum8);

        let err = region
            .flatten(&ImageBuffer::shared(), &FlattenConfig::strict())
            .unwrap_err();
        assert!(matches!(err, Error::PostProcessingRange { index: 0, start: None, end: Some(0) }));

        let summary = region
            .flatten(&ImageBuffer::shared(), &FlattenConfig::quiet())
            .unwrap();
        assert_eq!(summary.skipped_post_processing, 1);
    }

    #[test]
    fn test_late_out_of_range_fails_resolution() {
        let value = Resolvable::<i64>::new();
        let mut region = Region::new();
        region.write_fixed(I8, &value, None).unwrap();

        let sink = ImageBuffer::shared();
        let layout = region.layout(&sink).unwrap();
        assert!(matches!(value.resolve(200), Err(Error::ValueOutOfRange { .. })));
        assert_eq!(sink.borrow().as_slice(), &[0]);

        let err = layout.finalize(&FlattenConfig::strict()).unwrap_err();
        assert_eq!(err.unresolved_fields().len(), 1);
    }

    #[test]
    fn test_dropped_layout_stops_patching() {
        let value = Resolvable::<i64>::new();
        let mut region = Region::new();
        region.write_fixed(U8, &value, None).unwrap();

        let sink = ImageBuffer::shared();
        let layout = region.layout(&sink).unwrap();
        assert_eq!(value.pending_subscribers(), 1);
        drop(layout);

        assert_eq!(value.pending_subscribers(), 0);
        value.resolve(9).unwrap();
        assert_eq!(sink.borrow().as_slice(), &[0]);
    }

    #[test]
    fn test_flatten_observed_reports_top_level_checkpoints() {
        #[derive(Default)]
        struct Recorder(Vec<Checkpoint>);

        impl FlattenObserver for Recorder {
            fn checkpoint(&mut self, checkpoint: &Checkpoint, _sink: &dyn OutputSink) {
                self.0.push(*checkpoint);
            }
        }

        let mut inner = Region::new();
        inner.write_bytes(&[1, 2, 3], None);
        let mut region = Region::new();
        region.write_region(inner);
        region.write_fixed(U8, 4, None).unwrap();

        let mut recorder = Recorder::default();
        region
            .flatten_observed(&ImageBuffer::shared(), &FlattenConfig::strict(), &mut recorder)
            .unwrap();

        assert_eq!(
            recorder.0,
            vec![
                Checkpoint::Segment { index: 0, offset: 3 },
                Checkpoint::Segment { index: 1, offset: 4 },
                Checkpoint::PostProcessed { applied: 0, skipped: 0 },
                Checkpoint::Finalized { size: 4, unresolved: 0 },
            ]
        );
    }

    #[test]
    fn test_diagnostic_view_of_partial_build() {
        let mut region = Region::new();
        region.write_text("main", Some("name")).unwrap();
        region
            .write_fixed(U16Le, Resolvable::<i64>::new(), Some("entry"))
            .unwrap();

        let view = region.diagnostic_view().unwrap();
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[0].value.value.as_deref(), Some("\"main\""));
        let pending: Vec<_> = view.pending().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].offset, 5);
    }
}
