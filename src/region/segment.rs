//! The segment kinds a region is built from.

use std::{cell::Cell, rc::Rc};

use crate::{
    format::FixedFormat,
    output::{Labelled, Offset},
    postprocess::PostProcessEntry,
    region::layout::{Layout, PendingField},
    resolve::Resolvable,
    Result,
};

/// One write performed during the traversal of a region tree.
///
/// Segments are emitted through `&self` so that a tree can be flattened more than once.
pub(crate) trait Segment {
    /// Writes the segment at the current end of the layout's sink.
    fn emit(&self, layout: &mut Layout) -> Result<()>;
}

/// Bytes encoded when the segment was written.
pub(crate) struct Direct {
    pub(crate) bytes: Vec<u8>,
    pub(crate) value: Labelled<String>,
}

impl Segment for Direct {
    fn emit(&self, layout: &mut Layout) -> Result<()> {
        layout
            .sink()
            .borrow_mut()
            .append(&self.bytes, self.value.clone());
        Ok(())
    }
}

/// A fixed-width field whose value may still be unknown.
pub(crate) struct Deferred<F: FixedFormat> {
    pub(crate) format: F,
    pub(crate) value: Resolvable<F::Value>,
    pub(crate) label: Option<String>,
}

impl<F: FixedFormat> Segment for Deferred<F> {
    fn emit(&self, layout: &mut Layout) -> Result<()> {
        let sink = Rc::clone(layout.sink());
        let offset = sink.borrow().write_offset();
        let label = self.label.as_deref();

        if let Some(value) = self.value.value() {
            let bytes = self.format.encode(&value)?;
            sink.borrow_mut()
                .append(&bytes, self.format.describe(Some(&value), label));
            return Ok(());
        }

        sink.borrow_mut()
            .append(&self.format.placeholder(), self.format.describe(None, label));

        let patched = Rc::new(Cell::new(false));
        let format = self.format.clone();
        let patch_label = self.label.clone();
        let flag = Rc::clone(&patched);
        let subscription = self.value.queue(move |value| {
            let bytes = format.encode(value)?;
            sink.borrow_mut().overwrite(
                offset,
                &bytes,
                format.describe(Some(value), patch_label.as_deref()),
            )?;
            flag.set(true);
            Ok(())
        });

        let value = self.value.clone();
        layout.push_cleanup(move || {
            value.unsubscribe(subscription);
        });
        layout.push_field(PendingField {
            offset,
            width: self.format.width(),
            label: self.label.clone(),
            patched,
        });
        Ok(())
    }
}

/// Captures the write offset at its position in the traversal.
pub(crate) struct Marker {
    pub(crate) marker: Resolvable<Offset>,
}

impl Segment for Marker {
    fn emit(&self, layout: &mut Layout) -> Result<()> {
        let offset = layout.sink().borrow().write_offset();
        self.marker.settle_or_confirm(offset)
    }
}

/// Queues a post-processing entry in traversal order.
pub(crate) struct PostProcess {
    pub(crate) entry: PostProcessEntry,
}

impl Segment for PostProcess {
    fn emit(&self, layout: &mut Layout) -> Result<()> {
        layout.push_entry(self.entry.clone());
        Ok(())
    }
}
