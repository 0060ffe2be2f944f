//! Output sinks that receive the flattened image.
//!
//! A sink is the byte buffer a [`crate::Region`] tree is flattened into. The engine only ever
//! appends at the end, patches previously written bytes in place when deferred values resolve,
//! and reads back byte ranges for post-processing.
//!
//! # Key Components
//!
//! - [`OutputSink`] - The contract the encoder relies on
//! - [`ImageBuffer`] - In-memory sink with a parallel diagnostic rendering
//! - [`ImageFile`] - Memory-mapped output file that is removed unless finalized
//! - [`DiagnosticView`] / [`DiagnosticRow`] / [`Labelled`] - Offset-indexed field rendering
//!
//! # Patching Contract
//!
//! [`OutputSink::overwrite`] always replaces exactly as many bytes as it is given, at an
//! offset that was already written. It never changes the total length, so the layout
//! computed during traversal stays valid no matter when values resolve.

mod buffer;
mod diagnostic;
mod file;

pub use buffer::ImageBuffer;
pub use diagnostic::{DiagnosticRow, DiagnosticView, Labelled};
pub use file::ImageFile;

use std::{cell::RefCell, rc::Rc};

use crate::Result;

/// Byte offset within an image.
pub type Offset = usize;

/// Shared, type-erased sink handle held by pending patches.
pub type SharedSink = Rc<RefCell<dyn OutputSink>>;

/// Byte buffer with append, in-place patching and a parallel diagnostic view.
///
/// Implementations are supplied by the embedder; [`ImageBuffer`] is the stock in-memory one.
pub trait OutputSink {
    /// Current length of the output, which is also the next write offset.
    fn write_offset(&self) -> Offset;

    /// Appends `bytes` at the end and records their diagnostic rendering.
    fn append(&mut self, bytes: &[u8], value: Labelled<String>);

    /// Replaces previously written bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range was not written yet.
    fn overwrite(&mut self, offset: Offset, bytes: &[u8], value: Labelled<String>) -> Result<()>;

    /// Copies the bytes in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range is inverted or not written yet.
    fn read_range(&self, start: Offset, end: Offset) -> Result<Vec<u8>>;

    /// Copies the complete output.
    fn to_bytes(&self) -> Vec<u8>;

    /// Renders every field written so far.
    fn diagnostic_view(&self) -> DiagnosticView;
}
