//! In-memory [`OutputSink`] implementation.

use std::{cell::RefCell, path::Path, rc::Rc};

use rustc_hash::FxHashMap;

use crate::{
    output::{DiagnosticRow, DiagnosticView, ImageFile, Labelled, Offset, OutputSink},
    Error, Result,
};

/// Growable in-memory image with one diagnostic row per written field.
///
/// # Examples
///
/// ```rust
/// use snapforge::{ImageBuffer, Labelled, OutputSink};
///
/// let mut buffer = ImageBuffer::new();
/// buffer.append(&[0x01], Labelled::known("1".to_string(), None));
/// buffer.append(&[0x00, 0x00], Labelled::pending(Some("size")));
/// buffer.overwrite(1, &[0x2C, 0x01], Labelled::known("300".to_string(), Some("size")))?;
///
/// assert_eq!(buffer.to_bytes(), vec![0x01, 0x2C, 0x01]);
/// assert_eq!(buffer.diagnostic_view().pending().count(), 0);
/// # Ok::<(), snapforge::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ImageBuffer {
    /// The image bytes
    data: Vec<u8>,
    /// Diagnostic rows in append order (ascending offsets)
    rows: Vec<DiagnosticRow>,
    /// Row index by field offset
    index: FxHashMap<Offset, usize>,
}

impl ImageBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer wrapped for sharing with pending patches.
    #[must_use]
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Borrows the image bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Length of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Writes the image to `path` through an [`ImageFile`].
    ///
    /// The file only survives if every byte was written and flushed; on failure it is removed.
    ///
    /// # Errors
    ///
    /// Returns the file creation, write or finalization error.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = ImageFile::create(path, self.data.len() as u64)?;
        file.write_at(0, &self.data)?;
        file.finalize()
    }

    fn check_range(&self, offset: Offset, len: usize) -> Result<()> {
        let in_bounds = offset
            .checked_add(len)
            .is_some_and(|end| end <= self.data.len());
        if in_bounds {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            })
        }
    }
}

impl OutputSink for ImageBuffer {
    fn write_offset(&self) -> Offset {
        self.data.len()
    }

    fn append(&mut self, bytes: &[u8], value: Labelled<String>) {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);

        // Zero-length runs would share an offset with the next field
        if bytes.is_empty() {
            return;
        }

        self.index.insert(offset, self.rows.len());
        self.rows.push(DiagnosticRow {
            offset,
            bytes: bytes.to_vec(),
            value,
        });
    }

    fn overwrite(&mut self, offset: Offset, bytes: &[u8], value: Labelled<String>) -> Result<()> {
        self.check_range(offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);

        if let Some(&row) = self.index.get(&offset) {
            let row = &mut self.rows[row];
            row.bytes = bytes.to_vec();
            row.value = value;
        }
        Ok(())
    }

    fn read_range(&self, start: Offset, end: Offset) -> Result<Vec<u8>> {
        if start > end {
            return Err(Error::OutOfBounds {
                offset: start,
                len: 0,
                size: self.data.len(),
            });
        }
        self.check_range(start, end - start)?;
        Ok(self.data[start..end].to_vec())
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    fn diagnostic_view(&self) -> DiagnosticView {
        DiagnosticView {
            rows: self.rows.clone(),
        }
    }
}
