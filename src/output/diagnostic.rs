//! Offset-indexed diagnostic rendering of an image.
//!
//! Every field written to a sink produces one [`DiagnosticRow`]: its offset, raw bytes, decoded
//! value and optional debug label. Fields whose value is still unresolved keep a zero
//! placeholder in the bytes and render as pending.

use std::fmt;

use crate::output::Offset;

/// A value (or its absence, pending resolution) paired with a human-readable tag.
///
/// Labels exist purely for diagnostics and never influence the binary output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Labelled<T> {
    /// The value, `None` while pending
    pub value: Option<T>,
    /// Optional debug label
    pub label: Option<String>,
}

impl<T> Labelled<T> {
    /// Creates a labelled value that is already known.
    pub fn known(value: T, label: Option<&str>) -> Self {
        Self {
            value: Some(value),
            label: label.map(str::to_string),
        }
    }

    /// Creates a labelled placeholder for a value that is not known yet.
    pub fn pending(label: Option<&str>) -> Self {
        Self {
            value: None,
            label: label.map(str::to_string),
        }
    }

    /// Returns `true` while the value is unknown.
    pub fn is_pending(&self) -> bool {
        self.value.is_none()
    }
}

/// One field of the diagnostic view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRow {
    /// Offset of the first byte of the field
    pub offset: Offset,
    /// Raw bytes as currently held by the sink
    pub bytes: Vec<u8>,
    /// Decoded value and label
    pub value: Labelled<String>,
}

/// Snapshot of all diagnostic rows of a sink, ordered by offset.
///
/// The [`fmt::Display`] implementation renders a plain table:
///
/// ```text
/// 0000  01        1
/// 0001  00 00     <pending>  jump target
/// 0003  02        2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiagnosticView {
    /// Rows in ascending offset order
    pub rows: Vec<DiagnosticRow>,
}

impl DiagnosticView {
    /// Returns the row starting at `offset`, if any.
    #[must_use]
    pub fn row_at(&self, offset: Offset) -> Option<&DiagnosticRow> {
        self.rows
            .binary_search_by_key(&offset, |row| row.offset)
            .ok()
            .map(|index| &self.rows[index])
    }

    /// Iterates over the rows whose value is still pending.
    pub fn pending(&self) -> impl Iterator<Item = &DiagnosticRow> {
        self.rows.iter().filter(|row| row.value.is_pending())
    }
}

impl fmt::Display for DiagnosticView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Raw byte runs are clipped so long tables stay readable
        const MAX_SHOWN: usize = 8;

        for row in &self.rows {
            let mut hex = row
                .bytes
                .iter()
                .take(MAX_SHOWN)
                .map(|byte| format!("{byte:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            if row.bytes.len() > MAX_SHOWN {
                hex.push_str(" ..");
            }

            let value = row.value.value.as_deref().unwrap_or("<pending>");
            write!(f, "{:04X}  {:<28}{}", row.offset, hex, value)?;
            if let Some(label) = &row.value.label {
                write!(f, "  {label}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
