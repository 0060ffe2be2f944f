use thiserror::Error;

use crate::output::Offset;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// A deferred field that was still unresolved when complete output was enforced.
///
/// Reported in batches through [`Error::Unresolved`] so that a single build reveals every
/// missing forward reference at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedField {
    /// Sink offset of the zero placeholder
    pub offset: Offset,
    /// Width of the placeholder in bytes
    pub width: usize,
    /// Debug label attached when the field was written, if any
    pub label: Option<String>,
}

impl std::fmt::Display for UnresolvedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "0x{:04X} ({} bytes, '{}')", self.offset, self.width, label),
            None => write!(f, "0x{:04X} ({} bytes)", self.offset, self.width),
        }
    }
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// All variants except the file output errors are structural: they describe a programming
/// error in the code that drives the encoder, are deterministic, and reproduce on retry.
///
/// # Error Categories
///
/// ## Resolution Errors
/// - [`Error::AlreadyResolved`] - A value was resolved a second time
/// - [`Error::DerivedResolve`] - A derived value was resolved directly
///
/// ## Encoding Errors
/// - [`Error::ValueOutOfRange`] - A concrete value does not fit its field
/// - [`Error::InvalidText`] - Text that cannot be null-terminated
///
/// ## Finalization Errors
/// - [`Error::Unresolved`] - Deferred fields left unresolved
/// - [`Error::PostProcessingRange`] - A post-processing bound never resolved
/// - [`Error::Aggregate`] - Several of the above at once
///
/// ## Output Errors
/// - [`Error::OutOfBounds`] - Sink access outside the written bytes
/// - [`Error::WriteMmapFailed`], [`Error::WriteFinalizationFailed`], [`Error::FileError`]
///
/// # Examples
///
/// ```rust
/// use snapforge::{Error, Resolvable};
///
/// let value = Resolvable::new();
/// value.resolve(1u32)?;
///
/// match value.resolve(2) {
///     Err(Error::AlreadyResolved { existing, attempted }) => {
///         assert_eq!(existing, "1");
///         assert_eq!(attempted, "2");
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// # Ok::<(), snapforge::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A resolvable value was resolved a second time.
    ///
    /// Always a programming error in the caller. The value keeps its first resolution.
    #[error("Value already resolved to {existing}, refusing {attempted}")]
    AlreadyResolved {
        /// Debug rendering of the value held
        existing: String,
        /// Debug rendering of the rejected value
        attempted: String,
    },

    /// A derived value (`map`, `bind`, `subtract`) was resolved directly.
    ///
    /// Derived values are driven exclusively by their sources.
    #[error("Derived values are resolved by their sources only")]
    DerivedResolve,

    /// A concrete value does not fit the declared field width.
    ///
    /// Raised before any byte of the field reaches the sink.
    #[error("Value {value} does not fit format {format}")]
    ValueOutOfRange {
        /// Rendering of the offending value
        value: String,
        /// Name of the field format
        format: &'static str,
    },

    /// Text cannot be encoded as null-terminated text.
    #[error("Invalid text field - {0}")]
    InvalidText(String),

    /// Finalization enforced complete output but deferred fields never resolved.
    #[error("{} unresolved field(s): {}", .0.len(), join_fields(.0))]
    Unresolved(Vec<UnresolvedField>),

    /// A post-processing bound was unresolved when post-processing ran.
    #[error("Post-processing entry #{index} has unresolved bounds (start: {start:?}, end: {end:?})")]
    PostProcessingRange {
        /// Registration index of the entry
        index: usize,
        /// Start bound, if resolved
        start: Option<Offset>,
        /// End bound, if resolved
        end: Option<Offset>,
    },

    /// Access outside the bytes written to a sink.
    ///
    /// Overwrites must patch previously written bytes and can never grow the output.
    #[error("Access at offset {offset} of {len} byte(s) exceeds output size {size}")]
    OutOfBounds {
        /// Requested start offset
        offset: Offset,
        /// Requested length
        len: usize,
        /// Current output size
        size: usize,
    },

    /// Several failures collected during one finalization or one resolution.
    #[error("{} error(s): {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<Error>),

    /// Internal invariant violation.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violation
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Failed to create or map an output file.
    #[error("Output file mapping failed - {message}")]
    WriteMmapFailed {
        /// Description of the failure
        message: String,
    },

    /// Failed to finalize an output file.
    #[error("Output file finalization failed - {message}")]
    WriteFinalizationFailed {
        /// Description of the failure
        message: String,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

impl Error {
    /// Collapses a list of errors into one.
    ///
    /// Returns `None` for an empty list, the error itself for a single entry, and
    /// [`Error::Aggregate`] otherwise. Nested aggregates are flattened.
    pub(crate) fn from_many(errors: Vec<Error>) -> Option<Error> {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                Error::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Error::Aggregate(flat)),
        }
    }

    /// Returns every unresolved field reported by this error, including inside aggregates.
    #[must_use]
    pub fn unresolved_fields(&self) -> Vec<&UnresolvedField> {
        match self {
            Error::Unresolved(fields) => fields.iter().collect(),
            Error::Aggregate(errors) => errors.iter().flat_map(Error::unresolved_fields).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_fields(fields: &[UnresolvedField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_many_collapses() {
        assert!(Error::from_many(Vec::new()).is_none());

        let single = Error::from_many(vec![Error::DerivedResolve]).unwrap();
        assert!(matches!(single, Error::DerivedResolve));

        let nested = Error::from_many(vec![
            Error::Aggregate(vec![Error::DerivedResolve, Error::DerivedResolve]),
            Error::InvalidText("x".to_string()),
        ])
        .unwrap();
        match nested {
            Error::Aggregate(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_display_lists_every_field() {
        let error = Error::Unresolved(vec![
            UnresolvedField {
                offset: 2,
                width: 2,
                label: Some("jump target".to_string()),
            },
            UnresolvedField {
                offset: 0x10,
                width: 1,
                label: None,
            },
        ]);

        let text = error.to_string();
        assert!(text.starts_with("2 unresolved field(s)"));
        assert!(text.contains("0x0002 (2 bytes, 'jump target')"));
        assert!(text.contains("0x0010 (1 bytes)"));
        assert_eq!(error.unresolved_fields().len(), 2);
    }

    #[test]
    fn test_malformed_macro_records_location() {
        let error = malformed_error!("bad {}", 42);
        match error {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad 42");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }
}
