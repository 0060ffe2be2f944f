//! Field formats: how a single value is turned into bytes.
//!
//! A format pairs an encoder for a concrete value with a zero placeholder of the same width
//! for values that are not known yet, plus a diagnostic rendering of the decoded value.
//!
//! # Key Components
//!
//! - [`FieldFormat`] - Encoding and rendering of one value type
//! - [`FixedFormat`] - Formats with a fixed width, the only ones usable for deferred writes
//! - [`FieldValue`] / [`IntoFieldValue`] - A concrete value or a [`Resolvable`] to be written
//! - Integer formats: [`U8`], [`I8`], [`U16Le`], [`I16Le`], [`U16Be`], [`U32Le`], [`I32Le`],
//!   [`U32Be`], [`U64Le`], [`I64Le`]
//! - Other formats: [`F64Le`], [`Nibbles`], [`FixedBytes`], [`Text`], [`RawBytes`]
//!
//! # Range Checking
//!
//! Every integer format carries `i64` values and range-checks them against its declared
//! width. Values that do not fit fail with [`crate::Error::ValueOutOfRange`]; nothing is ever
//! masked or truncated. Encoding happens before any byte reaches a sink, so a failure never
//! leaves a partially written field behind.
//!
//! # Placeholder Width
//!
//! [`FixedFormat::placeholder`] is all-zero and exactly [`FixedFormat::width`] bytes long. A
//! field written as a placeholder and patched later therefore never changes the image
//! length.
//!
//! # Examples
//!
//! ```rust
//! use snapforge::format::{FieldFormat, FixedFormat, U16Le, U8};
//!
//! assert_eq!(U16Le.encode(&300)?, vec![0x2C, 0x01]);
//! assert_eq!(U16Le.placeholder(), vec![0, 0]);
//! assert!(U8.encode(&256).is_err());
//! # Ok::<(), snapforge::Error>(())
//! ```

mod bytes;
mod int;

pub use bytes::{F64Le, FixedBytes, Nibbles, RawBytes, Text};
pub use int::{I16Le, I32Le, I64Le, I8, U16Be, U16Le, U32Be, U32Le, U64Le, U8};

use std::fmt;

use crate::{
    output::{DiagnosticRow, Labelled, Offset},
    resolve::Resolvable,
    Result,
};

/// Encoding of one value type into bytes.
///
/// Formats are pure and stateless.
pub trait FieldFormat: Clone + 'static {
    /// The value type this format encodes
    type Value: Clone + fmt::Debug + 'static;

    /// Short name used in error messages.
    fn name(&self) -> &'static str;

    /// Encodes a concrete value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ValueOutOfRange`] (or a format specific error) if the value
    /// cannot be represented.
    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>>;

    /// Renders a decoded value for the diagnostic view.
    fn render(&self, value: &Self::Value) -> String {
        format!("{value:?}")
    }

    /// Builds the labelled rendering of a value, or of a pending field.
    fn describe(&self, value: Option<&Self::Value>, label: Option<&str>) -> Labelled<String> {
        match value {
            Some(value) => Labelled::known(self.render(value), label),
            None => Labelled::pending(label),
        }
    }

    /// Builds the diagnostic row of a field written at `offset`.
    fn display_row(
        &self,
        value: Option<&Self::Value>,
        bytes: &[u8],
        offset: Offset,
        label: Option<&str>,
    ) -> DiagnosticRow {
        DiagnosticRow {
            offset,
            bytes: bytes.to_vec(),
            value: self.describe(value, label),
        }
    }
}

/// A format whose encoding always has the same width.
pub trait FixedFormat: FieldFormat {
    /// Width of every encoding in bytes.
    fn width(&self) -> usize;

    /// The all-zero stand-in written while the value is unknown.
    fn placeholder(&self) -> Vec<u8> {
        vec![0; self.width()]
    }
}

/// The value of a field: known now, or resolved later.
#[derive(Debug, Clone)]
pub enum FieldValue<T> {
    /// A concrete value, encoded immediately
    Known(T),
    /// A value written as a placeholder until it resolves
    Deferred(Resolvable<T>),
}

/// Conversion into a [`FieldValue`], accepted by [`crate::Region::write_fixed`].
///
/// Implemented for every concrete format value type and for [`Resolvable`] handles of them,
/// so one write operation covers both direct and deferred fields.
pub trait IntoFieldValue<T> {
    /// Performs the conversion.
    fn into_field_value(self) -> FieldValue<T>;
}

impl<T> IntoFieldValue<T> for FieldValue<T> {
    fn into_field_value(self) -> FieldValue<T> {
        self
    }
}

impl<T> IntoFieldValue<T> for Resolvable<T> {
    fn into_field_value(self) -> FieldValue<T> {
        FieldValue::Deferred(self)
    }
}

impl<T> IntoFieldValue<T> for &Resolvable<T> {
    fn into_field_value(self) -> FieldValue<T> {
        FieldValue::Deferred(self.clone())
    }
}

macro_rules! impl_known_value {
    ($($ty:ty),+) => {
        $(
            impl IntoFieldValue<$ty> for $ty {
                fn into_field_value(self) -> FieldValue<$ty> {
                    FieldValue::Known(self)
                }
            }
        )+
    };
}

impl_known_value!(i64, f64, (u8, u8), String, Vec<u8>);

// Narrower integers widen losslessly, so plain literals work with every integer format
macro_rules! impl_widening_value {
    ($($ty:ty),+) => {
        $(
            impl IntoFieldValue<i64> for $ty {
                fn into_field_value(self) -> FieldValue<i64> {
                    FieldValue::Known(i64::from(self))
                }
            }
        )+
    };
}

impl_widening_value!(i8, i16, i32, u8, u16, u32);

impl<const N: usize> IntoFieldValue<[u8; N]> for [u8; N] {
    fn into_field_value(self) -> FieldValue<[u8; N]> {
        FieldValue::Known(self)
    }
}
