//! Range-checked integer formats.

use crate::{
    format::{FieldFormat, FixedFormat},
    Error, Result,
};

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

fn encode_int(
    value: i64,
    width: usize,
    min: i128,
    max: i128,
    endian: Endian,
    format: &'static str,
) -> Result<Vec<u8>> {
    let wide = i128::from(value);
    if wide < min || wide > max {
        return Err(Error::ValueOutOfRange {
            value: value.to_string(),
            format,
        });
    }

    // In range, so the low `width` bytes carry the two's complement encoding
    let mut bytes = value.to_le_bytes()[..width].to_vec();
    if let Endian::Big = endian {
        bytes.reverse();
    }
    Ok(bytes)
}

macro_rules! int_format {
    ($(#[$meta:meta])* $name:ident, $width:expr, $ty:ty, $endian:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name;

        impl FieldFormat for $name {
            type Value = i64;

            fn name(&self) -> &'static str {
                stringify!($name)
            }

            fn encode(&self, value: &i64) -> Result<Vec<u8>> {
                encode_int(
                    *value,
                    $width,
                    i128::from(<$ty>::MIN),
                    i128::from(<$ty>::MAX),
                    Endian::$endian,
                    stringify!($name),
                )
            }

            fn render(&self, value: &i64) -> String {
                value.to_string()
            }
        }

        impl FixedFormat for $name {
            fn width(&self) -> usize {
                $width
            }
        }
    };
}

int_format!(
    /// Unsigned 8-bit integer.
    U8, 1, u8, Little
);
int_format!(
    /// Signed 8-bit integer.
    I8, 1, i8, Little
);
int_format!(
    /// Unsigned 16-bit little-endian integer.
    U16Le, 2, u16, Little
);
int_format!(
    /// Signed 16-bit little-endian integer.
    I16Le, 2, i16, Little
);
int_format!(
    /// Unsigned 16-bit big-endian integer.
    U16Be, 2, u16, Big
);
int_format!(
    /// Unsigned 32-bit little-endian integer.
    U32Le, 4, u32, Little
);
int_format!(
    /// Signed 32-bit little-endian integer.
    I32Le, 4, i32, Little
);
int_format!(
    /// Unsigned 32-bit big-endian integer.
    U32Be, 4, u32, Big
);
int_format!(
    /// Unsigned 64-bit little-endian integer.
    ///
    /// Values are carried as `i64`, so the upper half of the `u64` range is not reachable.
    U64Le, 8, u64, Little
);
int_format!(
    /// Signed 64-bit little-endian integer.
    I64Le, 8, i64, Little
);
