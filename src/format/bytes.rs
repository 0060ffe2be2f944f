//! Non-integer formats: floats, packed nibbles, byte arrays and text.

use crate::{
    format::{FieldFormat, FixedFormat},
    Error, Result,
};

/// IEEE-754 double, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct F64Le;

impl FieldFormat for F64Le {
    type Value = f64;

    fn name(&self) -> &'static str {
        "F64Le"
    }

    fn encode(&self, value: &f64) -> Result<Vec<u8>> {
        Ok(value.to_le_bytes().to_vec())
    }

    fn render(&self, value: &f64) -> String {
        value.to_string()
    }
}

impl FixedFormat for F64Le {
    fn width(&self) -> usize {
        8
    }
}

/// Two 4-bit values packed into one byte, `(high, low)`.
///
/// This is the layout of an instruction byte: opcode in the high nibble, operand or
/// sub-opcode in the low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Nibbles;

impl FieldFormat for Nibbles {
    type Value = (u8, u8);

    fn name(&self) -> &'static str {
        "Nibbles"
    }

    fn encode(&self, &(high, low): &(u8, u8)) -> Result<Vec<u8>> {
        if high > 0x0F || low > 0x0F {
            return Err(Error::ValueOutOfRange {
                value: format!("({high}, {low})"),
                format: "Nibbles",
            });
        }
        Ok(vec![(high << 4) | low])
    }

    fn render(&self, &(high, low): &(u8, u8)) -> String {
        format!("{high:X}:{low:X}")
    }
}

impl FixedFormat for Nibbles {
    fn width(&self) -> usize {
        1
    }
}

/// A byte array of fixed length `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedBytes<const N: usize>;

impl<const N: usize> FieldFormat for FixedBytes<N> {
    type Value = [u8; N];

    fn name(&self) -> &'static str {
        "FixedBytes"
    }

    fn encode(&self, value: &[u8; N]) -> Result<Vec<u8>> {
        Ok(value.to_vec())
    }

    fn render(&self, value: &[u8; N]) -> String {
        hex(value)
    }
}

impl<const N: usize> FixedFormat for FixedBytes<N> {
    fn width(&self) -> usize {
        N
    }
}

/// Null-terminated UTF-8 text. Direct only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Text;

impl FieldFormat for Text {
    type Value = String;

    fn name(&self) -> &'static str {
        "Text"
    }

    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        if value.contains('\0') {
            return Err(Error::InvalidText(format!(
                "{value:?} contains an interior NUL"
            )));
        }

        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        Ok(bytes)
    }
}

/// A raw run of bytes copied verbatim. Direct only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawBytes;

impl FieldFormat for RawBytes {
    type Value = Vec<u8>;

    fn name(&self) -> &'static str {
        "RawBytes"
    }

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn render(&self, value: &Vec<u8>) -> String {
        format!("{} bytes", value.len())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
