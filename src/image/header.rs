//! Snapshot header layout and parsing.

use crate::{output::Offset, postprocess::checksum::crc16, Error, Result};

/// Magic number at the start of every snapshot, `"SNAP"` in file order.
pub const SNAPSHOT_MAGIC: u32 = 0x5041_4E53;

/// Image format version written by default.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Size of the header before the section offset table.
pub const HEADER_FIXED_SIZE: usize = 16;

/// Offset of the CRC field within the header.
pub const CRC_OFFSET: usize = 12;

/// The parsed header of a snapshot.
///
/// | Offset | Size   | Field             |
/// |--------|--------|-------------------|
/// | 0      | 4      | `magic`           |
/// | 4      | 2      | `version`         |
/// | 6      | 2      | `header_size`     |
/// | 8      | 4      | `bytecode_size`   |
/// | 12     | 2      | `crc`             |
/// | 14     | 2      | `section_count`   |
/// | 16     | 2 * n  | `section_offsets` |
///
/// All fields are little-endian. `bytecode_size` is the size of the whole image and `crc`
/// is CRC-16/CCITT-FALSE over every byte after the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Image format version
    pub version: u16,
    /// Size of the header including the section offset table
    pub header_size: u16,
    /// Size of the complete image
    pub bytecode_size: u32,
    /// CRC-16/CCITT-FALSE of `[header_size, bytecode_size)`
    pub crc: u16,
    /// Image offsets of the sections, in section order
    pub section_offsets: Vec<u16>,
}

impl SnapshotHeader {
    /// Parses the header at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `data` is too short for the header it describes, and
    /// [`Error::Malformed`] for a wrong magic number or inconsistent sizes.
    pub fn parse(data: &[u8]) -> Result<SnapshotHeader> {
        let mut offset = 0;

        let magic = read_u32(data, &mut offset)?;
        if magic != SNAPSHOT_MAGIC {
            return Err(malformed_error!("Invalid snapshot magic - 0x{:08X}", magic));
        }

        let version = read_u16(data, &mut offset)?;
        let header_size = read_u16(data, &mut offset)?;
        let bytecode_size = read_u32(data, &mut offset)?;
        let crc = read_u16(data, &mut offset)?;
        let section_count = read_u16(data, &mut offset)?;

        let expected = HEADER_FIXED_SIZE + usize::from(section_count) * 2;
        if usize::from(header_size) != expected {
            return Err(malformed_error!(
                "Header size {} does not match {} sections",
                header_size,
                section_count
            ));
        }
        if bytecode_size as usize > data.len() || (bytecode_size as usize) < expected {
            return Err(malformed_error!(
                "Image size {} is inconsistent with {} available bytes",
                bytecode_size,
                data.len()
            ));
        }

        let section_offsets = (0..section_count)
            .map(|_| read_u16(data, &mut offset))
            .collect::<Result<Vec<_>>>()?;

        Ok(SnapshotHeader {
            version,
            header_size,
            bytecode_size,
            crc,
            section_offsets,
        })
    }

    /// Returns `true` if the stored CRC matches the image body in `data`.
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        data.get(usize::from(self.header_size)..self.bytecode_size as usize)
            .is_some_and(|body| crc16(body) == self.crc)
    }
}

fn read_u16(data: &[u8], offset: &mut Offset) -> Result<u16> {
    let bytes = take::<2>(data, offset)?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32(data: &[u8], offset: &mut Offset) -> Result<u32> {
    let bytes = take::<4>(data, offset)?;
    Ok(u32::from_le_bytes(bytes))
}

fn take<const N: usize>(data: &[u8], offset: &mut Offset) -> Result<[u8; N]> {
    let start = *offset;
    let mut bytes = [0u8; N];
    match data.get(start..start + N) {
        Some(slice) => bytes.copy_from_slice(slice),
        None => {
            return Err(Error::OutOfBounds {
                offset: start,
                len: N,
                size: data.len(),
            })
        }
    }
    *offset += N;
    Ok(bytes)
}
