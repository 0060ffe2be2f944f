//! Byte sums and CRC-16.
//!
//! All functions have the `Fn(&[u8]) -> T` shape accepted by
//! [`crate::Region::post_process`].

/// Sum of all bytes, modulo 256.
#[must_use]
pub fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Sum of all bytes, modulo 65536.
#[must_use]
pub fn sum16(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)))
}

/// CRC-16/CCITT-FALSE: polynomial `0x1021`, initial value `0xFFFF`, no reflection, no final
/// XOR.
///
/// This is the checksum the snapshot header carries over the image body.
#[must_use]
pub fn crc16(bytes: &[u8]) -> u16 {
    const POLY: u16 = 0x1021;

    let mut crc = 0xFFFFu16;
    for byte in bytes {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}
