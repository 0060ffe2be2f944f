//! Integration tests for complete snapshot images.
//!
//! A small program is assembled through the bytecode writer and the short-call table, then
//! built into an image whose header, section table and CRC are checked byte by byte.

use snapforge::prelude::*;

/// CRC-16/CCITT-FALSE, computed bit by bit.
fn reference_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        for bit in (0..8).rev() {
            let input = (byte >> bit) & 1 == 1;
            let top = crc & 0x8000 != 0;
            crc <<= 1;
            if input != top {
                crc ^= 0x1021;
            }
        }
    }
    crc
}

/// A short-call table with one entry, and bytecode calling through it.
fn program() -> Result<SnapshotBuilder> {
    let function = Resolvable::<Offset>::new();

    let mut table = ShortCallTable::new();
    let index = table.add(&function, 1)?;

    let mut code = Region::new();
    {
        let mut writer = InstructionWriter::new(&mut code);
        writer.op(Opcode::LoadSmallLiteral, 5)?;
        writer.call_short(index)?;
        writer.ex1(OpcodeEx1::Return)?;
        writer.label(&function);
        writer.ex1(OpcodeEx1::Return)?;
    }

    let mut builder = SnapshotBuilder::new();
    builder.add_section("shortcalls", table.into_region())?;
    builder.add_section("bytecode", code)?;
    Ok(builder)
}

#[test]
fn test_program_image_layout() -> Result<()> {
    let snapshot = program()?.build(&FlattenConfig::strict())?;
    let bytes = snapshot.bytes();

    assert_eq!(
        bytes,
        &[
            b'S', b'N', b'A', b'P', // magic
            0x01, 0x00, // version
            20, 0x00, // header size
            27, 0x00, 0x00, 0x00, // image size
            bytes[12], bytes[13], // crc, checked below
            0x02, 0x00, // section count
            20, 0x00, 23, 0x00, // section offsets
            26, 0x00, 0x01, // short-call entry: address, argc
            0x05, 0x40, 0x60, 0x60, // bytecode
        ][..]
    );

    let code = snapshot.section("bytecode").expect("bytecode section");
    assert_eq!((code.offset, code.size), (23, 4));
    assert!(snapshot.summary().is_complete());
    Ok(())
}

#[test]
fn test_crc_matches_independent_computation() -> Result<()> {
    let snapshot = program()?.build(&FlattenConfig::strict())?;
    let bytes = snapshot.bytes();

    let expected = reference_crc(&bytes[20..]);
    assert_eq!(snapshot.crc(), Some(expected));
    assert_eq!(u16::from_le_bytes([bytes[12], bytes[13]]), expected);

    let header = snapshot.header()?;
    assert_eq!(header.crc, expected);
    assert!(header.verify(bytes));
    Ok(())
}

#[test]
fn test_builds_are_reproducible() -> Result<()> {
    let first = program()?.build(&FlattenConfig::strict())?;
    let second = program()?.build(&FlattenConfig::strict())?;
    assert_eq!(first.bytes(), second.bytes());
    Ok(())
}

#[test]
fn test_write_to_persists_image() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("program.snap");

    let snapshot = program()?.write_to(&path, &FlattenConfig::strict())?;
    let written = std::fs::read(&path)?;

    assert_eq!(written, snapshot.bytes());
    assert_eq!(SnapshotHeader::parse(&written)?.section_offsets, vec![20, 23]);
    Ok(())
}

#[test]
fn test_failed_build_leaves_no_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.snap");

    let mut code = Region::new();
    InstructionWriter::new(&mut code).jump_16(&Resolvable::new())?;
    let mut builder = SnapshotBuilder::new();
    builder.add_section("bytecode", code)?;

    let err = builder
        .write_to(&path, &FlattenConfig::strict())
        .unwrap_err();
    assert!(!err.unresolved_fields().is_empty());
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_tolerant_build_renders_missing_targets() -> Result<()> {
    let mut code = Region::new();
    InstructionWriter::new(&mut code).jump_16(&Resolvable::new())?;
    let mut builder = SnapshotBuilder::new();
    builder.add_section("bytecode", code)?;

    let snapshot = builder.build(&FlattenConfig::quiet())?;
    let pending: Vec<_> = snapshot.diagnostic_view().pending().collect();

    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].offset, 12);
    assert_eq!(pending[0].value.label.as_deref(), Some("crc"));
    assert_eq!(pending[1].offset, 19);
    assert_eq!(pending[1].bytes, vec![0, 0]);
    assert_eq!(snapshot.summary().unresolved.len(), 2);
    assert_eq!(snapshot.crc(), None);
    Ok(())
}
