//! Integration tests for region flattening.
//!
//! These tests drive complete region trees through layout and finalization and check the
//! properties every image relies on: stable placeholder widths, order-independent
//! resolution, exact marker offsets and deterministic output.

use std::{cell::Cell, rc::Rc};

use snapforge::{postprocess::checksum::sum8, prelude::*};

/// One direct byte, a deferred 16-bit field, another direct byte.
fn three_field_region(value: &Resolvable<i64>) -> Result<Region> {
    let mut region = Region::new();
    region.write_fixed(U8, 0x01, Some("first"))?;
    region.write_fixed(U16Le, value, Some("late"))?;
    region.write_fixed(U8, 0x02, Some("last"))?;
    Ok(region)
}

#[test]
fn test_placeholder_then_patched_reflatten() -> Result<()> {
    let value = Resolvable::new();
    let region = three_field_region(&value)?;

    let bytes = region.to_bytes(&FlattenConfig::quiet())?;
    assert_eq!(bytes, vec![0x01, 0x00, 0x00, 0x02]);

    value.resolve(300)?;
    let bytes = region.to_bytes(&FlattenConfig::strict())?;
    assert_eq!(bytes, vec![0x01, 0x2C, 0x01, 0x02]);
    Ok(())
}

#[test]
fn test_checksum_over_marked_range() -> Result<()> {
    let mut region = Region::new();
    region.write_fixed(U8, 0xAA, Some("prefix"))?;
    let start = region.current_address();
    region.write_bytes(&[10, 20, 30, 40, 50], Some("payload"));
    let end = region.current_address();
    let checksum = region.post_process(&start, &end, sum8);

    let sink = ImageBuffer::shared();
    let summary = region.flatten(&sink, &FlattenConfig::strict())?;

    assert_eq!(summary.size, 6);
    assert_eq!(summary.post_processed, 1);
    assert_eq!(sink.borrow().len(), 6);
    assert_eq!(checksum.value(), Some(150));
    Ok(())
}

#[test]
fn test_out_of_range_leaves_sink_untouched() -> Result<()> {
    let mut region = Region::new();
    let err = region.write_fixed(U8, 256, Some("too big")).unwrap_err();
    assert!(matches!(err, Error::ValueOutOfRange { format: "U8", .. }));
    assert!(region.is_empty());

    let sink = ImageBuffer::shared();
    region.flatten(&sink, &FlattenConfig::strict())?;
    assert!(sink.borrow().is_empty());
    Ok(())
}

#[test]
fn test_shared_value_patches_every_use_once() -> Result<()> {
    let value = Resolvable::new();
    let events = Rc::new(Cell::new(0));
    let counter = events.clone();
    value.on_resolve(move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    })?;

    let mut region = Region::new();
    region.write_fixed(U16Le, &value, Some("first use"))?;
    region.write_fixed(U8, 0xFF, None)?;
    region.write_fixed(U16Le, &value, Some("second use"))?;

    let sink = ImageBuffer::shared();
    let layout = region.layout(&sink)?;
    assert_eq!(layout.pending_fields().len(), 2);

    value.resolve(0x1234)?;
    let summary = layout.finalize(&FlattenConfig::strict())?;

    assert!(summary.is_complete());
    assert_eq!(events.get(), 1);
    assert_eq!(sink.borrow().as_slice(), &[0x34, 0x12, 0xFF, 0x34, 0x12]);
    Ok(())
}

#[test]
fn test_resolution_timing_does_not_change_output() -> Result<()> {
    let expected = vec![0x01, 0x2C, 0x01, 0x02];

    // Before flattening
    let value = Resolvable::new();
    value.resolve(300)?;
    let before = three_field_region(&value)?.to_bytes(&FlattenConfig::strict())?;

    // During traversal, from a marker placed after the field
    let value = Resolvable::new();
    let mut during = three_field_region(&value)?;
    let marker = Resolvable::<Offset>::new();
    let target = value.clone();
    marker.on_resolve(move |_| target.resolve(300))?;
    during.mark(&marker);
    let during = during.to_bytes(&FlattenConfig::strict())?;

    // Between layout and finalization
    let value = Resolvable::new();
    let region = three_field_region(&value)?;
    let sink = ImageBuffer::shared();
    let layout = region.layout(&sink)?;
    value.resolve(300)?;
    layout.finalize(&FlattenConfig::strict())?;
    let after = sink.borrow().to_bytes();

    assert_eq!(before, expected);
    assert_eq!(during, expected);
    assert_eq!(after, expected);
    Ok(())
}

fn assert_width_stable<F: FixedFormat>(format: F, value: F::Value) -> Result<()> {
    let deferred = Resolvable::new();
    let mut region = Region::new();
    region.write_fixed(U8, 0xEE, None)?;
    region.write_fixed(format.clone(), &deferred, Some(format.name()))?;
    region.write_fixed(U8, 0xEE, None)?;

    let pending = region.to_bytes(&FlattenConfig::quiet())?;
    deferred.resolve(value)?;
    let resolved = region.to_bytes(&FlattenConfig::strict())?;

    assert_eq!(pending.len(), format.width() + 2, "{}", format.name());
    assert_eq!(resolved.len(), pending.len(), "{}", format.name());
    assert_eq!(resolved[1..=format.width()], format.encode(&value_of(&deferred))?[..]);
    Ok(())
}

fn value_of<T: Clone + std::fmt::Debug + 'static>(value: &Resolvable<T>) -> T {
    value.value().expect("resolved above")
}

#[test]
fn test_placeholder_width_matches_every_format() -> Result<()> {
    assert_width_stable(U8, 255)?;
    assert_width_stable(I8, -128)?;
    assert_width_stable(U16Le, 65535)?;
    assert_width_stable(I16Le, -2)?;
    assert_width_stable(U16Be, 0x0102)?;
    assert_width_stable(U32Le, 0xDEAD_BEEF)?;
    assert_width_stable(I32Le, -1)?;
    assert_width_stable(U32Be, 7)?;
    assert_width_stable(U64Le, i64::MAX)?;
    assert_width_stable(I64Le, i64::MIN)?;
    assert_width_stable(F64Le, 1.5)?;
    assert_width_stable(Nibbles, (0xA, 0x3))?;
    assert_width_stable(FixedBytes::<4>, [1, 2, 3, 4])?;
    Ok(())
}

#[test]
fn test_markers_track_write_offset_around_placeholders() -> Result<()> {
    let mut region = Region::new();
    let first = region.current_address();
    region.write_fixed(U32Le, Resolvable::<i64>::new(), Some("unknown"))?;
    let second = region.current_address();
    region.write_fixed(U16Le, Resolvable::<i64>::new(), Some("unknown"))?;
    region.write_bytes(&[1, 2, 3], None);
    let third = region.current_address();
    region.write_fixed(U8, Resolvable::<i64>::new(), Some("unknown"))?;

    let sink = ImageBuffer::shared();
    let summary = region.flatten(&sink, &FlattenConfig::quiet())?;

    assert_eq!(first.value(), Some(0));
    assert_eq!(second.value(), Some(4));
    assert_eq!(third.value(), Some(9));
    assert_eq!(summary.unresolved.len(), 3);
    Ok(())
}

#[test]
fn test_nested_markers_use_image_offsets() -> Result<()> {
    let mut inner = Region::new();
    inner.write_bytes(&[0; 3], None);
    let inside = inner.current_address();

    let mut outer = Region::new();
    outer.write_bytes(&[0; 5], None);
    outer.write_region(inner);

    outer.to_bytes(&FlattenConfig::strict())?;
    assert_eq!(inside.value(), Some(8));
    Ok(())
}

#[test]
fn test_reflatten_is_deterministic() -> Result<()> {
    let size = Resolvable::<Offset>::new();
    let mut region = Region::new();
    region.write_fixed(U16Le, size.as_i64()?, Some("size"))?;
    region.write_text("entry", Some("name"))?;
    let start = region.current_address();
    region.write_bytes(&[9, 8, 7], None);
    let end = region.current_address();
    let sum = region.post_process(&start, &end, sum8);
    region.write_fixed(U8, sum.map(|sum| i64::from(*sum)), Some("sum"))?;
    region.mark(&size);

    let first = region.to_bytes(&FlattenConfig::strict())?;
    let second = region.to_bytes(&FlattenConfig::strict())?;

    assert_eq!(first, second);
    assert_eq!(first, vec![12, 0, b'e', b'n', b't', b'r', b'y', 0, 9, 8, 7, 24]);
    Ok(())
}

#[test]
fn test_partial_render_does_not_fix_checksum() -> Result<()> {
    let value = Resolvable::new();
    let mut region = Region::new();
    let start = region.current_address();
    region.write_fixed(U8, &value, Some("late"))?;
    region.write_fixed(U8, 3, None)?;
    let end = region.current_address();
    let sum = region.post_process(&start, &end, sum8);
    region.write_fixed(U8, sum.map(|sum| i64::from(*sum)), Some("sum"))?;

    let view = region.diagnostic_view()?;
    assert_eq!(view.pending().count(), 2);
    assert_eq!(sum.value(), None);

    value.resolve(5)?;
    let first = region.to_bytes(&FlattenConfig::strict())?;
    let second = region.to_bytes(&FlattenConfig::strict())?;
    assert_eq!(first, vec![5, 3, 8]);
    assert_eq!(second, first);
    Ok(())
}

#[test]
fn test_strict_finalize_reports_every_missing_field() -> Result<()> {
    let mut region = Region::new();
    region.write_fixed(U8, 0, None)?;
    region.write_fixed(U16Le, Resolvable::<i64>::new(), Some("alpha"))?;
    region.write_fixed(U32Le, Resolvable::<i64>::new(), Some("beta"))?;

    let err = region.to_bytes(&FlattenConfig::strict()).unwrap_err();
    let fields = err.unresolved_fields();
    assert_eq!(fields.len(), 2);
    assert_eq!((fields[0].offset, fields[0].width), (1, 2));
    assert_eq!(fields[0].label.as_deref(), Some("alpha"));
    assert_eq!((fields[1].offset, fields[1].width), (3, 4));
    assert_eq!(fields[1].label.as_deref(), Some("beta"));
    Ok(())
}

#[test]
fn test_second_resolution_is_rejected() -> Result<()> {
    let value = Resolvable::new();
    value.resolve(7i64)?;
    let err = value.resolve(8).unwrap_err();

    assert!(matches!(err, Error::AlreadyResolved { .. }));
    assert_eq!(value.value(), Some(7));
    Ok(())
}

#[test]
fn test_diagnostic_view_of_partial_build() -> Result<()> {
    let value = Resolvable::<i64>::new();
    let region = three_field_region(&value)?;

    let view = region.diagnostic_view()?;
    assert_eq!(view.rows.len(), 3);
    assert_eq!(view.pending().count(), 1);
    let row = view.row_at(1).expect("deferred row");
    assert_eq!(row.bytes, vec![0, 0]);

    value.resolve(300)?;
    let view = region.diagnostic_view()?;
    assert_eq!(view.pending().count(), 0);
    Ok(())
}
