use crate::{
    format::{FieldFormat, U16Le, U8},
    output::Offset,
    region::Region,
    resolve::Resolvable,
    Error, Result,
};

/// Size of one short-call table entry in bytes.
pub const SHORT_CALL_ENTRY_SIZE: usize = 3;

/// Compact table of `(function, argc)` pairs addressed by small index.
///
/// Entries are three bytes: the 16-bit function address followed by the 8-bit argument
/// count. The function address may be a forward reference. The table lays itself out when
/// its region is embedded with [`ShortCallTable::into_region`].
///
/// # Examples
///
/// ```rust
/// use snapforge::bytecode::ShortCallTable;
/// use snapforge::{FlattenConfig, Region, Resolvable};
///
/// let function = Resolvable::new();
/// let mut table = ShortCallTable::new();
/// let index = table.add(&function, 2)?;
/// let entry = table.entry_offset(index).unwrap();
///
/// let mut image = Region::new();
/// image.write_bytes(&[0xEE; 2], None);
/// image.write_region(table.into_region());
/// image.mark(&function);
///
/// assert_eq!(image.to_bytes(&FlattenConfig::strict())?, vec![0xEE, 0xEE, 0x05, 0x00, 0x02]);
/// assert_eq!(entry.value(), Some(2));
/// # Ok::<(), snapforge::Error>(())
/// ```
#[derive(Debug)]
pub struct ShortCallTable {
    region: Region,
    start: Resolvable<Offset>,
    entries: usize,
}

impl ShortCallTable {
    /// Most entries an 8-bit index can address.
    pub const MAX_ENTRIES: usize = 256;

    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        let mut region = Region::new();
        let start = region.current_address();
        Self {
            region,
            start,
            entries: 0,
        }
    }

    /// Appends an entry and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOutOfRange`] if the table is full, or if the function address is
    /// already known and exceeds 16 bits.
    pub fn add(&mut self, function: &Resolvable<Offset>, argc: u8) -> Result<u8> {
        let index = u8::try_from(self.entries).map_err(|_| Error::ValueOutOfRange {
            value: self.entries.to_string(),
            format: "ShortCallTable",
        })?;

        let address = function.as_i64()?;
        if let Some(known) = address.value() {
            U16Le.encode(&known)?;
        }

        self.region
            .write_fixed(U16Le, address, Some("short call function"))?;
        self.region.write_fixed(U8, argc, Some("short call argc"))?;
        self.entries += 1;
        Ok(index)
    }

    /// Offset of entry `index`, once the table is placed.
    #[must_use]
    pub fn entry_offset(&self, index: u8) -> Option<Resolvable<Offset>> {
        let index = usize::from(index);
        if index >= self.entries {
            return None;
        }
        Some(self.start.map(move |start| start + index * SHORT_CALL_ENTRY_SIZE))
    }

    /// Offset of the first entry, once the table is placed.
    #[must_use]
    pub fn start(&self) -> &Resolvable<Offset> {
        &self.start
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Size of the table in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries * SHORT_CALL_ENTRY_SIZE
    }

    /// Consumes the table, returning the region to embed.
    #[must_use]
    pub fn into_region(self) -> Region {
        self.region
    }
}

impl Default for ShortCallTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlattenConfig;

    #[test]
    fn test_entries_are_three_bytes() {
        let first = Resolvable::resolved(0x0102usize);
        let second = Resolvable::resolved(0x0304usize);
        let mut table = ShortCallTable::new();
        assert_eq!(table.add(&first, 0).unwrap(), 0);
        assert_eq!(table.add(&second, 5).unwrap(), 1);
        assert_eq!(table.size(), 6);

        let offset = table.entry_offset(1).unwrap();
        assert!(table.entry_offset(2).is_none());

        let bytes = table.into_region().to_bytes(&FlattenConfig::strict()).unwrap();
        assert_eq!(bytes, vec![0x02, 0x01, 0x00, 0x04, 0x03, 0x05]);
        assert_eq!(offset.value(), Some(3));
    }

    #[test]
    fn test_table_is_limited_to_byte_indices() {
        let function = Resolvable::resolved(0usize);
        let mut table = ShortCallTable::new();
        for _ in 0..ShortCallTable::MAX_ENTRIES {
            table.add(&function, 0).unwrap();
        }
        assert!(matches!(
            table.add(&function, 0),
            Err(Error::ValueOutOfRange { .. })
        ));
        assert_eq!(table.len(), ShortCallTable::MAX_ENTRIES);
    }

    #[test]
    fn test_known_address_out_of_range() {
        let mut table = ShortCallTable::new();
        let far = Resolvable::resolved(0x1_0000usize);
        assert!(table.add(&far, 0).is_err());
        assert!(table.is_empty());
    }
}
