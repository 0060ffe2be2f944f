use std::path::Path;

use crate::{
    format::{U16Le, U32Le},
    image::header::{SnapshotHeader, SNAPSHOT_MAGIC, SNAPSHOT_VERSION},
    output::{DiagnosticView, ImageBuffer, ImageFile, Offset, OutputSink},
    postprocess::checksum::crc16,
    region::{FlattenConfig, FlattenSummary, Region},
    resolve::Resolvable,
    Error, Result,
};

/// Offset and size of one section of a built snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    /// Name the section was added under
    pub name: String,
    /// Image offset of the first byte
    pub offset: Offset,
    /// Size in bytes
    pub size: usize,
}

struct PendingSection {
    name: String,
    region: Region,
}

/// Assembles a snapshot image from named section regions.
///
/// The header refers forward to everything that follows it: the image size, the offset of
/// each section and the CRC of the body. All of these are written as deferred fields and
/// resolved during flattening, so sections are added in any order and at any size.
///
/// # Examples
///
/// ```rust
/// use snapforge::image::{SnapshotBuilder, SnapshotHeader};
/// use snapforge::{FlattenConfig, Region};
///
/// let mut code = Region::new();
/// code.write_bytes(&[0x60], Some("return"));
///
/// let mut builder = SnapshotBuilder::new();
/// builder.add_section("bytecode", code)?;
/// let snapshot = builder.build(&FlattenConfig::strict())?;
///
/// let header = SnapshotHeader::parse(snapshot.bytes())?;
/// assert_eq!(header.section_offsets, vec![18]);
/// assert!(header.verify(snapshot.bytes()));
/// # Ok::<(), snapforge::Error>(())
/// ```
pub struct SnapshotBuilder {
    version: u16,
    sections: Vec<PendingSection>,
}

impl SnapshotBuilder {
    /// Creates a builder for the current image format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            sections: Vec::new(),
        }
    }

    /// Sets the image format version written to the header.
    #[must_use]
    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    /// Appends a section and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOutOfRange`] if the section count would exceed 16 bits.
    pub fn add_section(&mut self, name: &str, region: Region) -> Result<usize> {
        if self.sections.len() >= usize::from(u16::MAX) {
            return Err(Error::ValueOutOfRange {
                value: (self.sections.len() + 1).to_string(),
                format: "section count",
            });
        }

        self.sections.push(PendingSection {
            name: name.to_string(),
            region,
        });
        Ok(self.sections.len() - 1)
    }

    /// Number of sections added.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Flattens the header and all sections into a new image.
    ///
    /// # Errors
    ///
    /// - [`Error::ValueOutOfRange`] if a section starts beyond 64 KiB
    /// - Any error of [`Region::flatten`], including unresolved fields inside sections when
    ///   complete output is enforced
    pub fn build(self, config: &FlattenConfig) -> Result<Snapshot> {
        let section_count = self.sections.len();
        let mut region = Region::new();
        let mut bounds = Vec::with_capacity(section_count);

        let end_of_header = Resolvable::new();
        let end_of_image = Resolvable::new();
        let mut offsets = Vec::with_capacity(section_count);
        for _ in 0..section_count {
            offsets.push(Resolvable::<Offset>::new());
        }

        let crc_field = Resolvable::<i64>::new();

        region.write_fixed(U32Le, i64::from(SNAPSHOT_MAGIC), Some("magic"))?;
        region.write_fixed(U16Le, i64::from(self.version), Some("version"))?;
        region.write_fixed(U16Le, end_of_header.as_i64()?, Some("header size"))?;
        region.write_fixed(U32Le, end_of_image.as_i64()?, Some("bytecode size"))?;
        region.write_fixed(U16Le, &crc_field, Some("crc"))?;
        region.write_fixed(U16Le, section_count as i64, Some("section count"))?;
        for (section, offset) in self.sections.iter().zip(&offsets) {
            region.write_fixed(U16Le, offset.as_i64()?, Some(section.name.as_str()))?;
        }
        region.mark(&end_of_header);

        for (section, start) in self.sections.into_iter().zip(offsets) {
            region.mark(&start);
            region.write_region(section.region);
            let end = region.current_address();
            bounds.push((section.name, start, end));
        }
        region.mark(&end_of_image);

        // Entries run in traversal order; the CRC must see every patch made by section entries
        let crc = region.post_process(&end_of_header, &end_of_image, crc16);
        crc.on_resolve(move |crc| crc_field.resolve(i64::from(*crc)))?;

        let sink = ImageBuffer::shared();
        let summary = region.flatten(&sink, config)?;

        let sections = bounds
            .into_iter()
            .map(|(name, start, end)| {
                let (Some(offset), Some(end)) = (start.value(), end.value()) else {
                    return Err(malformed_error!("Section '{}' was never placed", name));
                };
                Ok(SectionInfo {
                    name,
                    offset,
                    size: end - offset,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // A tolerant build over unresolved fields leaves the CRC placeholder in place
        let crc = crc.value();
        if crc.is_none() && config.enforce_complete {
            return Err(malformed_error!("Snapshot CRC was never computed"));
        }

        let sink = sink.borrow();
        tracing::debug!(size = sink.len(), sections = sections.len(), ?crc, "built snapshot");

        Ok(Snapshot {
            bytes: sink.to_bytes(),
            view: sink.diagnostic_view(),
            crc,
            sections,
            summary,
        })
    }

    /// Builds the snapshot and writes it to `path`.
    ///
    /// Nothing is written unless the build succeeds, and a failed write removes the
    /// partially written file.
    ///
    /// # Errors
    ///
    /// Any error of [`SnapshotBuilder::build`] or [`Snapshot::save`].
    pub fn write_to<P: AsRef<Path>>(self, path: P, config: &FlattenConfig) -> Result<Snapshot> {
        let snapshot = self.build(config)?;
        snapshot.save(path)?;
        Ok(snapshot)
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A built snapshot image.
#[derive(Debug, Clone)]
pub struct Snapshot {
    bytes: Vec<u8>,
    view: DiagnosticView,
    crc: Option<u16>,
    sections: Vec<SectionInfo>,
    summary: FlattenSummary,
}

impl Snapshot {
    /// The image bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// CRC of the image body as stored in the header.
    ///
    /// `None` for tolerant builds whose body still holds unresolved fields; the header then
    /// carries a zero placeholder.
    #[must_use]
    pub fn crc(&self) -> Option<u16> {
        self.crc
    }

    /// Placement of every section, in section order.
    #[must_use]
    pub fn sections(&self) -> &[SectionInfo] {
        &self.sections
    }

    /// Looks up a section by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&SectionInfo> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Field-by-field rendering of the image.
    #[must_use]
    pub fn diagnostic_view(&self) -> &DiagnosticView {
        &self.view
    }

    /// What flattening found, including fields left unresolved by a tolerant build.
    #[must_use]
    pub fn summary(&self) -> &FlattenSummary {
        &self.summary
    }

    /// Parses the header back from the image.
    ///
    /// # Errors
    ///
    /// See [`SnapshotHeader::parse`].
    pub fn header(&self) -> Result<SnapshotHeader> {
        SnapshotHeader::parse(&self.bytes)
    }

    /// Writes the image to `path`.
    ///
    /// # Errors
    ///
    /// Returns the file creation, write or finalization error; the file is removed on
    /// failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = ImageFile::create(path, self.bytes.len() as u64)?;
        file.write_at(0, &self.bytes)?;
        file.finalize()
    }
}
