//! Snapshot images: a header followed by named sections.
//!
//! A snapshot is the file the interpreter loads. Its header describes the image through
//! values only known once the whole image is laid out: the total size, where each section
//! starts, and a CRC over everything after the header. [`SnapshotBuilder`] writes those as
//! forward references and lets flattening resolve them.
//!
//! # Key Components
//!
//! - [`SnapshotBuilder`] - Collects section regions and builds the image
//! - [`Snapshot`] - The built image with section placement and diagnostics
//! - [`SnapshotHeader`] - Parses and verifies the header of an existing image
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use snapforge::image::SnapshotBuilder;
//! use snapforge::{FlattenConfig, Region};
//!
//! let mut builder = SnapshotBuilder::new();
//! builder.add_section("globals", Region::new())?;
//! builder.add_section("bytecode", Region::new())?;
//!
//! // No file is left behind if the build fails
//! let snapshot = builder.write_to("program.snap", &FlattenConfig::strict())?;
//! println!("{} bytes, crc {:04X?}", snapshot.size(), snapshot.crc());
//! # Ok::<(), snapforge::Error>(())
//! ```

mod builder;
mod header;

pub use builder::{SectionInfo, Snapshot, SnapshotBuilder};
pub use header::{
    SnapshotHeader, CRC_OFFSET, HEADER_FIXED_SIZE, SNAPSHOT_MAGIC, SNAPSHOT_VERSION,
};
