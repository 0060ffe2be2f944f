//! Memory-mapped image file with all-or-nothing finalization.
//!
//! [`ImageFile`] backs image output on disk. The file is created at its final size, mapped
//! into memory, written at arbitrary offsets and flushed by [`ImageFile::finalize`]. If the
//! handle is dropped before finalization (a failed build, a panic during encoding) the file is
//! removed again, so an aborted image generation never leaves a partial snapshot behind.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use snapforge::ImageFile;
//!
//! let mut file = ImageFile::create("program.snap", 6)?;
//! file.write_at(0, &[0x53, 0x4E])?;
//! file.write_u32_le_at(2, 0x0000_0100)?;
//! file.finalize()?;
//! # Ok::<(), snapforge::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`ImageFile`] holds a mutable mapping and is meant to be written from a single thread.

use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use crate::{Error, Result};

/// A memory-mapped output file that is deleted unless finalized.
pub struct ImageFile {
    /// The memory mapping of the target file, absent for empty images
    mmap: Option<MmapMut>,

    /// The target path
    target_path: PathBuf,

    /// Whether the file has been finalized
    finalized: bool,
}

impl ImageFile {
    /// Creates the target file with the given size and maps it into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteMmapFailed`] if the file cannot be created, sized or mapped.
    pub fn create<P: AsRef<Path>>(target_path: P, size: u64) -> Result<Self> {
        let target_path = target_path.as_ref().to_path_buf();

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target_path)
            .map_err(|e| Error::WriteMmapFailed {
                message: format!("Failed to create target file: {e}"),
            })?;

        file.set_len(size).map_err(|e| Error::WriteMmapFailed {
            message: format!("Failed to set file size: {e}"),
        })?;

        // Zero-length mappings are rejected by most platforms
        let mmap = if size == 0 {
            None
        } else {
            let mapping = unsafe {
                MmapOptions::new()
                    .map_mut(&file)
                    .map_err(|e| Error::WriteMmapFailed {
                        message: format!("Failed to create memory mapping: {e}"),
                    })?
            };
            Some(mapping)
        };

        tracing::debug!(path = %target_path.display(), size, "created image file");

        Ok(Self {
            mmap,
            target_path,
            finalized: false,
        })
    }

    /// Writes `data` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the write would exceed the file size.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let size = self.size() as usize;
        let start = offset as usize;
        let end = start.checked_add(data.len()).unwrap_or(usize::MAX);

        if end > size {
            return Err(Error::OutOfBounds {
                offset: start,
                len: data.len(),
                size,
            });
        }

        if let Some(mmap) = &mut self.mmap {
            mmap[start..end].copy_from_slice(data);
        }
        Ok(())
    }

    /// Writes a little-endian `u16` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the write would exceed the file size.
    pub fn write_u16_le_at(&mut self, offset: u64, value: u16) -> Result<()> {
        self.write_at(offset, &value.to_le_bytes())
    }

    /// Writes a little-endian `u32` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the write would exceed the file size.
    pub fn write_u32_le_at(&mut self, offset: u64, value: u32) -> Result<()> {
        self.write_at(offset, &value.to_le_bytes())
    }

    /// Total size of the file in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.mmap.as_ref().map_or(0, |mmap| mmap.len() as u64)
    }

    /// Path of the file being written.
    #[must_use]
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Flushes the mapping and keeps the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFinalizationFailed`] if the flush fails; the file is removed.
    pub fn finalize(mut self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush().map_err(|e| Error::WriteFinalizationFailed {
                message: format!("Failed to flush memory mapping: {e}"),
            })?;
        }

        self.finalized = true;
        tracing::debug!(path = %self.target_path.display(), "finalized image file");
        Ok(())
    }
}

impl Drop for ImageFile {
    fn drop(&mut self) {
        if !self.finalized {
            // Release the mapping before removing the file
            self.mmap = None;
            let _ = std::fs::remove_file(&self.target_path);
            tracing::debug!(path = %self.target_path.display(), "removed unfinalized image file");
        }
    }
}
