//! Post-processing: derivations over finished byte ranges.
//!
//! Some image bytes depend on other bytes of the same image: checksums, digests, lengths
//! read back from a finished section. A post-processing entry names a byte range by two
//! offset markers and a derivation over the bytes in that range. Entries run after the whole
//! region tree has been traversed, in registration order, and resolve a [`Resolvable`] with
//! the derived value. That value can in turn be written earlier in the image as a deferred
//! field, which is how a header carries the CRC of the body that follows it.
//!
//! # Key Components
//!
//! - [`crate::Region::post_process`] - Registers an entry and returns its result handle
//! - [`checksum`] - Byte sums and CRC-16/CCITT-FALSE
//! - [`digest`] - SHA-1 and MD5 digests
//!
//! # Examples
//!
//! ```rust
//! use snapforge::{format::U8, postprocess::checksum, FlattenConfig, ImageBuffer, Region};
//!
//! let mut region = Region::new();
//! let start = region.current_address();
//! region.write_bytes(&[1, 2, 3, 4, 5], None);
//! let end = region.current_address();
//! let sum = region.post_process(&start, &end, checksum::sum8);
//! region.write_fixed(U8, sum.map(|s| i64::from(*s)), Some("checksum"))?;
//!
//! let sink = ImageBuffer::shared();
//! region.flatten(&sink, &FlattenConfig::strict())?;
//! assert_eq!(sink.borrow().as_slice(), &[1, 2, 3, 4, 5, 15]);
//! # Ok::<(), snapforge::Error>(())
//! ```

pub mod checksum;
pub mod digest;

use std::{fmt, rc::Rc};

use crate::{output::Offset, resolve::Resolvable, Result};

/// A registered derivation over `[start, end)`, type-erased over its result.
#[derive(Clone)]
pub(crate) struct PostProcessEntry {
    pub(crate) start: Resolvable<Offset>,
    pub(crate) end: Resolvable<Offset>,
    apply: Rc<dyn Fn(&[u8]) -> Result<()>>,
}

impl PostProcessEntry {
    /// Creates an entry together with the handle its result resolves.
    pub(crate) fn new<T, D>(
        start: &Resolvable<Offset>,
        end: &Resolvable<Offset>,
        derive: D,
    ) -> (Self, Resolvable<T>)
    where
        T: Clone + fmt::Debug + PartialEq + 'static,
        D: Fn(&[u8]) -> T + 'static,
    {
        let result = Resolvable::derived();
        let target = result.clone();
        let entry = Self {
            start: start.clone(),
            end: end.clone(),
            apply: Rc::new(move |bytes: &[u8]| target.settle_or_confirm(derive(bytes))),
        };
        (entry, result)
    }

    /// Both bounds, if resolved.
    pub(crate) fn bounds(&self) -> (Option<Offset>, Option<Offset>) {
        (self.start.value(), self.end.value())
    }

    /// Runs the derivation over the bytes of the range and resolves the result.
    pub(crate) fn apply(&self, bytes: &[u8]) -> Result<()> {
        (self.apply)(bytes)
    }
}

impl fmt::Debug for PostProcessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostProcessEntry")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}
