// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # snapforge
//!
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/snapforge/blob/main/LICENSE-APACHE)
//!
//! A deferred-value binary encoder for bytecode snapshot images. `snapforge` assembles the
//! image a small embedded script interpreter loads, in a single pass, while many of its bytes
//! depend on addresses, sizes and checksums that are only known once encoding is nearly done.
//!
//! ## Features
//!
//! - **🔗 Forward references** - Write fields before their values exist; they are patched in
//!   place exactly once, whatever order values resolve in
//! - **📏 Stable layout** - Unknown fields occupy zero placeholders of their final width, so
//!   patching never shifts an offset
//! - **🛡️ Loud range checks** - Every integer field range-checks its value; nothing is ever
//!   truncated
//! - **🧮 Post-processing** - Checksums and digests over finished ranges, patched back into
//!   headers ahead of them
//! - **🔍 Diagnostics** - An offset-indexed rendering of every field, including partially
//!   resolved builds
//! - **💾 Safe output** - Memory-mapped image files that vanish if a build fails
//!
//! ## Quick Start
//!
//! ```rust
//! use snapforge::prelude::*;
//!
//! let mut region = Region::new();
//! let end = Resolvable::<Offset>::new();
//!
//! // Total size, written before it is known
//! region.write_fixed(U16Le, end.as_i64()?, Some("size"))?;
//! region.write_text("main", Some("name"))?;
//! region.mark(&end);
//!
//! let sink = ImageBuffer::shared();
//! region.flatten(&sink, &FlattenConfig::strict())?;
//! assert_eq!(sink.borrow().as_slice(), &[0x07, 0x00, b'm', b'a', b'i', b'n', 0x00]);
//! # Ok::<(), snapforge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! The crate is organized bottom-up:
//!
//! - [`resolve`] - [`Resolvable`] values: single assignment, ordered subscribers, `map`,
//!   `bind` and `subtract`
//! - [`format`] - Field formats: encoders, zero placeholders and diagnostic rendering
//! - [`region`] - [`Region`] segment trees, flattening and finalization
//! - [`postprocess`] - Range derivations such as CRC-16 and SHA-1
//! - [`output`] - [`OutputSink`], [`ImageBuffer`] and [`ImageFile`]
//! - [`bytecode`] - Instruction encoding, relative branches and the short-call table
//! - [`image`] - Snapshot header and section assembly
//!
//! ## Threading
//!
//! Encoding is single-threaded and synchronous. Values are shared through `Rc<RefCell<_>>`
//! and none of the core types are [`Send`]. Resolution callbacks run on the resolving call
//! stack, and no internal borrow is held while they run, so a callback may resolve further
//! values.
//!
//! ## Logging
//!
//! The crate emits `tracing` events at `debug` and `trace` level: flattening start and end,
//! unresolved field counts, post-processing skips and file finalization. Install any
//! `tracing` subscriber to see them.
#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use snapforge::prelude::*;
///
/// let mut region = Region::new();
/// region.write_fixed(U8, 1, None)?;
/// assert_eq!(region.to_bytes(&FlattenConfig::strict())?, vec![1]);
/// # Ok::<(), snapforge::Error>(())
/// ```
pub mod prelude;

pub mod bytecode;
pub mod format;
pub mod image;
pub mod output;
pub mod postprocess;
pub mod region;
pub mod resolve;

/// `snapforge` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `snapforge` Error type
///
/// Every fallible operation of the crate reports one of its variants. Finalization collects
/// several failures into [`Error::Aggregate`].
pub use error::{Error, UnresolvedField};

pub use output::{
    DiagnosticRow, DiagnosticView, ImageBuffer, ImageFile, Labelled, Offset, OutputSink,
    SharedSink,
};
pub use region::{
    Checkpoint, FlattenConfig, FlattenObserver, FlattenSummary, Layout, NoopObserver, Region,
    TracingObserver,
};
pub use resolve::{Difference, Resolvable, Subscriber, Subscription};
