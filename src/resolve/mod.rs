//! Single-assignment values that can be used before they are known.
//!
//! This module provides [`Resolvable`], the cell every forward reference in an image is built
//! from: jump targets, table offsets, section sizes and checksums are all `Resolvable` values
//! that are written long before the encoder learns what they are.
//!
//! # Key Components
//!
//! - [`Resolvable`] - Shared handle to a value that resolves exactly once
//! - [`Subscription`] - Handle to a queued resolution callback
//! - [`Difference`] - Checked subtraction used by [`Resolvable::subtract`]
//!
//! # Resolution Model
//!
//! Resolution is push-based and synchronous. Resolving a value immediately runs its
//! subscribers in registration order within the same call stack; a subscriber may resolve
//! further values. Each value owns exactly its own subscriber list, so there is no global
//! event bus and no cross-talk between unrelated values.
//!
//! The single-resolution invariant is enforced per value: a second `resolve` fails with
//! [`crate::Error::AlreadyResolved`] and leaves the first resolution untouched. There is no
//! cycle detection; a value that never resolves leaves its dependents pending, which
//! finalization reports as [`crate::Error::Unresolved`].
//!
//! # Examples
//!
//! ```rust
//! use snapforge::Resolvable;
//!
//! let branch_site = Resolvable::<i64>::new();
//! let target = Resolvable::<i64>::new();
//! let relative = target.subtract(&branch_site)?;
//!
//! branch_site.resolve(0x10)?;
//! target.resolve(0x04)?;
//! assert_eq!(relative.value(), Some(-12));
//! # Ok::<(), snapforge::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! Values are built on `Rc<RefCell<_>>` and are neither [`Send`] nor [`Sync`]. Encoding is a
//! single-threaded, deterministic computation.

mod combinators;
mod value;

pub use combinators::Difference;
pub use value::{Resolvable, Subscriber, Subscription};
