//! Derived values: `map`, `bind` and `subtract`.
//!
//! A derived value resolves when its source does, transitively and within the same call
//! stack. Derived values reject direct resolution with [`crate::Error::DerivedResolve`].

use std::fmt;

use crate::{resolve::Resolvable, Error, Result};

/// Numeric types that [`Resolvable::subtract`] can operate on.
///
/// The difference is checked: an underflow fails the resolution with
/// [`Error::ValueOutOfRange`] instead of wrapping.
pub trait Difference: Sized {
    /// Computes `self - other`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOutOfRange`] when the result does not fit the type.
    fn difference(&self, other: &Self) -> Result<Self>;
}

macro_rules! impl_difference {
    ($($ty:ty),+) => {
        $(
            impl Difference for $ty {
                fn difference(&self, other: &Self) -> Result<Self> {
                    self.checked_sub(*other).ok_or_else(|| Error::ValueOutOfRange {
                        value: format!("{self} - {other}"),
                        format: stringify!($ty),
                    })
                }
            }
        )+
    };
}

impl_difference!(u16, u32, u64, usize, i16, i32, i64, isize);

impl<T: Clone + fmt::Debug + 'static> Resolvable<T> {
    /// Derives a value that resolves to `f(value)` once this value resolves.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use snapforge::Resolvable;
    ///
    /// let index = Resolvable::<u8>::new();
    /// let entry_offset = index.map(|i| usize::from(*i) * 3);
    ///
    /// index.resolve(2)?;
    /// assert_eq!(entry_offset.value(), Some(6));
    /// # Ok::<(), snapforge::Error>(())
    /// ```
    pub fn map<U, F>(&self, f: F) -> Resolvable<U>
    where
        U: Clone + fmt::Debug + 'static,
        F: FnOnce(&T) -> U + 'static,
    {
        if let Some(value) = self.value() {
            return Resolvable::derived_with(f(&value));
        }

        let derived = Resolvable::derived();
        let target = derived.clone();
        self.queue(move |value| target.settle(f(value)));
        derived
    }

    /// Like [`Resolvable::map`], for derivations that can fail.
    ///
    /// # Errors
    ///
    /// Returns the error of `f` when this value is already resolved. Later failures are
    /// reported by the `resolve` call that triggered them, leaving the derived value pending.
    pub fn try_map<U, F>(&self, f: F) -> Result<Resolvable<U>>
    where
        U: Clone + fmt::Debug + 'static,
        F: FnOnce(&T) -> Result<U> + 'static,
    {
        if let Some(value) = self.value() {
            return Ok(Resolvable::derived_with(f(&value)?));
        }

        let derived = Resolvable::derived();
        let target = derived.clone();
        self.queue(move |value| target.settle(f(value)?));
        Ok(derived)
    }

    /// Derives a value that follows a second resolvable chosen by this one.
    ///
    /// Once this value resolves, `f` picks another [`Resolvable`]; the derived value resolves
    /// when that one does. Used for chained lookups such as "the entry at this index, once
    /// the table is placed".
    ///
    /// # Examples
    ///
    /// ```rust
    /// use snapforge::Resolvable;
    ///
    /// let table = vec![Resolvable::<usize>::new(), Resolvable::new()];
    /// let slots = table.clone();
    /// let chosen = Resolvable::<usize>::new();
    /// let address = chosen.bind(move |i| slots[*i].clone());
    ///
    /// chosen.resolve(1)?;
    /// assert!(!address.is_resolved());
    /// table[1].resolve(0x40)?;
    /// assert_eq!(address.value(), Some(0x40));
    /// # Ok::<(), snapforge::Error>(())
    /// ```
    pub fn bind<U, F>(&self, f: F) -> Resolvable<U>
    where
        U: Clone + fmt::Debug + 'static,
        F: FnOnce(&T) -> Resolvable<U> + 'static,
    {
        match self.value() {
            Some(value) => follow(&f(&value)),
            None => {
                let derived = Resolvable::derived();
                let target = derived.clone();
                self.queue(move |value| {
                    let inner = f(value);
                    inner
                        .on_resolve(move |resolved| target.settle(resolved.clone()))
                        .map(|_| ())
                });
                derived
            }
        }
    }

    /// Like [`Resolvable::bind`], for selections that can fail.
    ///
    /// # Errors
    ///
    /// Returns the error of `f` when this value is already resolved.
    pub fn try_bind<U, F>(&self, f: F) -> Result<Resolvable<U>>
    where
        U: Clone + fmt::Debug + 'static,
        F: FnOnce(&T) -> Result<Resolvable<U>> + 'static,
    {
        match self.value() {
            Some(value) => Ok(follow(&f(&value)?)),
            None => {
                let derived = Resolvable::derived();
                let target = derived.clone();
                self.queue(move |value| {
                    let inner = f(value)?;
                    inner
                        .on_resolve(move |resolved| target.settle(resolved.clone()))
                        .map(|_| ())
                });
                Ok(derived)
            }
        }
    }
}

impl<T: Clone + fmt::Debug + Difference + 'static> Resolvable<T> {
    /// Derives `self - other`, resolving once both operands are known.
    ///
    /// Typically used to compute byte lengths from two address markers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOutOfRange`] if both operands are already known and the
    /// difference underflows. Later underflows are reported by the triggering `resolve`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use snapforge::Resolvable;
    ///
    /// let start = Resolvable::<usize>::new();
    /// let end = Resolvable::<usize>::new();
    /// let length = end.subtract(&start)?;
    ///
    /// end.resolve(40)?;
    /// start.resolve(24)?;
    /// assert_eq!(length.value(), Some(16));
    /// # Ok::<(), snapforge::Error>(())
    /// ```
    pub fn subtract(&self, other: &Resolvable<T>) -> Result<Resolvable<T>> {
        let other = other.clone();
        self.try_bind(move |minuend| {
            let minuend = minuend.clone();
            other.try_map(move |subtrahend| minuend.difference(subtrahend))
        })
    }
}

impl Resolvable<usize> {
    /// Derives the `i64` field value of an offset, for writing it through an integer format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOutOfRange`] if the offset is already known and exceeds `i64`.
    pub fn as_i64(&self) -> Result<Resolvable<i64>> {
        self.try_map(|offset| {
            i64::try_from(*offset).map_err(|_| Error::ValueOutOfRange {
                value: offset.to_string(),
                format: "i64",
            })
        })
    }
}

/// Returns a derived value mirroring `inner`.
fn follow<U: Clone + fmt::Debug + 'static>(inner: &Resolvable<U>) -> Resolvable<U> {
    if let Some(value) = inner.value() {
        return Resolvable::derived_with(value);
    }

    let derived = Resolvable::derived();
    let target = derived.clone();
    inner.queue(move |value| target.settle(value.clone()));
    derived
}
