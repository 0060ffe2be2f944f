//! The single-assignment value cell and its subscription list.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{Error, Result};

/// Callback invoked with the value once it resolves.
///
/// Callbacks may trigger further resolutions; errors they return are collected and surfaced
/// to whoever called [`Resolvable::resolve`].
pub type Subscriber<T> = Box<dyn FnOnce(&T) -> Result<()>>;

/// Handle to a queued subscriber, used to remove it again with [`Resolvable::unsubscribe`].
///
/// Subscriptions that were served immediately (the value was already resolved) are inert;
/// unsubscribing them is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

impl Subscription {
    const INERT: Subscription = Subscription(0);
}

struct Slot<T> {
    value: Option<T>,
    subscribers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
    derived: bool,
}

/// A value that may not be known yet and resolves exactly once.
///
/// `Resolvable` is a cheap shared handle: clones observe and resolve the same cell. The
/// component that discovers the value owns its resolution; any number of readers may
/// subscribe to it or derive further values from it.
///
/// # Examples
///
/// ```rust
/// use snapforge::Resolvable;
///
/// let target = Resolvable::<usize>::new();
/// let shifted = target.map(|offset| offset + 4);
///
/// assert!(!shifted.is_resolved());
/// target.resolve(12)?;
/// assert_eq!(shifted.value(), Some(16));
/// # Ok::<(), snapforge::Error>(())
/// ```
pub struct Resolvable<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Resolvable<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> Resolvable<T> {
    /// Creates an unresolved value.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(None, false)
    }

    /// Creates a value that is resolved from the start.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self::with_state(Some(value), false)
    }

    pub(crate) fn derived() -> Self {
        Self::with_state(None, true)
    }

    pub(crate) fn derived_with(value: T) -> Self {
        Self::with_state(Some(value), true)
    }

    fn with_state(value: Option<T>, derived: bool) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                value,
                subscribers: Vec::new(),
                next_id: 1,
                derived,
            })),
        }
    }

    /// Resolves the value and notifies every queued subscriber in registration order.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyResolved`] if the value already holds a resolution; it is left as-is
    /// - [`Error::DerivedResolve`] if this value is derived from another one
    /// - Any error returned by a subscriber; the value remains resolved and all remaining
    ///   subscribers still run
    pub fn resolve(&self, value: T) -> Result<()> {
        if self.slot.borrow().derived {
            return Err(Error::DerivedResolve);
        }
        self.settle(value)
    }

    pub(crate) fn settle(&self, value: T) -> Result<()> {
        let subscribers = {
            let mut slot = self.slot.borrow_mut();
            if let Some(existing) = &slot.value {
                return Err(Error::AlreadyResolved {
                    existing: format!("{existing:?}"),
                    attempted: format!("{value:?}"),
                });
            }
            slot.value = Some(value.clone());
            std::mem::take(&mut slot.subscribers)
        };

        let errors = subscribers
            .into_iter()
            .filter_map(|(_, subscriber)| subscriber(&value).err())
            .collect();

        match Error::from_many(errors) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Registers a callback for the resolution of this value.
    ///
    /// If the value is already resolved the callback runs immediately and its result is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the callback's error when it runs immediately.
    pub fn on_resolve<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnOnce(&T) -> Result<()> + 'static,
    {
        let current = self.slot.borrow().value.clone();
        match current {
            Some(value) => {
                callback(&value)?;
                Ok(Subscription::INERT)
            }
            None => Ok(self.queue(callback)),
        }
    }

    pub(crate) fn queue<F>(&self, subscriber: F) -> Subscription
    where
        F: FnOnce(&T) -> Result<()> + 'static,
    {
        let mut slot = self.slot.borrow_mut();
        let id = slot.next_id;
        slot.next_id += 1;
        slot.subscribers.push((id, Box::new(subscriber)));
        Subscription(id)
    }

    /// Removes a queued subscriber. Returns `true` if it was still queued.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut slot = self.slot.borrow_mut();
        let before = slot.subscribers.len();
        slot.subscribers.retain(|(id, _)| *id != subscription.0);
        slot.subscribers.len() != before
    }

    /// Returns a copy of the value, or `None` while unresolved.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.slot.borrow().value.clone()
    }

    /// Returns `true` once the value has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().value.is_some()
    }

    /// Returns `true` for values driven by a source: `map`, `bind` and `subtract` results,
    /// region markers and post-processing results.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.slot.borrow().derived
    }

    /// Number of subscribers still waiting for the resolution.
    #[must_use]
    pub fn pending_subscribers(&self) -> usize {
        self.slot.borrow().subscribers.len()
    }

    /// Clears the resolution so the value can be resolved again.
    ///
    /// Intended for iterative rebuilds only, and only sound before anything has derived from
    /// or subscribed to this value. Derived values and fields written from it keep their old
    /// resolution and are not notified of the new one; derive again from the value after
    /// resolving it anew.
    pub fn unresolve(&self) {
        self.slot.borrow_mut().value = None;
    }

    /// Returns `true` if both handles refer to the same cell.
    #[must_use]
    pub fn same_as(&self, other: &Resolvable<T>) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: Clone + fmt::Debug + PartialEq + 'static> Resolvable<T> {
    /// Resolves the value unless it already holds an equal resolution.
    ///
    /// Markers and post-processing results use this so the same region tree can be flattened
    /// repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyResolved`] if the value holds a different resolution, plus
    /// anything [`Resolvable::resolve`] reports.
    pub fn resolve_or_confirm(&self, value: T) -> Result<()> {
        if self.holds(&value) {
            return Ok(());
        }
        self.resolve(value)
    }

    pub(crate) fn settle_or_confirm(&self, value: T) -> Result<()> {
        if self.holds(&value) {
            return Ok(());
        }
        self.settle(value)
    }

    fn holds(&self, value: &T) -> bool {
        self.slot.borrow().value.as_ref() == Some(value)
    }
}

impl<T: Clone + fmt::Debug + 'static> Default for Resolvable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolvable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot.borrow().value {
            Some(value) => f.debug_tuple("Resolved").field(value).finish(),
            None => f.write_str("Pending"),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> From<T> for Resolvable<T> {
    fn from(value: T) -> Self {
        Self::resolved(value)
    }
}
