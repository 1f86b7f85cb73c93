//! Stores - The subscribe/unsubscribe contract components re-render on.
//!
//! The engine only needs [`Subscribable`]: a way to register a listener and
//! to remove it again. Listeners are called synchronously on the notifying
//! thread. [`Store`] is a minimal observable value implementing the contract.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::Store;
//!
//! let todos = Store::new(vec!["write docs".to_string()]);
//! todos.update(|list| list.push("ship".to_string()));
//! assert_eq!(todos.with(|list| list.len()), 2);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Callback invoked on every notification.
pub type Listener = Rc<dyn Fn()>;

/// Handle returned by [`Subscribable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Anything a component can subscribe to.
pub trait Subscribable {
    fn subscribe(&self, listener: Listener) -> ListenerId;

    /// Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);
}

// =============================================================================
// Store
// =============================================================================

struct StoreInner<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_id: Cell<u64>,
}

/// Shared observable value. Clones share the same value and listeners.
pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                value: RefCell::new(value),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Read the value without cloning it.
    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.inner.value.borrow())
    }

    /// Replace the value and notify.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.notify();
    }

    /// Mutate the value in place and notify.
    pub fn update(&self, change: impl FnOnce(&mut T)) {
        change(&mut self.inner.value.borrow_mut());
        self.notify();
    }

    /// Call every listener registered at the moment of the call.
    pub fn notify(&self) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl<T: Clone> Store<T> {
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T> Subscribable for Store<T> {
    fn subscribe(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &*self.inner.value.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
