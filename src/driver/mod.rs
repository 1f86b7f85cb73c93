//! Driver Boundary - Platform mutations behind one trait.
//!
//! The engine never touches platform nodes. Everything it needs goes through
//! a [`Driver`]: create a node, change its attributes, properties, handlers or
//! text, and place it relative to a predecessor inside a parent.
//!
//! All operations are synchronous, and repeating an identical call leaves the
//! structure unchanged.

pub mod memory;

pub use memory::{DriverOp, MemoryDriver};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::element::Handler;
use crate::types::HostNode;

/// Platform binding used to realize host instances.
pub trait Driver {
    /// Create a detached element. `namespace` is `None` for the default one.
    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> HostNode;

    fn create_text(&mut self, content: &str) -> HostNode;

    fn set_text(&mut self, node: HostNode, content: &str);

    fn set_attribute(&mut self, node: HostNode, name: &str, value: &str);

    fn remove_attribute(&mut self, node: HostNode, name: &str);

    /// Set a live property (as opposed to the serialized attribute).
    fn set_property(&mut self, node: HostNode, name: &str, value: &str);

    /// Current value of a live property.
    fn property(&self, node: HostNode, name: &str) -> Option<String>;

    /// Install or clear the handler for an event (`onclick`, `onchange`, ...).
    fn set_handler(&mut self, node: HostNode, name: &str, handler: Option<Handler>);

    /// Place `node` inside `parent` directly after `predecessor`, or first
    /// when there is none. A node already attached somewhere is moved.
    fn insert(&mut self, parent: HostNode, node: HostNode, predecessor: Option<HostNode>);

    /// Detach `node` from its parent.
    fn remove(&mut self, node: HostNode);

    fn focus(&mut self, node: HostNode);

    /// Whether `node` is attached to a live document.
    fn is_connected(&self, node: HostNode) -> bool;
}

// =============================================================================
// Driver Handle
// =============================================================================

/// Shared handle to the driver of a tree.
#[derive(Clone)]
pub struct DriverHandle(Rc<RefCell<dyn Driver>>);

impl DriverHandle {
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self(Rc::new(RefCell::new(driver)))
    }

    /// Wrap a driver the caller keeps a typed handle to.
    pub fn from_shared<D: Driver + 'static>(driver: Rc<RefCell<D>>) -> Self {
        Self(driver)
    }

    /// Borrow the driver for one call.
    pub fn with<R>(&self, call: impl FnOnce(&mut dyn Driver) -> R) -> R {
        call(&mut *self.0.borrow_mut())
    }
}

impl fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DriverHandle(..)")
    }
}
