//! # spark-reconciler
//!
//! Declarative UI reconciliation engine for Rust.
//!
//! Application code describes the desired UI as immutable [`Element`] values.
//! The engine keeps a live instance tree mirroring the latest description and
//! turns each new description into the minimal set of create, update, move
//! and remove calls on a pluggable [`Driver`].
//!
//! ## Architecture
//!
//! ```text
//! Element description → reconcile (keyed children) → instance tree → Driver calls
//!                              ▲
//!        store notification ───┘   (component re-render)
//! ```
//!
//! Instances are records in a generational arena addressed by [`InstanceId`].
//! Components re-render when a [`Store`] they subscribed to notifies, and
//! render failures resolve at the nearest [`try_catch`] boundary.
//!
//! ## Modules
//!
//! - [`types`] - Core types (HostNode, Key, NodeType, Capabilities)
//! - [`element`] - Element descriptions and props
//! - [`engine`] - Instance tree, reconciliation, components, removal
//! - [`boundary`] - Guard chain and the Try boundary
//! - [`driver`] - Driver trait and the in-memory driver
//! - [`pipeline`] - Mounting and update scheduling
//! - [`store`] - Subscribable stores

pub mod boundary;
pub mod driver;
pub mod element;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use types::*;

pub use element::{style_attribute, Element, ElementType, Event, Handler, PropValue, Props, RenderFn};

pub use engine::{
    is_editable, resolve_namespace, Component, ComponentType, InstanceId, InstanceRef,
    PendingRemoval, Propagation, Removal, RemovalCompleter, RenderOptions, Scope, Unmount,
    Updater, MATHML_NAMESPACE, SVG_NAMESPACE,
};

pub use boundary::{try_catch, Boundary, Guard, Guarded};

pub use driver::{Driver, DriverHandle, DriverOp, MemoryDriver};

pub use pipeline::{mount, Renderer};

pub use store::{Listener, ListenerId, Store, Subscribable};

pub use error::{Error, StructuralError};
