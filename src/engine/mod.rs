//! Reconciliation Engine - The live instance tree.
//!
//! The engine manages the shadow tree mirroring the latest element
//! descriptions:
//! - Registry: generational arena of instances, stable [`InstanceId`]s
//! - Tree: parent/child links, anchors, `find`, lifecycle notifications
//! - Reconcile: keyed/positional children diffing
//! - Host / Component: the two kinds with behaviour of their own
//! - Removal: descendant-first teardown and deferred detachment
//!
//! # Architecture
//!
//! Instances are NOT linked objects. They are records in an arena, and every
//! relation is an id:
//!
//! ```text
//! #0 Root      (parent=-,  children=[#1])
//! #1 Host div  (parent=#0, children=[#2, #3])
//! #2 Text      (parent=#1)
//! #3 Component (parent=#1, children=[#4])
//! #4 Fragment  (parent=#3, children=[])
//! ```
//!
//! Upward walks and anchor lookups are plain index lookups, and removing an
//! instance can never leave a dangling reference: stale ids simply stop
//! resolving.

mod component;
mod host;
mod instance;
mod reconcile;
mod registry;
mod removal;
mod tree;

pub use component::{Component, ComponentType, Propagation, Scope, Updater};
pub use host::{is_editable, resolve_namespace, MATHML_NAMESPACE, SVG_NAMESPACE};
pub use instance::{InstanceRef, RenderOptions};
pub use registry::InstanceId;
pub use removal::{PendingRemoval, Removal, RemovalCompleter, Unmount};

pub(crate) use host::{ChangeProbe, ValueStrategy};
pub(crate) use tree::Tree;
