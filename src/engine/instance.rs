//! Instance records - One live node of the shadow tree.
//!
//! Every instance kind shares one record shape and dispatches on
//! [`InstanceKind`]. Kind-specific state lives in the variant:
//!
//! ```text
//! Root      { container }           the mount target, never removed
//! Host      { tag, node, adapter }  one realized platform element
//! Text      { node, content }       one realized text node
//! Fragment                           no realized node, transparent for anchors
//! Component { type, logic, ... }    user render logic owning its output
//! ```

use std::fmt;

use super::component::ComponentState;
use super::host::HostState;
use super::reconcile::{Identity, Slot};
use super::registry::InstanceId;
use crate::boundary::Guard;
use crate::driver::DriverHandle;
use crate::element::Props;
use crate::types::{Capabilities, HostNode, Key, NodeType};

// =============================================================================
// Render Options
// =============================================================================

/// Configuration inherited down the tree.
///
/// Options are cloned and overridden at the root and at boundaries, never
/// mutated in place, so instances mounted earlier keep what they were given.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Active failure-catching guard.
    pub guard: Guard,
    pub driver: DriverHandle,
}

impl RenderOptions {
    /// Options with the passthrough guard.
    pub fn new(driver: DriverHandle) -> Self {
        Self {
            guard: Guard::Passthrough,
            driver,
        }
    }

    pub fn with_guard(&self, guard: Guard) -> Self {
        Self {
            guard,
            driver: self.driver.clone(),
        }
    }
}

// =============================================================================
// Instance
// =============================================================================

pub(crate) enum InstanceKind {
    Root { container: HostNode },
    Host(HostState),
    Text { node: HostNode, content: String },
    Fragment,
    Component(ComponentState),
}

pub(crate) struct Instance {
    pub(crate) kind: InstanceKind,
    pub(crate) identity: Identity,
    /// Props of the last applied description.
    pub(crate) props: Props,
    /// Non-owning back link. `None` only for the root.
    pub(crate) parent: Option<InstanceId>,
    pub(crate) namespace: Option<String>,
    pub(crate) options: RenderOptions,
    /// Owned children in sibling order.
    pub(crate) children: Vec<InstanceId>,
}

impl Instance {
    pub(crate) fn node_type(&self) -> NodeType {
        match self.kind {
            InstanceKind::Root { .. } => NodeType::Root,
            InstanceKind::Host(_) => NodeType::Host,
            InstanceKind::Text { .. } => NodeType::Text,
            InstanceKind::Fragment => NodeType::Fragment,
            InstanceKind::Component(_) => NodeType::Component,
        }
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        let capabilities = self.node_type().capabilities();
        match &self.kind {
            InstanceKind::Component(state) if state.ty.is_boundary() => {
                capabilities | Capabilities::BOUNDARY
            }
            _ => capabilities,
        }
    }

    /// The node this instance realizes itself, if any.
    pub(crate) fn realized(&self) -> Option<HostNode> {
        match &self.kind {
            InstanceKind::Host(state) => Some(state.node),
            InstanceKind::Text { node, .. } => Some(*node),
            _ => None,
        }
    }
}

/// Everything a fresh instance inherits from its position.
pub(crate) struct Placement {
    pub(crate) parent: InstanceId,
    pub(crate) identity: Identity,
    pub(crate) namespace: Option<String>,
    pub(crate) options: RenderOptions,
}

impl Placement {
    pub(crate) fn instance(self, kind: InstanceKind, props: Props) -> Instance {
        Instance {
            kind,
            identity: self.identity,
            props,
            parent: Some(self.parent),
            namespace: self.namespace,
            options: self.options,
            children: Vec::new(),
        }
    }
}

// =============================================================================
// Instance Ref
// =============================================================================

/// Read-only view of a live instance.
#[derive(Clone, Copy)]
pub struct InstanceRef<'a> {
    id: InstanceId,
    instance: &'a Instance,
}

impl<'a> InstanceRef<'a> {
    pub(crate) fn new(id: InstanceId, instance: &'a Instance) -> Self {
        Self { id, instance }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn node_type(&self) -> NodeType {
        self.instance.node_type()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.instance.capabilities()
    }

    pub fn props(&self) -> &'a Props {
        &self.instance.props
    }

    /// Explicit key, when the instance was described with one.
    pub fn key(&self) -> Option<&'a Key> {
        match &self.instance.identity.slot {
            Slot::Keyed(key) => Some(key),
            Slot::Position(_) => None,
        }
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.instance.parent
    }

    pub fn children(&self) -> &'a [InstanceId] {
        &self.instance.children
    }

    /// Realized node of host and text instances, or the container of the root.
    pub fn host_node(&self) -> Option<HostNode> {
        match &self.instance.kind {
            InstanceKind::Root { container } => Some(*container),
            _ => self.instance.realized(),
        }
    }

    pub fn tag(&self) -> Option<&'a str> {
        match &self.instance.kind {
            InstanceKind::Host(state) => Some(&state.tag),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&'a str> {
        match &self.instance.kind {
            InstanceKind::Text { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Option<&'a str> {
        self.instance.namespace.as_deref()
    }

    /// Guard this instance was mounted with.
    pub fn guard(&self) -> &'a Guard {
        &self.instance.options.guard
    }

    pub fn component_name(&self) -> Option<&'a str> {
        match &self.instance.kind {
            InstanceKind::Component(state) => Some(state.ty.name()),
            _ => None,
        }
    }

    /// Guard a component currently forwards to the children it mounts.
    pub fn child_guard(&self) -> Option<&'a Guard> {
        match &self.instance.kind {
            InstanceKind::Component(state) => Some(
                state
                    .child_guard
                    .as_ref()
                    .unwrap_or(&self.instance.options.guard),
            ),
            _ => None,
        }
    }
}

impl fmt::Debug for InstanceRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRef")
            .field("id", &self.id)
            .field("node_type", &self.node_type())
            .field("children", &self.children())
            .finish()
    }
}
