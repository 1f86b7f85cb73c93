//! Instance Tree - Structure, anchors and lifecycle notifications.
//!
//! The tree owns every instance through the [`Registry`]. Relationships are
//! ids: each instance stores its parent id and its ordered child ids.
//!
//! # Anchors
//!
//! Realized output is positioned relative to a *predecessor*: the node it must
//! directly follow inside its host parent (`None` means the front). The
//! predecessor is recomputed on demand from the current sibling order:
//!
//! ```text
//! predecessor(x) = last realized node of the nearest previous sibling that has one
//!                  else children_base(parent(x))
//!
//! children_base(host | root)         = None   (front of the node)
//! children_base(fragment | component) = predecessor(owner)
//! ```
//!
//! Fragments and components have no node of their own, so anchor resolution
//! passes through them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::component::Propagation;
use super::instance::{Instance, InstanceKind, InstanceRef, Placement, RenderOptions};
use super::reconcile::{Identity, KindTag, Slot};
use super::registry::{InstanceId, Registry};
use super::removal::Unmount;
use crate::element::{Element, ElementType, Props};
use crate::error::{Result, StructuralError};
use crate::pipeline::Pass;
use crate::types::{HostNode, NodeType};

/// Deferred detachments still waiting for completion, keyed by the lingering
/// node and mapped to the host instance it lingers in.
pub(crate) type DeferredRemovals = Rc<RefCell<HashMap<HostNode, InstanceId>>>;

pub(crate) struct Tree {
    pub(crate) registry: Registry<Instance>,
    root: InstanceId,
    /// Hosts waiting for their one-shot autofocus.
    pub(crate) pending_focus: Vec<InstanceId>,
    pub(crate) deferred: DeferredRemovals,
}

impl Tree {
    /// Create a tree holding only the root instance bound to `container`.
    pub(crate) fn new(
        options: RenderOptions,
        container: HostNode,
    ) -> Result<Self, StructuralError> {
        let mut registry = Registry::new();
        let root = registry.allocate(Instance {
            kind: InstanceKind::Root { container },
            identity: Identity {
                kind: KindTag::Root,
                slot: Slot::Position(0),
            },
            props: Props::new(),
            parent: None,
            namespace: None,
            options,
            children: Vec::new(),
        })?;

        Ok(Self {
            registry,
            root,
            pending_focus: Vec::new(),
            deferred: Rc::new(RefCell::new(HashMap::new())),
        })
    }

    pub(crate) fn root(&self) -> InstanceId {
        self.root
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub(crate) fn instance(&self, id: InstanceId) -> Result<&Instance, StructuralError> {
        self.registry
            .get(id)
            .ok_or(StructuralError::UnknownInstance(id))
    }

    pub(crate) fn instance_mut(
        &mut self,
        id: InstanceId,
    ) -> Result<&mut Instance, StructuralError> {
        self.registry
            .get_mut(id)
            .ok_or(StructuralError::UnknownInstance(id))
    }

    pub(crate) fn get(&self, id: InstanceId) -> Option<InstanceRef<'_>> {
        self.registry.get(id).map(|instance| InstanceRef::new(id, instance))
    }

    pub(crate) fn len(&self) -> usize {
        self.registry.len()
    }

    /// Walk upward from `id` (inclusive) and return the first instance
    /// matching `predicate`.
    pub(crate) fn find(
        &self,
        id: InstanceId,
        predicate: impl Fn(InstanceRef<'_>) -> bool,
    ) -> Option<InstanceId> {
        let mut current = Some(id);
        while let Some(candidate) = current {
            let instance = self.registry.get(candidate)?;
            if predicate(InstanceRef::new(candidate, instance)) {
                return Some(candidate);
            }
            current = instance.parent;
        }
        None
    }

    // =========================================================================
    // Host Parents
    // =========================================================================

    /// Nearest host or root instance, starting at `from` itself.
    pub(crate) fn nearest_host(&self, from: InstanceId) -> Result<InstanceId, StructuralError> {
        let mut current = from;
        loop {
            let instance = self.instance(current)?;
            match instance.kind {
                InstanceKind::Host(_) | InstanceKind::Root { .. } => return Ok(current),
                _ => current = instance.parent.ok_or(StructuralError::MissingParent)?,
            }
        }
    }

    /// Host or root instance whose node holds the realized output of `id`.
    pub(crate) fn host_parent_of(&self, id: InstanceId) -> Result<InstanceId, StructuralError> {
        let parent = self
            .instance(id)?
            .parent
            .ok_or(StructuralError::MissingParent)?;
        self.nearest_host(parent)
    }

    /// Node children of a host or root instance are inserted into.
    pub(crate) fn owned_node(&self, id: InstanceId) -> Result<HostNode, StructuralError> {
        match &self.instance(id)?.kind {
            InstanceKind::Host(state) => Ok(state.node),
            InstanceKind::Root { container } => Ok(*container),
            _ => Err(StructuralError::MissingParent),
        }
    }

    // =========================================================================
    // Anchors
    // =========================================================================

    /// Last node of the realized output of `id`, in host order.
    pub(crate) fn last_realized(&self, id: InstanceId) -> Option<HostNode> {
        let instance = self.registry.get(id)?;
        match instance.kind {
            InstanceKind::Host(_) | InstanceKind::Text { .. } => instance.realized(),
            InstanceKind::Fragment | InstanceKind::Component(_) => instance
                .children
                .iter()
                .rev()
                .find_map(|child| self.last_realized(*child)),
            InstanceKind::Root { .. } => None,
        }
    }

    /// Topmost realized nodes owned by `id`, in host order.
    pub(crate) fn realized_nodes(&self, id: InstanceId, out: &mut Vec<HostNode>) {
        let Some(instance) = self.registry.get(id) else {
            return;
        };
        match instance.realized() {
            Some(node) => out.push(node),
            None => {
                for child in &instance.children {
                    self.realized_nodes(*child, out);
                }
            }
        }
    }

    /// Node the realized output of `id` must directly follow.
    pub(crate) fn predecessor_of(&self, id: InstanceId) -> Result<Option<HostNode>, StructuralError> {
        let parent = self
            .instance(id)?
            .parent
            .ok_or(StructuralError::MissingParent)?;
        let siblings = &self.instance(parent)?.children;
        let position = siblings
            .iter()
            .position(|sibling| *sibling == id)
            .unwrap_or(siblings.len());

        let previous = siblings[..position]
            .iter()
            .rev()
            .find_map(|sibling| self.last_realized(*sibling));
        match previous {
            Some(node) => Ok(Some(node)),
            None => self.children_base(parent),
        }
    }

    fn children_base(&self, owner: InstanceId) -> Result<Option<HostNode>, StructuralError> {
        match self.instance(owner)?.kind {
            InstanceKind::Fragment | InstanceKind::Component(_) => self.predecessor_of(owner),
            _ => Ok(None),
        }
    }

    /// Relocate every realized node of `id`, in order, to directly after
    /// `predecessor`.
    pub(crate) fn move_instance(
        &mut self,
        id: InstanceId,
        predecessor: Option<HostNode>,
    ) -> Result<()> {
        let container = self.owned_node(self.host_parent_of(id)?)?;
        let driver = self.instance(id)?.options.driver.clone();

        let mut nodes = Vec::new();
        self.realized_nodes(id, &mut nodes);
        trace!(instance = %id, nodes = nodes.len(), "moving instance");

        let mut anchor = predecessor;
        for node in nodes {
            driver.with(|d| d.insert(container, node, anchor));
            anchor = Some(node);
        }
        Ok(())
    }

    // =========================================================================
    // Mount / Reconcile Dispatch
    // =========================================================================

    /// Options handed to instances mounted under `owner`.
    pub(crate) fn child_options(&self, owner: InstanceId) -> Result<RenderOptions, StructuralError> {
        let instance = self.instance(owner)?;
        Ok(match &instance.kind {
            InstanceKind::Component(state) => match &state.child_guard {
                Some(guard) => instance.options.with_guard(guard.clone()),
                None => instance.options.clone(),
            },
            _ => instance.options.clone(),
        })
    }

    /// Store `instance` and append it to the children of `parent`.
    pub(crate) fn attach(&mut self, parent: InstanceId, instance: Instance) -> Result<InstanceId> {
        if !self.registry.contains(parent) {
            return Err(StructuralError::MissingParent.into());
        }
        let id = self.registry.allocate(instance)?;
        self.instance_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Mount a fresh instance for `element` as the last child of `parent`.
    pub(crate) fn mount(
        &mut self,
        cx: &Pass,
        parent: InstanceId,
        element: &Element,
        identity: Identity,
    ) -> Result<InstanceId> {
        let placement = Placement {
            parent,
            identity,
            namespace: self.instance(parent)?.namespace.clone(),
            options: self.child_options(parent)?,
        };

        let id = match element.ty() {
            ElementType::Host(tag) => self.mount_host(cx, tag, element, placement)?,
            ElementType::Text(content) => self.mount_text(content, placement)?,
            ElementType::Fragment => {
                let instance = placement.instance(InstanceKind::Fragment, element.props().clone());
                let id = self.attach(parent, instance)?;
                self.reconcile_children(cx, id, element.children())?;
                id
            }
            ElementType::Component(ty) => self.mount_component(cx, ty, element, placement)?,
        };
        trace!(instance = %id, parent = %parent, node_type = ?element.node_type(), "mounted");
        Ok(id)
    }

    /// Update `id` in place against a description of the same identity.
    pub(crate) fn reconcile(&mut self, cx: &Pass, id: InstanceId, element: &Element) -> Result<()> {
        let node_type = self.instance(id)?.node_type();
        match (node_type, element.ty()) {
            (NodeType::Host, ElementType::Host(_)) => self.reconcile_host(cx, id, element),
            (NodeType::Text, ElementType::Text(content)) => self.reconcile_text(id, content),
            (NodeType::Fragment, ElementType::Fragment) => {
                self.instance_mut(id)?.props = element.props().clone();
                self.reconcile_children(cx, id, element.children())
            }
            (NodeType::Component, ElementType::Component(_)) => {
                self.reconcile_component(cx, id, element)
            }
            _ => Ok(()),
        }
    }

    /// Re-run the render logic of a component after a notification.
    pub(crate) fn rerender(&mut self, cx: &Pass, id: InstanceId) -> Result<()> {
        match self.registry.get(id).map(|instance| &instance.kind) {
            Some(InstanceKind::Component(_)) => self.render_component(cx, id),
            Some(_) => Ok(()),
            None => {
                trace!(instance = %id, "ignoring update for removed instance");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Lifecycle Notifications
    // =========================================================================

    /// Bubble a did-mount notification for `node` from the parent of `id`
    /// until a component stops it.
    pub(crate) fn notify_did_mount(&mut self, id: InstanceId, node: HostNode) {
        let mut current = self.registry.get(id).and_then(|instance| instance.parent);
        while let Some(ancestor) = current {
            let Some(instance) = self.registry.get_mut(ancestor) else {
                return;
            };
            match &mut instance.kind {
                InstanceKind::Component(state) => {
                    if let Some(logic) = state.logic.as_mut() {
                        if logic.element_did_mount(node) == Propagation::Stop {
                            return;
                        }
                    }
                }
                InstanceKind::Root { .. } => return,
                _ => {}
            }
            current = instance.parent;
        }
    }

    /// Bubble a will-unmount notification for `node` from the parent of `id`.
    ///
    /// The first component answering anything but [`Unmount::Bubble`] decides.
    /// The root ends the chain with an immediate detach.
    pub(crate) fn notify_will_unmount(&mut self, id: InstanceId, node: HostNode) -> Unmount {
        let mut current = self.registry.get(id).and_then(|instance| instance.parent);
        while let Some(ancestor) = current {
            let Some(instance) = self.registry.get_mut(ancestor) else {
                break;
            };
            match &mut instance.kind {
                InstanceKind::Component(state) => {
                    if let Some(logic) = state.logic.as_mut() {
                        match logic.element_will_unmount(node) {
                            Unmount::Bubble => {}
                            answer => return answer,
                        }
                    }
                }
                InstanceKind::Root { .. } => return Unmount::Handled,
                _ => {}
            }
            current = instance.parent;
        }
        Unmount::Handled
    }

    /// Focus hosts queued for autofocus once their node is connected.
    pub(crate) fn flush_focus(&mut self) {
        for id in std::mem::take(&mut self.pending_focus) {
            let Some(instance) = self.registry.get(id) else {
                continue;
            };
            let Some(node) = instance.realized() else {
                continue;
            };
            let driver = &instance.options.driver;
            if driver.with(|d| d.is_connected(node)) {
                trace!(instance = %id, %node, "autofocus");
                driver.with(|d| d.focus(node));
            }
        }
    }

    /// Detach every node still waiting for a deferred removal right away.
    /// Late completions become no-ops.
    pub(crate) fn clear_deferred(&mut self) {
        let lingering: Vec<HostNode> = self
            .deferred
            .borrow_mut()
            .drain()
            .map(|(node, _)| node)
            .collect();
        let Some(root) = self.registry.get(self.root) else {
            return;
        };
        for node in lingering {
            trace!(%node, "cancelling deferred removal");
            root.options.driver.with(|d| d.remove(node));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::error::Error;
    use crate::testing::Harness;
    use crate::types::Capabilities;

    #[test]
    fn test_find_walks_upward() {
        let harness = Harness::mount(
            Element::host("div").child(Element::fragment([Element::host("span")])),
        );
        let div = harness.top();
        let fragment = harness.renderer.children(div)[0];
        let span = harness.renderer.children(fragment)[0];

        let found = harness
            .renderer
            .find(span, |instance| instance.capabilities().contains(Capabilities::ROOT));
        assert_eq!(found, Some(harness.renderer.root()));

        let host = harness
            .renderer
            .find(fragment, |instance| instance.node_type() == NodeType::Host);
        assert_eq!(host, Some(div));

        let self_match = harness.renderer.find(span, |instance| instance.tag() == Some("span"));
        assert_eq!(self_match, Some(span));
    }

    #[test]
    fn test_anchor_passes_through_empty_fragments() {
        let harness = Harness::mount(Element::host("div").with_children([
            Element::host("a"),
            Element::empty(),
            Element::fragment([Element::empty()]),
            Element::host("b"),
        ]));
        assert_eq!(harness.html(), "<div><a></a><b></b></div>");

        harness.render(Element::host("div").with_children([
            Element::host("a"),
            Element::fragment([Element::text("x")]),
            Element::fragment([Element::fragment([Element::text("y")])]),
            Element::host("b"),
        ]));
        assert_eq!(harness.html(), "<div><a></a>xy<b></b></div>");
    }

    #[test]
    fn test_attach_without_parent_is_structural() {
        let (driver, container) = Harness::driver();
        let mut tree = Tree::new(RenderOptions::new(driver), container).unwrap();

        // A detached fragment has no host parent to resolve.
        let orphan = tree.registry.allocate(Instance {
            kind: InstanceKind::Fragment,
            identity: Identity {
                kind: KindTag::Fragment,
                slot: Slot::Position(0),
            },
            props: Props::new(),
            parent: None,
            namespace: None,
            options: tree.instance(tree.root()).map(|root| root.options.clone()).unwrap(),
            children: Vec::new(),
        })
        .unwrap();

        let element = Element::host("div");
        let result = tree.mount(&Pass::detached(), orphan, &element, Identity::of(&element, 0));
        assert!(matches!(
            result,
            Err(Error::Structural(StructuralError::MissingParent))
        ));
    }

    #[test]
    fn test_unknown_instance_is_structural() {
        let (driver, container) = Harness::driver();
        let mut tree = Tree::new(RenderOptions::new(driver), container).unwrap();
        let root = tree.root();
        let element = Element::host("div");
        let id = tree
            .mount(&Pass::detached(), root, &element, Identity::of(&element, 0))
            .unwrap();
        let _removal = tree.remove(id, true).unwrap();

        assert!(matches!(
            tree.predecessor_of(id),
            Err(StructuralError::UnknownInstance(stale)) if stale == id
        ));
    }
}
