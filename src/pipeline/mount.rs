//! Mount API - Root instance lifecycle.
//!
//! [`mount`] binds a tree to a container node owned by the driver and renders
//! the top-level element into it. The returned [`Renderer`] re-renders the
//! top-level element, inspects the instance tree and tears it down again.
//!
//! # Example
//!
//! ```ignore
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use spark_reconciler::{mount, DriverHandle, Element, MemoryDriver};
//!
//! let driver = Rc::new(RefCell::new(MemoryDriver::new()));
//! let container = driver.borrow_mut().create_container();
//!
//! let renderer = mount(
//!     DriverHandle::from_shared(driver.clone()),
//!     container,
//!     Element::host("h1").child(Element::text("hello")),
//! )?;
//! renderer.render(Element::host("h1").child(Element::text("bye")))?;
//!
//! // Clean up
//! renderer.unmount()?;
//! ```

use std::rc::Rc;

use tracing::debug;

use super::scheduler::Scheduler;
use crate::boundary::Guard;
use crate::driver::DriverHandle;
use crate::element::Element;
use crate::engine::{InstanceId, InstanceRef, Removal, RenderOptions, Tree};
use crate::error::{Error, Result};
use crate::types::{HostNode, NodeType};

// =============================================================================
// Renderer
// =============================================================================

/// Handle to a mounted tree.
///
/// Holds the scheduler that owns the tree. Stores and handlers only keep
/// weak references to it, so dropping the renderer stops all updates.
pub struct Renderer {
    scheduler: Rc<Scheduler>,
    root: InstanceId,
}

impl Renderer {
    /// Reconcile the top-level child against `element`.
    pub fn render(&self, element: Element) -> Result<()> {
        let root = self.root;
        self.scheduler
            .run(|tree, cx| tree.reconcile_children(cx, root, std::slice::from_ref(&element)))
    }

    pub fn root(&self) -> InstanceId {
        self.root
    }

    /// The top-level child, if it is still mounted.
    pub fn top(&self) -> Option<InstanceId> {
        self.children(self.root).first().copied()
    }

    /// Ask the root to remove itself. This always fails: the root is only
    /// torn down through [`Renderer::unmount`].
    pub fn remove(&self) -> Result<Removal> {
        let root = self.root;
        self.scheduler.run(|tree, _| tree.remove(root, true))
    }

    /// Tear the whole tree down.
    ///
    /// Every realized node leaves the container, including nodes still
    /// waiting for a deferred removal.
    pub fn unmount(self) -> Result<()> {
        let root = self.root;
        self.scheduler.run(|tree, cx| {
            tree.reconcile_children(cx, root, &[])?;
            tree.clear_deferred();
            Ok(())
        })?;
        debug!(root = %root, "unmounted");
        Ok(())
    }

    /// Failure raised by an update no caller was waiting for.
    pub fn take_error(&self) -> Option<Error> {
        self.scheduler.take_error()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Read an instance. `None` when it is gone or a pass is running.
    pub fn inspect<R>(&self, id: InstanceId, read: impl FnOnce(InstanceRef<'_>) -> R) -> Option<R> {
        self.scheduler
            .read(|tree| tree.get(id).map(read))
            .flatten()
    }

    pub fn children(&self, id: InstanceId) -> Vec<InstanceId> {
        self.inspect(id, |instance| instance.children().to_vec())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: InstanceId) -> Option<InstanceId> {
        self.inspect(id, |instance| instance.parent()).flatten()
    }

    pub fn node_type(&self, id: InstanceId) -> Option<NodeType> {
        self.inspect(id, |instance| instance.node_type())
    }

    pub fn host_node(&self, id: InstanceId) -> Option<HostNode> {
        self.inspect(id, |instance| instance.host_node()).flatten()
    }

    pub fn guard(&self, id: InstanceId) -> Option<Guard> {
        self.inspect(id, |instance| instance.guard().clone())
    }

    pub fn namespace(&self, id: InstanceId) -> Option<String> {
        self.inspect(id, |instance| instance.namespace().map(str::to_string))
            .flatten()
    }

    /// Walk upward from `id` (inclusive) to the first instance matching
    /// `predicate`.
    pub fn find(
        &self,
        id: InstanceId,
        predicate: impl Fn(InstanceRef<'_>) -> bool,
    ) -> Option<InstanceId> {
        self.scheduler.read(|tree| tree.find(id, predicate)).flatten()
    }

    /// Number of live instances, root included.
    pub fn instance_count(&self) -> usize {
        self.scheduler.read(Tree::len).unwrap_or_default()
    }
}

// =============================================================================
// Mount Function
// =============================================================================

/// Mount `element` into `container`.
///
/// The root instance starts with a passthrough guard: a render failure no
/// boundary catches aborts the mount with [`Error::Render`].
pub fn mount(driver: DriverHandle, container: HostNode, element: Element) -> Result<Renderer> {
    let tree = Tree::new(RenderOptions::new(driver), container)?;
    let root = tree.root();
    let scheduler = Scheduler::new(tree);
    debug!(root = %root, %container, "mounting");

    let renderer = Renderer { scheduler, root };
    renderer.render(element)?;
    Ok(renderer)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::driver::MemoryDriver;
    use crate::engine::{
        Component, ComponentType, PendingRemoval, RemovalCompleter, Scope, Unmount,
    };
    use crate::element::Props;
    use crate::error::StructuralError;
    use crate::store::Store;
    use crate::testing::Harness;

    #[test]
    fn test_root_has_passthrough_guard() {
        let harness = Harness::mount(Element::host("div"));
        let root = harness.renderer.root();

        assert_eq!(harness.renderer.node_type(root), Some(NodeType::Root));
        assert_eq!(harness.renderer.guard(root), Some(Guard::Passthrough));
        assert_eq!(harness.renderer.parent(root), None);
        assert_eq!(harness.renderer.parent(harness.top()), Some(root));
    }

    #[test]
    fn test_render_replaces_top_level_child() {
        let harness = Harness::mount(Element::host("div"));
        assert_eq!(harness.renderer.instance_count(), 2);

        harness.render(Element::fragment([Element::text("a"), Element::text("b")]));
        assert_eq!(harness.html(), "ab");
        assert_eq!(harness.renderer.instance_count(), 4);
    }

    #[test]
    fn test_unmount_empties_container() {
        let harness = Harness::mount(
            Element::host("div").with_children([Element::host("p"), Element::text("x")]),
        );
        let Harness {
            driver,
            container,
            renderer,
        } = harness;

        renderer.unmount().unwrap();
        assert_eq!(driver.borrow().serialize(container), "");
    }

    #[test]
    fn test_unmount_cancels_deferred_removals() {
        struct Lingering(Rc<RefCell<Vec<RemovalCompleter>>>);

        impl Component for Lingering {
            fn render(&mut self, _props: &Props, _scope: &mut Scope<'_>) -> anyhow::Result<Element> {
                Ok(Element::host("aside"))
            }

            fn element_will_unmount(&mut self, _node: HostNode) -> Unmount {
                let (pending, completer) = PendingRemoval::channel();
                self.0.borrow_mut().push(completer);
                Unmount::Defer(pending)
            }
        }

        let completers = Rc::new(RefCell::new(Vec::new()));
        let shared = completers.clone();
        let lingering = ComponentType::new("Lingering", move || Lingering(shared.clone()));
        let harness = Harness::mount(Element::component(&lingering));
        let Harness {
            driver,
            container,
            renderer,
        } = harness;

        renderer.unmount().unwrap();
        assert_eq!(driver.borrow().serialize(container), "");

        // Completing afterwards has nothing left to do.
        driver.borrow_mut().clear_ops();
        for completer in completers.borrow_mut().drain(..) {
            completer.complete();
        }
        assert!(driver.borrow().ops().is_empty());
    }

    #[test]
    fn test_update_during_render_runs_after_pass() {
        let store = Store::new(0);
        let renders = Rc::new(Cell::new(0));
        let (source, counter) = (store.clone(), renders.clone());
        let eager = ComponentType::from_fn("Eager", move |_props, scope| {
            scope.subscribe(&source);
            counter.set(counter.get() + 1);
            if source.get() == 0 {
                // Written mid-render: queued, not nested.
                source.set(1);
            }
            Ok(Element::text(source.get().to_string()))
        });

        let harness = Harness::mount(Element::component(&eager));
        assert_eq!(harness.html(), "1");
        assert_eq!(renders.get(), 2);
    }

    #[test]
    fn test_render_from_inside_a_pass_is_reentrant() {
        let slot: Rc<RefCell<Option<Rc<Renderer>>>> = Rc::default();
        let result: Rc<RefCell<Option<Result<()>>>> = Rc::default();
        let (renderer_slot, result_slot) = (slot.clone(), result.clone());
        let trigger = Store::new(false);
        let source = trigger.clone();
        let nested = ComponentType::from_fn("Nested", move |_props, scope| {
            scope.subscribe(&source);
            if source.get() {
                if let Some(renderer) = renderer_slot.borrow().as_ref() {
                    result_slot.replace(Some(renderer.render(Element::empty())));
                }
            }
            Ok(Element::empty())
        });

        let harness = Harness::mount(Element::component(&nested));
        let Harness { renderer, .. } = harness;
        slot.replace(Some(Rc::new(renderer)));

        trigger.set(true);
        let outcome = result.borrow_mut().take();
        assert!(matches!(
            outcome,
            Some(Err(Error::Structural(StructuralError::Reentrant)))
        ));
        slot.replace(None);
    }

    #[test]
    fn test_dropped_renderer_ignores_notifications() {
        let store = Store::new(0);
        let source = store.clone();
        let view = ComponentType::from_fn("View", move |_props, scope| {
            scope.subscribe(&source);
            Ok(Element::text(source.get().to_string()))
        });

        let driver = Rc::new(RefCell::new(MemoryDriver::new()));
        let container = driver.borrow_mut().create_container();
        let renderer = mount(
            DriverHandle::from_shared(driver.clone()),
            container,
            Element::component(&view),
        )
        .unwrap();
        drop(renderer);

        driver.borrow_mut().clear_ops();
        store.set(3);
        assert!(driver.borrow().ops().is_empty());
    }
}
