//! Component Instances - User render logic owning a subtree.
//!
//! A component is described by a [`ComponentType`] (a named factory) and
//! realized as a [`Component`] value living inside its instance. Render runs
//! through the guard the instance inherited, so a failure resolves at the
//! nearest boundary above it.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::{ComponentType, Element, Store};
//!
//! let count = Store::new(0);
//! let counter = ComponentType::from_fn("Counter", move |_props, scope| {
//!     scope.subscribe(&count);
//!     Ok(Element::host("span").child(Element::text(count.get().to_string())))
//! });
//!
//! let app = Element::component(&counter);
//! ```

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::instance::{InstanceKind, Placement};
use super::registry::InstanceId;
use super::removal::Unmount;
use super::tree::Tree;
use crate::boundary::{Guard, Guarded};
use crate::element::{Element, Props};
use crate::error::Result;
use crate::pipeline::{Pass, Scheduler};
use crate::store::{Listener, Subscribable};
use crate::types::HostNode;

// =============================================================================
// Component Trait
// =============================================================================

/// Whether a lifecycle notification keeps bubbling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Bubble,
    Stop,
}

/// Render logic of a component instance.
pub trait Component {
    /// Produce the description of this component's output.
    ///
    /// Returning `Err` is a render failure. It is handled by the nearest
    /// boundary, or aborts the render when there is none.
    fn render(&mut self, props: &Props, scope: &mut Scope<'_>) -> anyhow::Result<Element>;

    /// Called once, after every descendant has been torn down and while its
    /// nodes are still attached.
    fn will_unmount(&mut self) {}

    /// A realized descendant node was inserted into the host structure.
    fn element_did_mount(&mut self, _node: HostNode) -> Propagation {
        Propagation::Bubble
    }

    /// A topmost realized descendant node is about to be detached.
    ///
    /// Answer [`Unmount::Defer`] to keep the node in place until the returned
    /// removal completes.
    fn element_will_unmount(&mut self, _node: HostNode) -> Unmount {
        Unmount::Bubble
    }
}

struct FnComponent(Rc<dyn Fn(&Props, &mut Scope<'_>) -> anyhow::Result<Element>>);

impl Component for FnComponent {
    fn render(&mut self, props: &Props, scope: &mut Scope<'_>) -> anyhow::Result<Element> {
        (self.0)(props, scope)
    }
}

// =============================================================================
// Component Type
// =============================================================================

struct ComponentTypeInner {
    name: String,
    boundary: bool,
    factory: Box<dyn Fn() -> Box<dyn Component>>,
}

/// Named component factory. Two types are equal only when they are the same
/// allocation, which is what reconciliation identity uses.
#[derive(Clone)]
pub struct ComponentType(Rc<ComponentTypeInner>);

impl ComponentType {
    /// A component type creating a fresh `C` for every mounted instance.
    pub fn new<C, F>(name: impl Into<String>, factory: F) -> Self
    where
        C: Component + 'static,
        F: Fn() -> C + 'static,
    {
        Self(Rc::new(ComponentTypeInner {
            name: name.into(),
            boundary: false,
            factory: Box::new(move || Box::new(factory())),
        }))
    }

    /// A stateless component type backed by a render function.
    pub fn from_fn<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&Props, &mut Scope<'_>) -> anyhow::Result<Element> + 'static,
    {
        let render: Rc<dyn Fn(&Props, &mut Scope<'_>) -> anyhow::Result<Element>> = Rc::new(render);
        Self::new(name, move || FnComponent(render.clone()))
    }

    pub(crate) fn boundary<C, F>(name: impl Into<String>, factory: F) -> Self
    where
        C: Component + 'static,
        F: Fn() -> C + 'static,
    {
        Self(Rc::new(ComponentTypeInner {
            name: name.into(),
            boundary: true,
            factory: Box::new(move || Box::new(factory())),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_boundary(&self) -> bool {
        self.0.boundary
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Component> {
        (self.0.factory)()
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.0.name).finish()
    }
}

// =============================================================================
// Updater / Subscriptions
// =============================================================================

/// Requests a re-render of one component instance.
#[derive(Clone)]
pub struct Updater {
    scheduler: Weak<Scheduler>,
    id: InstanceId,
}

impl Updater {
    pub(crate) fn new(scheduler: Weak<Scheduler>, id: InstanceId) -> Self {
        Self { scheduler, id }
    }

    /// Re-render the instance. Runs immediately when no pass is in flight,
    /// otherwise right after the current one.
    pub fn request(&self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.schedule(self.id);
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.id
    }

    /// An updater bound to no scheduler. Requests are dropped.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let id = super::registry::Registry::new().allocate(()).unwrap();
        Self::new(Weak::new(), id)
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Updater").field(&self.id).finish()
    }
}

/// Live store subscription. Unsubscribes when dropped.
pub(crate) struct Subscription(Option<Box<dyn FnOnce()>>);

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(unsubscribe)))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.0.take() {
            unsubscribe();
        }
    }
}

// =============================================================================
// Scope
// =============================================================================

/// Render-time context of one component instance.
pub struct Scope<'a> {
    id: InstanceId,
    mounting: bool,
    children: &'a [Element],
    guard: &'a Guard,
    child_guard: Option<Guard>,
    subscriptions: &'a mut Vec<Subscription>,
    updater: Updater,
}

impl Scope<'_> {
    pub fn instance(&self) -> InstanceId {
        self.id
    }

    /// True during the first render of the instance.
    pub fn is_mounting(&self) -> bool {
        self.mounting
    }

    /// Children the component was described with.
    pub fn children(&self) -> &[Element] {
        self.children
    }

    /// Guard inherited from the nearest boundary above.
    pub fn guard(&self) -> &Guard {
        self.guard
    }

    /// Guard forwarded to children mounted from now on.
    pub fn child_guard(&self) -> &Guard {
        self.child_guard.as_ref().unwrap_or(self.guard)
    }

    pub fn set_child_guard(&mut self, guard: Guard) {
        self.child_guard = Some(guard);
    }

    /// Re-render this instance whenever `store` notifies.
    ///
    /// Only the mounting render subscribes. The subscription ends when the
    /// instance unmounts.
    pub fn subscribe<S>(&mut self, store: &S)
    where
        S: Subscribable + Clone + 'static,
    {
        if !self.mounting {
            return;
        }
        let updater = self.updater.clone();
        let listener: Listener = Rc::new(move || updater.request());
        let listener_id = store.subscribe(listener);
        let store = store.clone();
        self.subscriptions
            .push(Subscription::new(move || store.unsubscribe(listener_id)));
    }

    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }
}

// =============================================================================
// Component State
// =============================================================================

pub(crate) struct ComponentState {
    pub(crate) ty: ComponentType,
    /// Taken out while the logic renders.
    pub(crate) logic: Option<Box<dyn Component>>,
    /// Children the component was described with.
    pub(crate) content: Vec<Element>,
    pub(crate) subscriptions: Vec<Subscription>,
    pub(crate) child_guard: Option<Guard>,
    pub(crate) mounting: bool,
}

impl ComponentState {
    fn new(ty: &ComponentType, content: Vec<Element>) -> Self {
        Self {
            ty: ty.clone(),
            logic: Some(ty.instantiate()),
            content,
            subscriptions: Vec::new(),
            child_guard: None,
            mounting: true,
        }
    }
}

impl Tree {
    pub(crate) fn mount_component(
        &mut self,
        cx: &Pass,
        ty: &ComponentType,
        element: &Element,
        placement: Placement,
    ) -> Result<InstanceId> {
        let parent = placement.parent;
        let state = ComponentState::new(ty, element.children().to_vec());
        let instance = placement.instance(InstanceKind::Component(state), element.props().clone());
        let id = self.attach(parent, instance)?;

        debug!(component = ty.name(), instance = %id, "mounting component");
        self.render_component(cx, id)?;
        Ok(id)
    }

    pub(crate) fn reconcile_component(
        &mut self,
        cx: &Pass,
        id: InstanceId,
        element: &Element,
    ) -> Result<()> {
        let instance = self.instance_mut(id)?;
        instance.props = element.props().clone();
        if let InstanceKind::Component(state) = &mut instance.kind {
            state.content = element.children().to_vec();
        }
        self.render_component(cx, id)
    }

    /// Run the render logic under the inherited guard and reconcile its output.
    pub(crate) fn render_component(&mut self, cx: &Pass, id: InstanceId) -> Result<()> {
        let instance = self.instance_mut(id)?;
        let guard = instance.options.guard.clone();
        let props = instance.props.clone();
        let InstanceKind::Component(state) = &mut instance.kind else {
            return Ok(());
        };
        let Some(mut logic) = state.logic.take() else {
            debug!(instance = %id, "component is already rendering");
            return Ok(());
        };
        let name = state.ty.name().to_string();
        let content = std::mem::take(&mut state.content);
        let mut subscriptions = std::mem::take(&mut state.subscriptions);
        let mounting = state.mounting;
        let child_guard = state.child_guard.clone();

        let mut scope = Scope {
            id,
            mounting,
            children: &content,
            guard: &guard,
            child_guard,
            subscriptions: &mut subscriptions,
            updater: cx.updater(id),
        };
        let outcome = guard.invoke(|| logic.render(&props, &mut scope));
        let Scope { child_guard, .. } = scope;

        let instance = self.instance_mut(id)?;
        if let InstanceKind::Component(state) = &mut instance.kind {
            state.logic = Some(logic);
            state.content = content;
            state.subscriptions = subscriptions;
            state.child_guard = child_guard;
            state.mounting = false;
        }

        let element = match outcome? {
            Guarded::Completed(element) => element,
            Guarded::Caught => {
                debug!(component = %name, instance = %id, "render failure caught by boundary");
                Element::empty()
            }
        };
        self.reconcile_children(cx, id, std::slice::from_ref(&element))
    }

    /// Notify the logic and end every subscription.
    pub(crate) fn teardown_component(&mut self, id: InstanceId) -> Result<()> {
        let instance = self.instance_mut(id)?;
        if let InstanceKind::Component(state) = &mut instance.kind {
            debug!(component = state.ty.name(), instance = %id, "unmounting component");
            if let Some(logic) = state.logic.as_mut() {
                logic.will_unmount();
            }
            state.subscriptions.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::error::Error;
    use crate::store::Store;
    use crate::testing::Harness;

    #[test]
    fn test_store_notification_rerenders() {
        let count = Store::new(0);
        let source = count.clone();
        let counter = ComponentType::from_fn("Counter", move |_props, scope| {
            scope.subscribe(&source);
            Ok(Element::host("span").child(Element::text(source.get().to_string())))
        });

        let harness = Harness::mount(Element::component(&counter));
        assert_eq!(harness.html(), "<span>0</span>");
        assert_eq!(count.listener_count(), 1);

        count.set(5);
        assert_eq!(harness.html(), "<span>5</span>");

        count.update(|value| *value += 1);
        assert_eq!(harness.html(), "<span>6</span>");
        // Re-renders don't subscribe again.
        assert_eq!(count.listener_count(), 1);
    }

    #[test]
    fn test_only_first_render_is_mounting() {
        let tick = Store::new(0);
        let source = tick.clone();
        let phases = Rc::new(RefCell::new(Vec::new()));
        let seen = phases.clone();
        let phase = ComponentType::from_fn("Phase", move |_props, scope| {
            scope.subscribe(&source);
            seen.borrow_mut().push(scope.is_mounting());
            Ok(Element::empty())
        });

        let _harness = Harness::mount(Element::component(&phase));
        tick.set(1);
        tick.set(2);

        assert_eq!(phases.borrow().as_slice(), &[true, false, false]);
    }

    #[test]
    fn test_unmount_unsubscribes_and_notifies() {
        struct Tracked {
            store: Store<u32>,
            unmounted: Rc<Cell<bool>>,
        }

        impl Component for Tracked {
            fn render(&mut self, _props: &Props, scope: &mut Scope<'_>) -> anyhow::Result<Element> {
                scope.subscribe(&self.store);
                Ok(Element::text(self.store.get().to_string()))
            }

            fn will_unmount(&mut self) {
                self.unmounted.set(true);
            }
        }

        let store = Store::new(1);
        let unmounted = Rc::new(Cell::new(false));
        let (shared_store, flag) = (store.clone(), unmounted.clone());
        let tracked = ComponentType::new("Tracked", move || Tracked {
            store: shared_store.clone(),
            unmounted: flag.clone(),
        });

        let harness = Harness::mount(Element::host("div").child(Element::component(&tracked)));
        assert_eq!(store.listener_count(), 1);

        harness.render(Element::host("div"));
        assert!(unmounted.get());
        assert_eq!(store.listener_count(), 0);
        assert_eq!(harness.html(), "<div></div>");

        // Late notifications have nobody to reach.
        store.set(2);
        assert_eq!(harness.html(), "<div></div>");
    }

    #[test]
    fn test_props_change_rerenders_immediately() {
        let renders = Rc::new(Cell::new(0));
        let counter = renders.clone();
        let label = ComponentType::from_fn("Label", move |props, _scope| {
            counter.set(counter.get() + 1);
            let text = props.get("text").and_then(|value| value.as_str()).unwrap_or("");
            Ok(Element::text(text.to_string()))
        });

        let harness = Harness::mount(Element::component(&label).prop("text", "a"));
        let instance = harness.top();

        harness.render(Element::component(&label).prop("text", "b"));

        assert_eq!(harness.html(), "b");
        assert_eq!(renders.get(), 2);
        assert_eq!(harness.top(), instance);
    }

    #[test]
    fn test_distinct_types_with_same_name_remount() {
        let first = ComponentType::from_fn("Same", |_, _| Ok(Element::text("first")));
        let second = ComponentType::from_fn("Same", |_, _| Ok(Element::text("second")));
        assert_ne!(first, second);

        let harness = Harness::mount(Element::component(&first));
        let before = harness.top();
        harness.render(Element::component(&second));
        assert_ne!(harness.top(), before);
        assert_eq!(harness.html(), "second");
    }

    #[test]
    fn test_children_are_passed_through_scope() {
        let card = ComponentType::from_fn("Card", |_props, scope| {
            Ok(Element::host("article").with_children(scope.children().to_vec()))
        });

        let harness = Harness::mount(
            Element::component(&card).child(Element::host("h1").child(Element::text("title"))),
        );
        assert_eq!(harness.html(), "<article><h1>title</h1></article>");
    }

    #[test]
    fn test_did_mount_bubbles_to_component() {
        struct Watcher(Rc<RefCell<Vec<HostNode>>>);

        impl Component for Watcher {
            fn render(&mut self, _props: &Props, _scope: &mut Scope<'_>) -> anyhow::Result<Element> {
                Ok(Element::host("div").child(Element::host("span")))
            }

            fn element_did_mount(&mut self, node: HostNode) -> Propagation {
                self.0.borrow_mut().push(node);
                Propagation::Stop
            }
        }

        let seen = Rc::new(RefCell::new(Vec::new()));
        let shared = seen.clone();
        let watcher = ComponentType::new("Watcher", move || Watcher(shared.clone()));
        let harness = Harness::mount(Element::component(&watcher));

        let div = harness.find_all("div")[0];
        let span = harness.find_all("span")[0];
        // Both reach the component: nodes bubble through their host parents.
        assert_eq!(seen.borrow().as_slice(), &[span, div]);
    }

    #[test]
    fn test_render_failure_without_boundary_is_fatal() {
        let broken = ComponentType::from_fn("Broken", |_, _| Err(anyhow::anyhow!("no data")));
        let (driver, container) = Harness::driver();

        let result = crate::pipeline::mount(driver, container, Element::component(&broken));
        match result {
            Err(Error::Render(err)) => assert_eq!(err.to_string(), "no data"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("render should fail"),
        }
    }

    #[test]
    fn test_store_failure_is_kept_for_later() {
        let flag = Store::new(false);
        let source = flag.clone();
        let fragile = ComponentType::from_fn("Fragile", move |_props, scope| {
            scope.subscribe(&source);
            if source.get() {
                anyhow::bail!("flag was set");
            }
            Ok(Element::text("ok"))
        });

        let harness = Harness::mount(Element::component(&fragile));
        flag.set(true);

        let error = harness.renderer.take_error();
        assert!(matches!(error, Some(Error::Render(_))));
        assert!(harness.renderer.take_error().is_none());
    }
}
