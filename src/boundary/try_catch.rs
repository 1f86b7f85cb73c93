//! Try - The error boundary component.
//!
//! `try_catch(children, catch)` renders `children()` while healthy and
//! `catch()` once anything below it failed:
//!
//! - On every render the boundary first checks its state. Errored means the
//!   fallback is rendered right away.
//! - Otherwise `children()` is called directly. A failure there is caught on
//!   the spot and the fallback is rendered in the same pass.
//! - A failure further down (a descendant component's render) reaches the
//!   boundary through its guard, which schedules a re-render of the boundary.
//!
//! The two outputs are wrapped in differently keyed fragments, so switching
//! to the fallback always mounts it fresh. Fallback content is mounted with
//! the guard the boundary itself inherited and never catches its own
//! failures. A boundary does not recover by itself: only an ancestor
//! replacing it with a new instance brings the children back.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::{try_catch, Element};
//!
//! let view = try_catch(
//!     || Ok(Element::component(&profile)),
//!     || Ok(Element::host("p").child(Element::text("profile unavailable"))),
//! );
//! ```

use std::rc::Rc;

use tracing::debug;

use super::{Boundary, Guard};
use crate::element::{Element, PropValue, Props, RenderFn};
use crate::engine::{Component, ComponentType, Scope};

/// Prop holding the normal content producer.
pub const TRY_CATCH_CHILDREN: &str = "children";
/// Prop holding the fallback content producer.
pub const TRY_CATCH_CATCH: &str = "catch";

thread_local! {
    static TRY_CATCH: ComponentType = ComponentType::boundary("Try", TryCatch::default);
}

/// Describe an error boundary around `children`, falling back to `catch`.
pub fn try_catch(
    children: impl Fn() -> anyhow::Result<Element> + 'static,
    catch: impl Fn() -> anyhow::Result<Element> + 'static,
) -> Element {
    let ty = TRY_CATCH.with(ComponentType::clone);
    Element::component(&ty)
        .prop(TRY_CATCH_CHILDREN, RenderFn::new(children))
        .prop(TRY_CATCH_CATCH, RenderFn::new(catch))
}

#[derive(Default)]
struct TryCatch {
    boundary: Option<Rc<Boundary>>,
}

fn render_prop(props: &Props, name: &str) -> anyhow::Result<Element> {
    match props.get(name).and_then(PropValue::as_render) {
        Some(render) => render.call(),
        None => Ok(Element::empty()),
    }
}

impl Component for TryCatch {
    fn render(&mut self, props: &Props, scope: &mut Scope<'_>) -> anyhow::Result<Element> {
        let updater = scope.updater();
        let boundary = self
            .boundary
            .get_or_insert_with(|| Rc::new(Boundary::new(updater)))
            .clone();

        if !boundary.is_errored() {
            scope.set_child_guard(Guard::Boundary(boundary.clone()));
            match render_prop(props, TRY_CATCH_CHILDREN) {
                Ok(content) => {
                    return Ok(Element::fragment([content]).key(TRY_CATCH_CHILDREN));
                }
                Err(err) => {
                    debug!(boundary = %boundary.instance(), error = %err, "children failed, rendering fallback");
                    boundary.mark_errored();
                }
            }
        }

        let inherited = scope.guard().clone();
        scope.set_child_guard(inherited);
        let fallback = render_prop(props, TRY_CATCH_CATCH)?;
        Ok(Element::fragment([fallback]).key(TRY_CATCH_CATCH))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::engine::InstanceId;
    use crate::error::Error;
    use crate::store::Store;
    use crate::testing::Harness;
    use crate::types::Capabilities;

    fn text(content: &str) -> anyhow::Result<Element> {
        Ok(Element::host("p").child(Element::text(content.to_string())))
    }

    /// Boundary guard a Try instance forwards right now.
    fn forwarded_guard(harness: &Harness, boundary: InstanceId) -> Guard {
        harness
            .renderer
            .inspect(boundary, |instance| instance.child_guard().cloned())
            .flatten()
            .unwrap_or_default()
    }

    #[test]
    fn test_healthy_boundary_renders_children() {
        let harness = Harness::mount(try_catch(|| text("content"), || text("fallback")));
        assert_eq!(harness.html(), "<p>content</p>");

        let boundary = harness.top();
        let guard = forwarded_guard(&harness, boundary);
        let state = guard.boundary().cloned();
        assert!(state.as_ref().is_some_and(|state| !state.is_errored()));
        assert_eq!(state.map(|state| state.instance()), Some(boundary));

        // Descendants mounted while healthy receive the boundary's own guard.
        let fragment = harness.renderer.children(boundary)[0];
        let paragraph = harness.renderer.children(fragment)[0];
        assert_eq!(harness.renderer.guard(paragraph), Some(guard));
    }

    #[test]
    fn test_children_failing_on_first_render() {
        let harness = Harness::mount(try_catch(
            || Err(anyhow::anyhow!("children exploded")),
            || text("fallback"),
        ));
        assert_eq!(harness.html(), "<p>fallback</p>");

        let boundary = harness.top();
        // Errored boundaries forward the guard they inherited: the root's passthrough.
        assert_eq!(forwarded_guard(&harness, boundary), Guard::Passthrough);

        let fragment = harness.renderer.children(boundary)[0];
        let paragraph = harness.renderer.children(fragment)[0];
        assert_eq!(harness.renderer.guard(paragraph), Some(Guard::Passthrough));
    }

    #[test]
    fn test_descendant_failure_switches_to_fallback() {
        let fail = Store::new(false);
        let source = fail.clone();
        let widget = ComponentType::from_fn("Widget", move |_props, scope| {
            scope.subscribe(&source);
            if source.get() {
                anyhow::bail!("widget broke");
            }
            Ok(Element::host("span").child(Element::text("widget")))
        });

        let inner = widget.clone();
        let harness = Harness::mount(Element::host("main").child(try_catch(
            move || Ok(Element::component(&inner)),
            || text("fallback"),
        )));
        assert_eq!(harness.html(), "<main><span>widget</span></main>");
        assert_eq!(fail.listener_count(), 1);

        fail.set(true);

        assert_eq!(harness.html(), "<main><p>fallback</p></main>");
        // The failed widget was unmounted with the children branch.
        assert_eq!(fail.listener_count(), 0);
        assert!(harness.renderer.take_error().is_none());
    }

    #[test]
    fn test_descendant_failing_on_first_render() {
        let broken = ComponentType::from_fn("Broken", |_, _| Err(anyhow::anyhow!("not ready")));
        let inner = broken.clone();
        let harness = Harness::mount(try_catch(
            move || Ok(Element::component(&inner)),
            || text("fallback"),
        ));

        assert_eq!(harness.html(), "<p>fallback</p>");
        let found = harness.renderer.find(harness.top(), |instance| {
            instance.capabilities().contains(Capabilities::BOUNDARY)
        });
        assert_eq!(found, Some(harness.top()));
    }

    #[test]
    fn test_nested_boundaries_resolve_at_nearest() {
        let harness = Harness::mount(try_catch(
            || {
                Ok(Element::host("div").with_children([
                    Element::text("outer"),
                    try_catch(|| Err(anyhow::anyhow!("inner failed")), || text("inner fallback")),
                ]))
            },
            || text("outer fallback"),
        ));

        assert_eq!(harness.html(), "<div>outer<p>inner fallback</p></div>");
        let outer = forwarded_guard(&harness, harness.top());
        assert!(outer.boundary().is_some_and(|state| !state.is_errored()));
    }

    #[test]
    fn test_fallback_failure_reaches_ancestor_boundary() {
        let harness = Harness::mount(try_catch(
            || {
                Ok(try_catch(
                    || Err(anyhow::anyhow!("first")),
                    || Err(anyhow::anyhow!("fallback failed too")),
                ))
            },
            || text("outer fallback"),
        ));

        assert_eq!(harness.html(), "<p>outer fallback</p>");
    }

    #[test]
    fn test_fallback_failure_without_ancestor_is_fatal() {
        let (driver, container) = Harness::driver();
        let result = crate::pipeline::mount(
            driver,
            container,
            try_catch(|| Err(anyhow::anyhow!("a")), || Err(anyhow::anyhow!("b"))),
        );
        assert!(matches!(result, Err(Error::Render(_))));
    }

    #[test]
    fn test_boundary_does_not_self_heal() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let children = move || {
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                anyhow::bail!("first attempt fails");
            }
            text("content")
        };

        let view = || try_catch(children.clone(), || text("fallback"));
        let harness = Harness::mount(view());
        assert_eq!(harness.html(), "<p>fallback</p>");

        // Same boundary instance, children would succeed now.
        harness.render(view());
        assert_eq!(harness.html(), "<p>fallback</p>");
        assert_eq!(attempts.get(), 1);

        // A new identity remounts a healthy boundary.
        harness.render(Element::fragment([view()]).key("fresh"));
        assert_eq!(harness.html(), "<p>content</p>");
    }

    #[test]
    fn test_guarded_call_from_handler() {
        let captured: Rc<std::cell::RefCell<Option<Guard>>> = Rc::default();
        let slot = captured.clone();
        let probe = ComponentType::from_fn("Probe", move |_props, scope| {
            slot.replace(Some(scope.guard().clone()));
            Ok(Element::text("probe"))
        });

        let inner = probe.clone();
        let harness = Harness::mount(try_catch(
            move || Ok(Element::component(&inner)),
            || text("fallback"),
        ));
        assert_eq!(harness.html(), "probe");

        let guard = captured.borrow().clone().unwrap_or_default();
        let outcome = guard.invoke(|| -> anyhow::Result<()> { anyhow::bail!("handler failed") });
        assert!(matches!(outcome, Ok(crate::boundary::Guarded::Caught)));
        assert_eq!(harness.html(), "<p>fallback</p>");
    }
}
