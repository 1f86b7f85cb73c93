//! Host Instances - Realized elements and their props.
//!
//! A host instance owns exactly one platform node. Props are translated into
//! driver calls:
//!
//! | Prop value              | Driver call                                       |
//! |-------------------------|---------------------------------------------------|
//! | `Handler`               | `set_handler(name, Some(handler))`                |
//! | `Bool(true)`            | `set_attribute(name, name)`                       |
//! | `Bool(false)`           | `remove_attribute(name)`                          |
//! | `Style`                 | `set_attribute(name, "k:v;k:v;")`                 |
//! | anything else           | `set_attribute(name, value)`                      |
//! | `value` on form fields  | additionally `set_property("value", value)`       |
//! | `Render`                | nothing, render inputs never reach the node       |
//!
//! # Change Adapter
//!
//! Editable elements (`input`, `textarea`, `select`) carrying an `onchange`
//! handler get an engine-owned handler instead. When it fires, the live value
//! reported by the driver is recorded in a [`ChangeProbe`] and the
//! application handler runs. While the probe is active, a `value` write equal
//! to the live value is skipped and counts as accepted. When the handler
//! accepted nothing and the element is controlled, the live value is reset to
//! the `value` prop.

use std::cell::Cell;

use tracing::trace;

use super::instance::{InstanceKind, Placement};
use super::registry::InstanceId;
use super::tree::Tree;
use crate::driver::DriverHandle;
use crate::element::{Element, PropValue, Props};
use crate::error::Result;
use crate::pipeline::Pass;
use crate::types::HostNode;

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";

const CHANGE_EVENTS: &[&str] = &["onchange"];
const TEXT_CHANGE_EVENTS: &[&str] = &["onchange", "oninput"];

pub(crate) struct HostState {
    pub(crate) tag: String,
    pub(crate) node: HostNode,
    /// Events owned by the change adapter. Empty when unmanaged.
    pub(crate) adapter: &'static [&'static str],
}

// =============================================================================
// Namespaces
// =============================================================================

/// Namespace of a host element: explicit `xmlns`, then the special namespace
/// of `svg`/`math`, then whatever the parent uses.
pub fn resolve_namespace(tag: &str, props: &Props, inherited: Option<String>) -> Option<String> {
    if let Some(explicit) = props.get("xmlns").and_then(PropValue::as_str) {
        return Some(explicit.to_string());
    }
    match tag {
        "svg" => Some(SVG_NAMESPACE.to_string()),
        "math" => Some(MATHML_NAMESPACE.to_string()),
        _ => inherited,
    }
}

// =============================================================================
// Form Fields
// =============================================================================

/// Elements whose `value` is mirrored as a live property.
pub fn is_editable(tag: &str) -> bool {
    matches!(tag, "input" | "textarea" | "select")
}

fn is_text_like(tag: &str, props: &Props) -> bool {
    match tag {
        "textarea" => true,
        "input" => matches!(
            props.get("type").and_then(PropValue::as_str),
            None | Some("text" | "search" | "email" | "password" | "tel" | "url" | "number")
        ),
        _ => false,
    }
}

/// Events the change adapter takes over for an element with these props.
fn adapter_events(tag: &str, props: &Props) -> &'static [&'static str] {
    let has_handler = props.get("onchange").and_then(PropValue::as_handler).is_some();
    if !is_editable(tag) || !has_handler {
        return &[];
    }
    if is_text_like(tag, props) {
        TEXT_CHANGE_EVENTS
    } else {
        CHANGE_EVENTS
    }
}

/// Live value captured while an application change handler runs.
#[derive(Debug)]
pub(crate) struct ChangeProbe {
    pub(crate) target: InstanceId,
    pub(crate) live: Option<String>,
    accepted: Cell<bool>,
}

impl ChangeProbe {
    pub(crate) fn new(target: InstanceId, live: Option<String>) -> Self {
        Self {
            target,
            live,
            accepted: Cell::new(false),
        }
    }

    pub(crate) fn is_accepted(&self) -> bool {
        self.accepted.get()
    }
}

/// How a `value` prop write treats the live value of the node.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ValueStrategy<'a> {
    Apply,
    /// Skip writes equal to the live value and record them as accepted.
    PreserveLive(&'a ChangeProbe),
}

// =============================================================================
// Prop Application
// =============================================================================

struct HostTarget<'a> {
    driver: &'a DriverHandle,
    node: HostNode,
    tag: &'a str,
    adapter: &'static [&'static str],
}

impl HostTarget<'_> {
    fn set_prop(&self, name: &str, value: &PropValue, strategy: ValueStrategy<'_>) {
        if self.adapter.contains(&name) || name == "xmlns" {
            return;
        }
        let node = self.node;
        match value {
            PropValue::Handler(handler) => {
                self.driver
                    .with(|d| d.set_handler(node, name, Some(handler.clone())));
            }
            PropValue::Bool(true) => self.driver.with(|d| d.set_attribute(node, name, name)),
            PropValue::Bool(false) => self.driver.with(|d| d.remove_attribute(node, name)),
            PropValue::Render(_) => {}
            other => {
                let Some(text) = other.to_attribute() else {
                    return;
                };
                self.driver.with(|d| d.set_attribute(node, name, &text));
                if name == "value" && is_editable(self.tag) {
                    self.set_value(&text, strategy);
                }
            }
        }
    }

    fn set_value(&self, value: &str, strategy: ValueStrategy<'_>) {
        if let ValueStrategy::PreserveLive(probe) = strategy {
            if probe.live.as_deref() == Some(value) {
                trace!(node = %self.node, "value matches live value, keeping it");
                probe.accepted.set(true);
                return;
            }
        }
        let node = self.node;
        self.driver.with(|d| d.set_property(node, "value", value));
    }

    fn unset_prop(&self, name: &str, previous: &PropValue) {
        if self.adapter.contains(&name) || name == "xmlns" {
            return;
        }
        let node = self.node;
        match previous {
            PropValue::Handler(_) => self.driver.with(|d| d.set_handler(node, name, None)),
            PropValue::Render(_) => {}
            _ => self.driver.with(|d| d.remove_attribute(node, name)),
        }
    }
}

// =============================================================================
// Host Lifecycle
// =============================================================================

impl Tree {
    pub(crate) fn mount_host(
        &mut self,
        cx: &Pass,
        tag: &str,
        element: &Element,
        mut placement: Placement,
    ) -> Result<InstanceId> {
        let parent = placement.parent;
        let container = self.owned_node(self.nearest_host(parent)?)?;
        let props = element.props();

        placement.namespace = resolve_namespace(tag, props, placement.namespace.take());
        let driver = placement.options.driver.clone();
        let node = driver.with(|d| d.create_element(tag, placement.namespace.as_deref()));
        let adapter = adapter_events(tag, props);

        let state = HostState {
            tag: tag.to_string(),
            node,
            adapter,
        };
        let id = self.attach(parent, placement.instance(InstanceKind::Host(state), props.clone()))?;

        let target = HostTarget {
            driver: &driver,
            node,
            tag,
            adapter,
        };
        for (name, value) in props.iter() {
            target.set_prop(name, value, ValueStrategy::Apply);
        }
        for event in adapter {
            driver.with(|d| d.set_handler(node, event, Some(cx.change_handler(id))));
        }

        self.reconcile_children(cx, id, element.children())?;

        let predecessor = self.predecessor_of(id)?;
        driver.with(|d| d.insert(container, node, predecessor));
        self.notify_did_mount(id, node);

        if props.get("autofocus").and_then(PropValue::as_bool) == Some(true) {
            self.pending_focus.push(id);
        }
        Ok(id)
    }

    pub(crate) fn reconcile_host(&mut self, cx: &Pass, id: InstanceId, element: &Element) -> Result<()> {
        let instance = self.instance(id)?;
        let InstanceKind::Host(state) = &instance.kind else {
            return Ok(());
        };
        let (node, tag, previous_adapter) = (state.node, state.tag.clone(), state.adapter);
        let driver = instance.options.driver.clone();
        let old_props = instance.props.clone();
        let new_props = element.props();
        let adapter = adapter_events(&tag, new_props);

        let previous = HostTarget {
            driver: &driver,
            node,
            tag: &tag,
            adapter: previous_adapter,
        };
        for (name, value) in old_props.iter() {
            if !new_props.contains(name) {
                previous.unset_prop(name, value);
            }
        }

        let target = HostTarget {
            driver: &driver,
            node,
            tag: &tag,
            adapter,
        };
        let strategy = cx.strategy(id);
        for (name, value) in new_props.iter() {
            if old_props.get(name) != Some(value) {
                target.set_prop(name, value, strategy);
            }
        }

        for event in adapter.iter().filter(|event| !previous_adapter.contains(event)) {
            driver.with(|d| d.set_handler(node, event, Some(cx.change_handler(id))));
        }
        for event in previous_adapter.iter().filter(|event| !adapter.contains(event)) {
            match new_props.get(event) {
                Some(value) => target.set_prop(event, value, strategy),
                None => driver.with(|d| d.set_handler(node, event, None)),
            }
        }

        let instance = self.instance_mut(id)?;
        instance.props = new_props.clone();
        if let InstanceKind::Host(state) = &mut instance.kind {
            state.adapter = adapter;
        }

        self.reconcile_children(cx, id, element.children())
    }

    pub(crate) fn mount_text(&mut self, content: &str, placement: Placement) -> Result<InstanceId> {
        let parent = placement.parent;
        let container = self.owned_node(self.nearest_host(parent)?)?;
        let driver = placement.options.driver.clone();
        let node = driver.with(|d| d.create_text(content));

        let kind = InstanceKind::Text {
            node,
            content: content.to_string(),
        };
        let id = self.attach(parent, placement.instance(kind, Props::new()))?;

        let predecessor = self.predecessor_of(id)?;
        driver.with(|d| d.insert(container, node, predecessor));
        self.notify_did_mount(id, node);
        Ok(id)
    }

    pub(crate) fn reconcile_text(&mut self, id: InstanceId, content: &str) -> Result<()> {
        let instance = self.instance_mut(id)?;
        let driver = instance.options.driver.clone();
        if let InstanceKind::Text {
            node,
            content: current,
        } = &mut instance.kind
        {
            if current != content {
                let node = *node;
                content.clone_into(current);
                driver.with(|d| d.set_text(node, content));
            }
        }
        Ok(())
    }

    /// Reset the live value of a controlled element to its `value` prop.
    pub(crate) fn restore_controlled_value(&mut self, id: InstanceId) -> Result<()> {
        let Some(instance) = self.registry.get(id) else {
            return Ok(());
        };
        let InstanceKind::Host(state) = &instance.kind else {
            return Ok(());
        };
        let Some(value) = instance.props.get("value").and_then(PropValue::to_attribute) else {
            return Ok(());
        };
        let node = state.node;
        trace!(instance = %id, "restoring controlled value");
        instance
            .options
            .driver
            .with(|d| d.set_property(node, "value", &value));
        Ok(())
    }
}
