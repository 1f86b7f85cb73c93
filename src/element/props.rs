//! Props - Element properties and callbacks.
//!
//! Props are an ordered map from name to [`PropValue`]. Callbacks are `Rc`
//! wrappers so an element can be cloned into closures cheaply; two callbacks
//! are equal only when they are the same allocation.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::Element;
use crate::types::HostNode;

// =============================================================================
// Events
// =============================================================================

/// Event delivered to a handler installed on a host node.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Handler name the event was dispatched to (`onclick`, `onchange`, ...).
    pub name: String,
    /// Node the event originated from.
    pub target: HostNode,
    /// Live value of the target, for form-like elements.
    pub value: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>, target: HostNode) -> Self {
        Self {
            name: name.into(),
            target,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Event handler callback.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
    pub fn new(callback: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// Zero-argument producer of an element. A failure is a render failure.
#[derive(Clone)]
pub struct RenderFn(Rc<dyn Fn() -> anyhow::Result<Element>>);

impl RenderFn {
    pub fn new(render: impl Fn() -> anyhow::Result<Element> + 'static) -> Self {
        Self(Rc::new(render))
    }

    pub fn call(&self) -> anyhow::Result<Element> {
        (self.0)()
    }
}

impl PartialEq for RenderFn {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for RenderFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenderFn(..)")
    }
}

// =============================================================================
// Prop Value
// =============================================================================

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Presence-only attribute: present (value = name) when true, absent when false.
    Bool(bool),
    Text(String),
    Number(f64),
    /// Ordered `name -> value` declarations, serialized as `name:value;` pairs.
    Style(Vec<(String, String)>),
    /// Installed directly as an event handler.
    Handler(Handler),
    /// Render-time input for components (never applied to host nodes).
    Render(RenderFn),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_render(&self) -> Option<&RenderFn> {
        match self {
            PropValue::Render(render) => Some(render),
            _ => None,
        }
    }

    /// String form used when the value is written as an attribute.
    ///
    /// Callbacks have no attribute form.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            PropValue::Bool(value) => Some(value.to_string()),
            PropValue::Text(value) => Some(value.clone()),
            PropValue::Number(value) => Some(value.to_string()),
            PropValue::Style(declarations) => Some(style_attribute(declarations)),
            PropValue::Handler(_) | PropValue::Render(_) => None,
        }
    }
}

/// Serialize style declarations into a single attribute string.
pub fn style_attribute(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .fold(String::new(), |mut out, (name, value)| {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
            out.push(';');
            out
        })
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Number(f64::from(value))
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        PropValue::Number(f64::from(value))
    }
}

impl From<Handler> for PropValue {
    fn from(value: Handler) -> Self {
        PropValue::Handler(value)
    }
}

impl From<RenderFn> for PropValue {
    fn from(value: RenderFn) -> Self {
        PropValue::Render(value)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for PropValue {
    fn from(value: Vec<(K, V)>) -> Self {
        PropValue::Style(
            value
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

// =============================================================================
// Props
// =============================================================================

/// Ordered property map of an element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props(BTreeMap<String, PropValue>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}
