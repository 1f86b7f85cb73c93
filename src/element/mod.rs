//! Element Descriptions - Immutable values describing desired UI.
//!
//! An [`Element`] is what application code produces on every render:
//! - a host element (`Element::host("div")`)
//! - a text node (`Element::text("hello")`)
//! - a fragment grouping several children (`Element::fragment([...])`)
//! - a component reference (`Element::component(&counter)`)
//!
//! Elements are cheap to clone and never mutated by the engine. Identity for
//! reconciliation is the element's kind and tag (or component reference),
//! plus its [`Key`] when one is given.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::Element;
//!
//! let list = Element::host("ul").with_children(
//!     ["a", "b", "c"].into_iter().map(|id| {
//!         Element::host("li").key(id).child(Element::text(id))
//!     }),
//! );
//! ```

mod props;

pub use props::*;

use crate::engine::ComponentType;
use crate::types::{Key, NodeType};

// =============================================================================
// Element Type
// =============================================================================

/// What an element describes.
#[derive(Debug, Clone)]
pub enum ElementType {
    /// Host element with the given tag.
    Host(String),
    Fragment,
    Component(ComponentType),
    /// Raw text content.
    Text(String),
}

// =============================================================================
// Element
// =============================================================================

/// Immutable description of one tree position.
#[derive(Debug, Clone)]
pub struct Element {
    ty: ElementType,
    props: Props,
    children: Vec<Element>,
    key: Option<Key>,
}

impl Element {
    fn with_type(ty: ElementType) -> Self {
        Self {
            ty,
            props: Props::new(),
            children: Vec::new(),
            key: None,
        }
    }

    /// Describe a host element.
    pub fn host(tag: impl Into<String>) -> Self {
        Self::with_type(ElementType::Host(tag.into()))
    }

    /// Describe a text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_type(ElementType::Text(content.into()))
    }

    /// Describe a fragment over the given children.
    pub fn fragment(children: impl IntoIterator<Item = Element>) -> Self {
        Self::with_type(ElementType::Fragment).with_children(children)
    }

    /// A fragment without children. Renders nothing.
    pub fn empty() -> Self {
        Self::with_type(ElementType::Fragment)
    }

    /// Describe an instance of a component.
    pub fn component(ty: &ComponentType) -> Self {
        Self::with_type(ElementType::Component(ty.clone()))
    }

    // =========================================================================
    // Builders
    // =========================================================================

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name, value);
        self
    }

    /// Attach an event handler prop (`onclick`, `onchange`, ...).
    pub fn on(self, name: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Self {
        self.prop(name, Handler::new(handler))
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn ty(&self) -> &ElementType {
        &self.ty
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn get_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Instance kind this element produces when mounted.
    pub fn node_type(&self) -> NodeType {
        match self.ty {
            ElementType::Host(_) => NodeType::Host,
            ElementType::Fragment => NodeType::Fragment,
            ElementType::Component(_) => NodeType::Component,
            ElementType::Text(_) => NodeType::Text,
        }
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::text(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::text(value)
    }
}
