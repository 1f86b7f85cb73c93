//! In-memory driver.
//!
//! Keeps a plain node table instead of a real document and records every
//! mutation as a [`DriverOp`], so tests can assert both on the resulting
//! structure and on the exact calls the engine made.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::rc::Rc;

use super::Driver;
use crate::element::{Event, Handler};
use crate::types::HostNode;

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode },
    SetText { node: HostNode, content: String },
    SetAttribute { node: HostNode, name: String, value: String },
    RemoveAttribute { node: HostNode, name: String },
    SetProperty { node: HostNode, name: String, value: String },
    SetHandler { node: HostNode, name: String, installed: bool },
    /// `moved` is set when the node was attached somewhere before the call.
    Insert { parent: HostNode, node: HostNode, moved: bool },
    Remove { node: HostNode },
    Focus { node: HostNode },
}

enum NodeData {
    Element {
        tag: String,
        namespace: Option<String>,
        attributes: BTreeMap<String, String>,
        properties: HashMap<String, String>,
        handlers: HashMap<String, Handler>,
    },
    Text(String),
}

struct MemoryNode {
    data: NodeData,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    /// Containers count as part of the live document.
    connected_root: bool,
}

/// Driver over an in-memory node table.
#[derive(Default)]
pub struct MemoryDriver {
    nodes: HashMap<HostNode, MemoryNode>,
    next: u64,
    ops: Vec<DriverOp>,
    focused: Option<HostNode>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, data: NodeData) -> HostNode {
        self.next += 1;
        let node = HostNode::new(self.next);
        self.nodes.insert(
            node,
            MemoryNode {
                data,
                parent: None,
                children: Vec::new(),
                connected_root: false,
            },
        );
        node
    }

    fn element_data(&self, node: HostNode) -> Option<&NodeData> {
        self.nodes
            .get(&node)
            .map(|entry| &entry.data)
            .filter(|data| matches!(data, NodeData::Element { .. }))
    }

    /// Create a connected container element to mount into.
    pub fn create_container(&mut self) -> HostNode {
        let node = self.allocate(NodeData::Element {
            tag: "#container".to_string(),
            namespace: None,
            attributes: BTreeMap::new(),
            properties: HashMap::new(),
            handlers: HashMap::new(),
        });
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.connected_root = true;
        }
        node
    }

    // =========================================================================
    // Recorded Calls
    // =========================================================================

    pub fn ops(&self) -> &[DriverOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Inserts that relocated an already attached node.
    pub fn moves(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DriverOp::Insert { moved: true, .. }))
            .count()
    }

    // =========================================================================
    // Structure Inspection
    // =========================================================================

    pub fn children_of(&self, node: HostNode) -> Vec<HostNode> {
        self.nodes
            .get(&node)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, node: HostNode) -> Option<HostNode> {
        self.nodes.get(&node).and_then(|entry| entry.parent)
    }

    pub fn attribute(&self, node: HostNode, name: &str) -> Option<String> {
        match self.element_data(node)? {
            NodeData::Element { attributes, .. } => attributes.get(name).cloned(),
            NodeData::Text(_) => None,
        }
    }

    pub fn handler(&self, node: HostNode, name: &str) -> Option<Handler> {
        match self.element_data(node)? {
            NodeData::Element { handlers, .. } => handlers.get(name).cloned(),
            NodeData::Text(_) => None,
        }
    }

    pub fn namespace(&self, node: HostNode) -> Option<String> {
        match self.element_data(node)? {
            NodeData::Element { namespace, .. } => namespace.clone(),
            NodeData::Text(_) => None,
        }
    }

    pub fn text_of(&self, node: HostNode) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Text(content) => Some(content),
            NodeData::Element { .. } => None,
        }
    }

    pub fn focused(&self) -> Option<HostNode> {
        self.focused
    }

    /// Elements below `root` with the given tag, in document order.
    pub fn find_all(&self, root: HostNode, tag: &str) -> Vec<HostNode> {
        let mut found = Vec::new();
        self.collect(root, tag, &mut found);
        found
    }

    fn collect(&self, node: HostNode, tag: &str, found: &mut Vec<HostNode>) {
        for child in self.children_of(node) {
            if let Some(NodeData::Element { tag: child_tag, .. }) = self.element_data(child) {
                if child_tag == tag {
                    found.push(child);
                }
            }
            self.collect(child, tag, found);
        }
    }

    /// Markup of `node`. A container serializes as its children only.
    ///
    /// Attributes are written in name order, text content is written raw.
    pub fn serialize(&self, node: HostNode) -> String {
        let mut out = String::new();
        match self.nodes.get(&node) {
            Some(entry) if entry.connected_root => {
                for child in &entry.children {
                    self.write_node(*child, &mut out);
                }
            }
            Some(_) => self.write_node(node, &mut out),
            None => {}
        }
        out
    }

    fn write_node(&self, node: HostNode, out: &mut String) {
        let Some(entry) = self.nodes.get(&node) else {
            return;
        };
        match &entry.data {
            NodeData::Text(content) => out.push_str(content),
            NodeData::Element {
                tag, attributes, ..
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                for child in &entry.children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    // =========================================================================
    // Event Dispatch
    // =========================================================================

    /// Simulate a user event on `node`.
    ///
    /// A `value` is stored as the live `value` property first, the way typing
    /// into a field would, without being recorded as an engine call. The
    /// handler runs with the driver borrow released.
    pub fn fire(driver: &Rc<RefCell<Self>>, node: HostNode, name: &str, value: Option<&str>) {
        let handler = {
            let mut this = driver.borrow_mut();
            if let Some(value) = value {
                if let Some(NodeData::Element { properties, .. }) =
                    this.nodes.get_mut(&node).map(|entry| &mut entry.data)
                {
                    properties.insert("value".to_string(), value.to_string());
                }
            }
            this.handler(node, name)
        };

        let Some(handler) = handler else {
            return;
        };
        let mut event = Event::new(name, node);
        if let Some(value) = value {
            event = event.with_value(value);
        }
        handler.call(&event);
    }

    fn detach_from_parent(&mut self, node: HostNode) -> bool {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|entry| entry.parent.take()) else {
            return false;
        };
        if let Some(entry) = self.nodes.get_mut(&parent) {
            entry.children.retain(|child| *child != node);
        }
        true
    }
}

impl Driver for MemoryDriver {
    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> HostNode {
        let node = self.allocate(NodeData::Element {
            tag: tag.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: BTreeMap::new(),
            properties: HashMap::new(),
            handlers: HashMap::new(),
        });
        self.ops.push(DriverOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, content: &str) -> HostNode {
        let node = self.allocate(NodeData::Text(content.to_string()));
        self.ops.push(DriverOp::CreateText { node });
        node
    }

    fn set_text(&mut self, node: HostNode, content: &str) {
        if let Some(NodeData::Text(current)) = self.nodes.get_mut(&node).map(|entry| &mut entry.data) {
            content.clone_into(current);
        }
        self.ops.push(DriverOp::SetText {
            node,
            content: content.to_string(),
        });
    }

    fn set_attribute(&mut self, node: HostNode, name: &str, value: &str) {
        if let Some(NodeData::Element { attributes, .. }) =
            self.nodes.get_mut(&node).map(|entry| &mut entry.data)
        {
            attributes.insert(name.to_string(), value.to_string());
        }
        self.ops.push(DriverOp::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn remove_attribute(&mut self, node: HostNode, name: &str) {
        if let Some(NodeData::Element { attributes, .. }) =
            self.nodes.get_mut(&node).map(|entry| &mut entry.data)
        {
            attributes.remove(name);
        }
        self.ops.push(DriverOp::RemoveAttribute {
            node,
            name: name.to_string(),
        });
    }

    fn set_property(&mut self, node: HostNode, name: &str, value: &str) {
        if let Some(NodeData::Element { properties, .. }) =
            self.nodes.get_mut(&node).map(|entry| &mut entry.data)
        {
            properties.insert(name.to_string(), value.to_string());
        }
        self.ops.push(DriverOp::SetProperty {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn property(&self, node: HostNode, name: &str) -> Option<String> {
        match self.element_data(node)? {
            NodeData::Element { properties, .. } => properties.get(name).cloned(),
            NodeData::Text(_) => None,
        }
    }

    fn set_handler(&mut self, node: HostNode, name: &str, handler: Option<Handler>) {
        let installed = handler.is_some();
        if let Some(NodeData::Element { handlers, .. }) =
            self.nodes.get_mut(&node).map(|entry| &mut entry.data)
        {
            match handler {
                Some(handler) => {
                    handlers.insert(name.to_string(), handler);
                }
                None => {
                    handlers.remove(name);
                }
            }
        }
        self.ops.push(DriverOp::SetHandler {
            node,
            name: name.to_string(),
            installed,
        });
    }

    fn insert(&mut self, parent: HostNode, node: HostNode, predecessor: Option<HostNode>) {
        let moved = self.detach_from_parent(node);

        if let Some(entry) = self.nodes.get_mut(&parent) {
            let index = match predecessor {
                Some(anchor) => entry
                    .children
                    .iter()
                    .position(|child| *child == anchor)
                    .map_or(entry.children.len(), |position| position + 1),
                None => 0,
            };
            entry.children.insert(index, node);
        }
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.parent = Some(parent);
        }
        self.ops.push(DriverOp::Insert {
            parent,
            node,
            moved,
        });
    }

    fn remove(&mut self, node: HostNode) {
        self.detach_from_parent(node);
        if self.focused == Some(node) {
            self.focused = None;
        }
        self.ops.push(DriverOp::Remove { node });
    }

    fn focus(&mut self, node: HostNode) {
        self.focused = Some(node);
        self.ops.push(DriverOp::Focus { node });
    }

    fn is_connected(&self, node: HostNode) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            let Some(entry) = self.nodes.get(&candidate) else {
                return false;
            };
            if entry.connected_root {
                return true;
            }
            current = entry.parent;
        }
        false
    }
}
