//! Core types for spark-reconciler.
//!
//! These types are shared by the element layer, the driver boundary and the
//! engine. They carry no behaviour of their own.

use std::fmt;

// =============================================================================
// Host Node
// =============================================================================

/// Opaque handle to a node realized by a [`Driver`](crate::driver::Driver).
///
/// The engine never looks inside a handle. It only passes handles back to the
/// driver that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u64);

impl HostNode {
    /// Wrap a raw driver-side identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw driver-side identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

// =============================================================================
// Key
// =============================================================================

/// Explicit identity of an element within its sibling group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(value)
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key(value.to_string())
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Key(value.to_string())
    }
}

// =============================================================================
// Node Type
// =============================================================================

/// Kind of a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// The unique top-level instance bound to a mount target.
    Root,
    /// A realized platform element (`div`, `input`, `svg`, ...).
    Host,
    /// A realized text node.
    Text,
    /// A transparent group of children with no node of its own.
    Fragment,
    /// User render logic owning the subtree it produced.
    Component,
}

impl NodeType {
    /// Capabilities every instance of this kind has.
    pub const fn capabilities(self) -> Capabilities {
        match self {
            NodeType::Root => Capabilities::ROOT
                .union(Capabilities::OWNS_CHILDREN)
                .union(Capabilities::HOST_PARENT),
            NodeType::Host => Capabilities::REALIZED
                .union(Capabilities::OWNS_CHILDREN)
                .union(Capabilities::HOST_PARENT),
            NodeType::Text => Capabilities::REALIZED,
            NodeType::Fragment => Capabilities::OWNS_CHILDREN,
            NodeType::Component => Capabilities::COMPONENT.union(Capabilities::OWNS_CHILDREN),
        }
    }
}

// =============================================================================
// Capabilities
// =============================================================================

bitflags::bitflags! {
    /// Capability set of an instance, used by upward `find` predicates.
    ///
    /// Combine with bitwise OR: `Capabilities::COMPONENT | Capabilities::BOUNDARY`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        const NONE = 0;
        /// Owns a node in the host structure.
        const REALIZED = 1 << 0;
        /// Owns an ordered list of child instances.
        const OWNS_CHILDREN = 1 << 1;
        /// Children insert their nodes directly into this instance's node.
        const HOST_PARENT = 1 << 2;
        const COMPONENT = 1 << 3;
        /// Catches render failures of its descendants.
        const BOUNDARY = 1 << 4;
        const ROOT = 1 << 5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_capabilities() {
        assert!(NodeType::Host.capabilities().contains(Capabilities::REALIZED));
        assert!(NodeType::Host.capabilities().contains(Capabilities::HOST_PARENT));
        assert!(!NodeType::Fragment.capabilities().contains(Capabilities::REALIZED));
        assert!(!NodeType::Fragment.capabilities().contains(Capabilities::HOST_PARENT));
        assert!(NodeType::Root.capabilities().contains(Capabilities::ROOT));
        assert!(!NodeType::Text.capabilities().contains(Capabilities::OWNS_CHILDREN));
    }

    #[test]
    fn test_key_conversions() {
        assert_eq!(Key::from("a"), Key::from("a".to_string()));
        assert_eq!(Key::from(3usize).as_str(), "3");
        assert_eq!(Key::from(7u64).to_string(), "7");
    }
}
