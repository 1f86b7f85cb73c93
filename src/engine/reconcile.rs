//! Children Reconciliation - Keyed/positional list diffing.
//!
//! Given the current children `O` of an owner and new descriptions `N`:
//!
//! 1. Every entry gets an [`Identity`]: kind + tag or component type, plus
//!    its explicit key or, without one, its position in the sibling list.
//! 2. `N` is walked left to right. The first old instance with the same
//!    identity is reused, otherwise a fresh instance is mounted.
//! 3. Old instances nobody claimed are removed before the walk starts.
//! 4. A reused instance is moved only when its rank among the reused
//!    instances changed. For a pure permutation that is exactly "new index
//!    differs from old index".
//! 5. Anchors are recomputed from the partially rebuilt child list, so each
//!    child lands right after its previous live sibling.
//!
//! When a new list repeats an identity, the first occurrence wins the reuse
//! and every later duplicate is mounted fresh.
//!
//! # Example
//!
//! ```text
//! old: [a b c]        new: [c a b]
//!
//! ranks:  c 2 -> 0    a 0 -> 1    b 1 -> 2      (all three move)
//! result: host order c a b, no mounts, no removals
//! ```

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::registry::InstanceId;
use super::tree::Tree;
use crate::element::{Element, ElementType};
use crate::error::Result;
use crate::pipeline::Pass;
use crate::types::Key;

// =============================================================================
// Identity
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum KindTag {
    Root,
    Host(String),
    Text,
    Fragment,
    /// Component types compare by reference.
    Component(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
    Keyed(Key),
    Position(usize),
}

/// Reconciliation identity of one sibling entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Identity {
    pub(crate) kind: KindTag,
    pub(crate) slot: Slot,
}

impl Identity {
    pub(crate) fn of(element: &Element, position: usize) -> Self {
        let kind = match element.ty() {
            ElementType::Host(tag) => KindTag::Host(tag.clone()),
            ElementType::Text(_) => KindTag::Text,
            ElementType::Fragment => KindTag::Fragment,
            ElementType::Component(ty) => KindTag::Component(ty.id()),
        };
        let slot = match element.get_key() {
            Some(key) => Slot::Keyed(key.clone()),
            None => Slot::Position(position),
        };
        Self { kind, slot }
    }
}

enum Step {
    /// Reuse the old child at this index.
    Reuse(usize),
    Mount(Identity),
}

// =============================================================================
// Algorithm
// =============================================================================

impl Tree {
    /// Reconcile the children of `owner` against `elements`.
    pub(crate) fn reconcile_children(
        &mut self,
        cx: &Pass,
        owner: InstanceId,
        elements: &[Element],
    ) -> Result<()> {
        let old = self.instance(owner)?.children.clone();

        // First old occurrence of every identity.
        let mut available: HashMap<Identity, usize> = HashMap::with_capacity(old.len());
        for (index, child) in old.iter().enumerate() {
            let identity = self.instance(*child)?.identity.clone();
            available.entry(identity).or_insert(index);
        }

        let mut seen = HashSet::with_capacity(elements.len());
        let mut consumed = vec![false; old.len()];
        let mut steps = Vec::with_capacity(elements.len());
        for (position, element) in elements.iter().enumerate() {
            let identity = Identity::of(element, position);
            if !seen.insert(identity.clone()) {
                debug!(owner = %owner, ?identity, "duplicate identity, mounting fresh");
                steps.push(Step::Mount(identity));
                continue;
            }
            match available.remove(&identity) {
                Some(index) => {
                    consumed[index] = true;
                    steps.push(Step::Reuse(index));
                }
                None => steps.push(Step::Mount(identity)),
            }
        }

        self.instance_mut(owner)?.children.clear();
        for (index, child) in old.iter().enumerate() {
            if consumed[index] {
                continue;
            }
            match self.remove(*child, true) {
                Ok(removal) => {
                    trace!(owner = %owner, instance = %child, pending = removal.is_pending(), "removed child");
                }
                Err(err) => {
                    self.keep_live_children(owner, old.iter().copied());
                    return Err(err);
                }
            }
        }

        // Old rank of each reused instance is its position among reused old indices.
        let mut reused_order: Vec<usize> = steps
            .iter()
            .filter_map(|step| match step {
                Step::Reuse(index) => Some(*index),
                Step::Mount(_) => None,
            })
            .collect();
        reused_order.sort_unstable();

        let mut rank = 0;
        for (position, (element, step)) in elements.iter().zip(&steps).enumerate() {
            let placed = match step {
                Step::Reuse(index) => {
                    let old_rank = reused_order.binary_search(index).unwrap_or(rank);
                    let moved = old_rank != rank;
                    rank += 1;
                    self.reuse_child(cx, owner, old[*index], moved, element)
                }
                Step::Mount(identity) => self
                    .mount(cx, owner, element, identity.clone())
                    .map(|_| ()),
            };

            if let Err(err) = placed {
                // Children not reached yet stay owned, in their old order.
                let unvisited = steps[position + 1..].iter().filter_map(|step| match step {
                    Step::Reuse(index) => Some(old[*index]),
                    Step::Mount(_) => None,
                });
                self.keep_live_children(owner, unvisited);
                return Err(err);
            }
        }
        Ok(())
    }

    fn reuse_child(
        &mut self,
        cx: &Pass,
        owner: InstanceId,
        child: InstanceId,
        moved: bool,
        element: &Element,
    ) -> Result<()> {
        self.instance_mut(owner)?.children.push(child);
        if moved {
            let predecessor = self.predecessor_of(child)?;
            self.move_instance(child, predecessor)?;
        }
        self.reconcile(cx, child, element)
    }

    /// Append the still registered `children` back to `owner`.
    fn keep_live_children(&mut self, owner: InstanceId, children: impl IntoIterator<Item = InstanceId>) {
        let live: Vec<InstanceId> = children
            .into_iter()
            .filter(|child| self.registry.contains(*child))
            .collect();
        if let Some(instance) = self.registry.get_mut(owner) {
            instance.children.extend(live);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::driver::DriverOp;
    use crate::element::{Element, Props};
    use crate::engine::{Component, ComponentType, InstanceId, Scope, Unmount};
    use crate::testing::Harness;
    use crate::types::HostNode;

    fn keyed_list(keys: &[&str]) -> Element {
        Element::host("ul").with_children(
            keys.iter()
                .map(|key| Element::host("li").key(*key).child(Element::text(*key))),
        )
    }

    fn mounts_and_removals(ops: &[DriverOp]) -> usize {
        ops.iter()
            .filter(|op| {
                matches!(
                    op,
                    DriverOp::CreateElement { .. }
                        | DriverOp::CreateText { .. }
                        | DriverOp::Remove { .. }
                )
            })
            .count()
    }

    #[test]
    fn test_unchanged_list_is_idempotent() {
        let harness = Harness::mount(keyed_list(&["a", "b", "c"]));
        let before: Vec<InstanceId> = harness.renderer.children(harness.top());
        harness.clear_ops();

        harness.render(keyed_list(&["a", "b", "c"]));

        assert!(harness.ops().is_empty(), "unexpected ops: {:?}", harness.ops());
        assert_eq!(harness.renderer.children(harness.top()), before);
    }

    #[test]
    fn test_unkeyed_list_is_idempotent() {
        let list = || {
            Element::host("div").with_children([
                Element::host("p").prop("class", "a"),
                Element::text("hello"),
                Element::fragment([Element::host("span")]),
            ])
        };
        let harness = Harness::mount(list());
        harness.clear_ops();

        harness.render(list());
        assert!(harness.ops().is_empty());
    }

    #[test]
    fn test_rotation_moves_without_remounting() {
        let harness = Harness::mount(keyed_list(&["a", "b", "c"]));
        let before = harness.renderer.children(harness.top());
        harness.clear_ops();

        harness.render(keyed_list(&["c", "a", "b"]));

        assert_eq!(
            harness.html(),
            "<ul><li>c</li><li>a</li><li>b</li></ul>"
        );
        assert_eq!(mounts_and_removals(&harness.ops()), 0);
        // Every entry changed index.
        assert_eq!(harness.moves(), 3);

        let after = harness.renderer.children(harness.top());
        assert_eq!(after, vec![before[2], before[0], before[1]]);
    }

    #[test]
    fn test_permutation_moves_only_displaced_entries() {
        let harness = Harness::mount(keyed_list(&["a", "b", "c", "d", "e"]));
        harness.clear_ops();

        // a, c and e keep their index.
        harness.render(keyed_list(&["a", "d", "c", "b", "e"]));

        assert_eq!(
            harness.html(),
            "<ul><li>a</li><li>d</li><li>c</li><li>b</li><li>e</li></ul>"
        );
        assert_eq!(harness.moves(), 2);
        assert_eq!(mounts_and_removals(&harness.ops()), 0);
    }

    #[test]
    fn test_reverse_order() {
        let harness = Harness::mount(keyed_list(&["a", "b", "c", "d"]));
        harness.clear_ops();

        harness.render(keyed_list(&["d", "c", "b", "a"]));

        assert_eq!(
            harness.html(),
            "<ul><li>d</li><li>c</li><li>b</li><li>a</li></ul>"
        );
        assert_eq!(harness.moves(), 4);
        assert_eq!(mounts_and_removals(&harness.ops()), 0);
    }

    #[test]
    fn test_insert_and_remove_keep_survivors_in_place() {
        let harness = Harness::mount(keyed_list(&["a", "b", "c"]));
        let before = harness.renderer.children(harness.top());
        harness.clear_ops();

        harness.render(keyed_list(&["x", "a", "c", "y"]));

        assert_eq!(
            harness.html(),
            "<ul><li>x</li><li>a</li><li>c</li><li>y</li></ul>"
        );
        // a and c keep their relative order.
        assert_eq!(harness.moves(), 0);

        let after = harness.renderer.children(harness.top());
        assert_eq!(after[1], before[0]);
        assert_eq!(after[2], before[2]);
        assert!(harness.renderer.node_type(before[1]).is_none());
    }

    #[test]
    fn test_kind_change_remounts() {
        let harness = Harness::mount(Element::host("div").child(Element::host("p")));
        let before = harness.renderer.children(harness.top());

        harness.render(Element::host("div").child(Element::host("span")));

        let after = harness.renderer.children(harness.top());
        assert_ne!(before, after);
        assert_eq!(harness.html(), "<div><span></span></div>");
    }

    #[test]
    fn test_text_updates_in_place() {
        let harness = Harness::mount(Element::host("p").child(Element::text("one")));
        let before = harness.renderer.children(harness.top());

        harness.render(Element::host("p").child(Element::text("two")));

        assert_eq!(harness.renderer.children(harness.top()), before);
        assert_eq!(harness.html(), "<p>two</p>");
    }

    #[test]
    fn test_duplicate_keys_first_occurrence_wins() {
        let harness = Harness::mount(keyed_list(&["x", "y"]));
        let before = harness.renderer.children(harness.top());

        harness.render(keyed_list(&["x", "x", "y"]));

        let after = harness.renderer.children(harness.top());
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        assert_ne!(after[1], before[0]);
        assert_eq!(after[2], before[1]);
        assert_eq!(
            harness.html(),
            "<ul><li>x</li><li>x</li><li>y</li></ul>"
        );

        // The second x is never reused, even when an old duplicate exists.
        let duplicated = harness.renderer.children(harness.top());
        harness.render(keyed_list(&["x", "x"]));
        let after = harness.renderer.children(harness.top());
        assert_eq!(after[0], duplicated[0]);
        assert_ne!(after[1], duplicated[1]);
        assert!(harness.renderer.node_type(duplicated[1]).is_none());
    }

    #[test]
    fn test_fragment_children_move_together() {
        let group = |key: &str| {
            Element::fragment([Element::text(format!("{key}1")), Element::text(format!("{key}2"))])
                .key(key)
        };
        let harness = Harness::mount(Element::host("div").with_children([group("a"), group("b")]));
        harness.clear_ops();

        harness.render(Element::host("div").with_children([group("b"), group("a")]));

        assert_eq!(harness.html(), "<div>b1b2a1a2</div>");
        assert_eq!(mounts_and_removals(&harness.ops()), 0);
    }

    #[test]
    fn test_failed_render_keeps_unvisited_children() {
        let broken = ComponentType::from_fn("Broken", |_props, _scope| {
            anyhow::bail!("cannot render")
        });
        let harness = Harness::mount(keyed_list(&["1", "2", "3"]));
        let before = harness.renderer.children(harness.top());

        let failing = Element::host("ul").with_children([
            Element::host("li").key("1").child(Element::text("1")),
            Element::component(&broken),
            Element::host("li").key("2").child(Element::text("2")),
            Element::host("li").key("3").child(Element::text("3")),
        ]);
        assert!(harness.renderer.render(failing).is_err());

        // 2 and 3 were never reached but are still owned by the list.
        let children = harness.renderer.children(harness.top());
        assert!(children.contains(&before[1]));
        assert!(children.contains(&before[2]));

        harness.render(keyed_list(&["1", "2", "3"]));
        assert_eq!(harness.html(), "<ul><li>1</li><li>2</li><li>3</li></ul>");
        assert_eq!(harness.renderer.children(harness.top()), before);
    }

    struct Interceptor {
        seen: Rc<RefCell<Vec<HostNode>>>,
    }

    impl Component for Interceptor {
        fn render(&mut self, _props: &Props, scope: &mut Scope<'_>) -> anyhow::Result<Element> {
            Ok(Element::fragment(scope.children().to_vec()))
        }

        fn element_will_unmount(&mut self, node: HostNode) -> Unmount {
            self.seen.borrow_mut().push(node);
            Unmount::Handled
        }
    }

    #[test]
    fn test_removal_notifies_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let shared = seen.clone();
        let interceptor = ComponentType::new("Interceptor", move || Interceptor {
            seen: shared.clone(),
        });

        let view = |keys: &[&str]| {
            Element::component(&interceptor).with_children(keys.iter().map(|key| {
                Element::host("section")
                    .key(*key)
                    .child(Element::host("p").child(Element::text(*key)))
            }))
        };

        let harness = Harness::mount(view(&["a", "b"]));
        let section_b = harness.find_all("section")[1];

        harness.render(view(&["a"]));

        assert_eq!(seen.borrow().as_slice(), &[section_b]);
        assert_eq!(harness.html(), "<section><p>a</p></section>");
    }
}
