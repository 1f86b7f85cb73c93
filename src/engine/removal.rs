//! Removal - Subtree teardown and deferred detachment.
//!
//! Removal runs in two passes. The teardown pass walks the subtree
//! descendant-first while every node is still attached, so component logic
//! sees `will_unmount` and drops its subscriptions before anything leaves the
//! host structure. The release pass then detaches only the topmost realized nodes,
//! announcing each of them once to its ancestors through
//! `element_will_unmount`, and frees the instances.
//!
//! A component may answer that announcement with [`Unmount::Defer`], for
//! example to play an exit transition. The node then stays in the host
//! structure until the [`PendingRemoval`] completes:
//!
//! ```ignore
//! fn element_will_unmount(&mut self, node: HostNode) -> Unmount {
//!     let (pending, completer) = PendingRemoval::channel();
//!     self.transitions.push((node, completer));
//!     Unmount::Defer(pending)
//! }
//! ```
//!
//! Completions that arrive after the node's host parent was itself removed
//! are ignored.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::instance::InstanceKind;
use super::registry::InstanceId;
use super::tree::Tree;
use crate::error::{Result, StructuralError};
use crate::types::{HostNode, NodeType};

// =============================================================================
// Removal Results
// =============================================================================

/// Answer of an ancestor to an upcoming detachment.
#[derive(Debug, Clone)]
pub enum Unmount {
    /// Not handled here, ask the next ancestor.
    Bubble,
    /// Detach right away.
    Handled,
    /// Keep the node attached until the removal completes.
    Defer(PendingRemoval),
}

/// Outcome of removing an instance.
#[derive(Debug, Clone)]
#[must_use]
pub enum Removal {
    Completed,
    /// Some realized node is still attached, waiting for completion.
    Pending(PendingRemoval),
}

impl Removal {
    pub fn is_pending(&self) -> bool {
        matches!(self, Removal::Pending(pending) if !pending.is_complete())
    }

    /// Single removal that completes once every part has completed.
    pub fn join(removals: impl IntoIterator<Item = Removal>) -> Removal {
        let pending: Vec<PendingRemoval> = removals
            .into_iter()
            .filter_map(|removal| match removal {
                Removal::Pending(pending) if !pending.is_complete() => Some(pending),
                _ => None,
            })
            .collect();
        if pending.is_empty() {
            return Removal::Completed;
        }

        let (joined, completer) = PendingRemoval::channel();
        let remaining = Rc::new(Cell::new(pending.len()));
        let completer = Rc::new(RefCell::new(Some(completer)));
        for part in pending {
            let remaining = remaining.clone();
            let completer = completer.clone();
            part.on_complete(move || {
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    let last = completer.borrow_mut().take();
                    if let Some(completer) = last {
                        completer.complete();
                    }
                }
            });
        }
        Removal::Pending(joined)
    }
}

// =============================================================================
// Pending Removal
// =============================================================================

#[derive(Default)]
struct PendingState {
    complete: Cell<bool>,
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Notification channel of a deferred removal.
#[derive(Clone)]
pub struct PendingRemoval {
    state: Rc<PendingState>,
}

/// Completing side of a [`PendingRemoval`].
pub struct RemovalCompleter {
    state: Rc<PendingState>,
}

impl PendingRemoval {
    pub fn channel() -> (PendingRemoval, RemovalCompleter) {
        let state = Rc::new(PendingState::default());
        (
            PendingRemoval {
                state: state.clone(),
            },
            RemovalCompleter { state },
        )
    }

    pub fn is_complete(&self) -> bool {
        self.state.complete.get()
    }

    /// Run `callback` on completion, or right away when already complete.
    pub fn on_complete(&self, callback: impl FnOnce() + 'static) {
        if self.is_complete() {
            callback();
        } else {
            self.state.callbacks.borrow_mut().push(Box::new(callback));
        }
    }
}

impl RemovalCompleter {
    pub fn complete(self) {
        self.state.complete.set(true);
        let callbacks = std::mem::take(&mut *self.state.callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }
}

impl fmt::Debug for PendingRemoval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRemoval")
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl fmt::Debug for RemovalCompleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RemovalCompleter(..)")
    }
}

// =============================================================================
// Teardown
// =============================================================================

impl Tree {
    /// Tear down `id` and its subtree, then release it.
    ///
    /// With `prepare` the topmost realized nodes are announced and detached.
    /// Without it they are left to the detachment of an ancestor node.
    pub(crate) fn remove(&mut self, id: InstanceId, prepare: bool) -> Result<Removal> {
        if self.instance(id)?.node_type() == NodeType::Root {
            return Err(StructuralError::RootRemoval.into());
        }
        self.teardown(id)?;
        self.release(id, prepare)
    }

    /// Descendant-first pass that runs while every node is still attached.
    fn teardown(&mut self, id: InstanceId) -> Result<()> {
        let instance = self.instance(id)?;
        let node_type = instance.node_type();
        for child in instance.children.clone() {
            self.teardown(child)?;
        }

        match node_type {
            NodeType::Component => self.teardown_component(id)?,
            NodeType::Host => self.forget_host(id),
            _ => {}
        }
        Ok(())
    }

    fn release(&mut self, id: InstanceId, prepare: bool) -> Result<Removal> {
        let instance = self.instance(id)?;
        let node_type = instance.node_type();
        let realized = instance.realized();
        let children = instance.children.clone();

        let removal = match node_type {
            NodeType::Root => return Err(StructuralError::RootRemoval.into()),
            NodeType::Host => {
                for child in children {
                    // Children leave together with this node.
                    let _ = self.release(child, false)?;
                }
                self.detach(id, realized, prepare)?
            }
            NodeType::Text => self.detach(id, realized, prepare)?,
            NodeType::Fragment | NodeType::Component => self.release_children(children, prepare)?,
        };

        self.registry.release(id);
        trace!(instance = %id, ?node_type, "released");
        Ok(removal)
    }

    fn release_children(&mut self, children: Vec<InstanceId>, prepare: bool) -> Result<Removal> {
        let mut removals = Vec::with_capacity(children.len());
        for child in children {
            removals.push(self.release(child, prepare)?);
        }
        Ok(Removal::join(removals))
    }

    fn detach(&mut self, id: InstanceId, node: Option<HostNode>, prepare: bool) -> Result<Removal> {
        match node {
            Some(node) if prepare => self.detach_realized(id, node),
            _ => Ok(Removal::Completed),
        }
    }

    /// Announce the detachment of `node` and detach it, now or on completion.
    fn detach_realized(&mut self, id: InstanceId, node: HostNode) -> Result<Removal> {
        let host_parent = self.host_parent_of(id)?;
        let driver = self.instance(id)?.options.driver.clone();

        match self.notify_will_unmount(id, node) {
            Unmount::Defer(pending) if !pending.is_complete() => {
                trace!(instance = %id, %node, "detachment deferred");
                self.deferred.borrow_mut().insert(node, host_parent);

                let deferred = self.deferred.clone();
                pending.on_complete(move || {
                    let waiting = deferred.borrow_mut().remove(&node).is_some();
                    if waiting {
                        driver.with(|d| d.remove(node));
                    } else {
                        trace!(%node, "ignoring late removal completion");
                    }
                });
                Ok(Removal::Pending(pending))
            }
            _ => {
                driver.with(|d| d.remove(node));
                Ok(Removal::Completed)
            }
        }
    }

    /// Drop engine bookkeeping attached to a host that is going away.
    fn forget_host(&mut self, id: InstanceId) {
        self.pending_focus.retain(|pending| *pending != id);
        self.deferred
            .borrow_mut()
            .retain(|_, host_parent| *host_parent != id);
        if let Some(instance) = self.registry.get(id) {
            if let InstanceKind::Host(state) = &instance.kind {
                trace!(instance = %id, tag = %state.tag, "forgetting host");
            }
        }
    }
}
