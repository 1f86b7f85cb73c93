//! Scheduler - Runs render passes to completion, one at a time.
//!
//! A pass holds the tree exclusively. Work requested while a pass is in
//! flight (a store written from inside a render, a boundary catching a
//! failure) is appended to a FIFO and executed right after it, in arrival
//! order. Requests arriving outside a pass execute immediately.
//!
//! ```text
//! request(id) ─► queue.push_back(id) ─► tree free? ── no ──► picked up by the active pass
//!                                           │
//!                                          yes
//!                                           ▼
//!                              pop ─► rerender ─► flush focus ─► repeat
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::{error, trace, warn};

use crate::element::{Event, Handler, PropValue};
use crate::engine::{ChangeProbe, InstanceId, Tree, Updater, ValueStrategy};
use crate::error::{Error, Result, StructuralError};

// =============================================================================
// Pass Context
// =============================================================================

/// Context handed through one render pass.
pub(crate) struct Pass {
    scheduler: Weak<Scheduler>,
    probe: Option<Rc<ChangeProbe>>,
}

impl Pass {
    /// A context bound to no scheduler: updates requested through it are dropped.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            scheduler: Weak::new(),
            probe: None,
        }
    }

    pub(crate) fn updater(&self, id: InstanceId) -> Updater {
        Updater::new(self.scheduler.clone(), id)
    }

    /// How `value` writes to `id` are applied during this pass.
    pub(crate) fn strategy(&self, id: InstanceId) -> ValueStrategy<'_> {
        match &self.probe {
            Some(probe) if probe.target == id => ValueStrategy::PreserveLive(probe),
            _ => ValueStrategy::Apply,
        }
    }

    /// Engine-owned handler routing change events of `id` through the adapter.
    pub(crate) fn change_handler(&self, id: InstanceId) -> Handler {
        let scheduler = self.scheduler.clone();
        Handler::new(move |event| {
            if let Some(scheduler) = scheduler.upgrade() {
                scheduler.dispatch_change(id, event);
            }
        })
    }
}

// =============================================================================
// Scheduler
// =============================================================================

pub(crate) struct Scheduler {
    me: Weak<Scheduler>,
    tree: RefCell<Tree>,
    queue: RefCell<VecDeque<InstanceId>>,
    /// Failure raised where no caller could receive it.
    fatal: RefCell<Option<Error>>,
    /// Active while an application change handler runs.
    probe: RefCell<Option<Rc<ChangeProbe>>>,
}

impl Scheduler {
    pub(crate) fn new(tree: Tree) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            tree: RefCell::new(tree),
            queue: RefCell::new(VecDeque::new()),
            fatal: RefCell::new(None),
            probe: RefCell::new(None),
        })
    }

    fn pass(&self) -> Pass {
        Pass {
            scheduler: self.me.clone(),
            probe: self.probe.borrow().clone(),
        }
    }

    /// Run `work` as one pass, then everything it queued.
    pub(crate) fn run<R>(&self, work: impl FnOnce(&mut Tree, &Pass) -> Result<R>) -> Result<R> {
        let value = {
            let mut tree = self
                .tree
                .try_borrow_mut()
                .map_err(|_| StructuralError::Reentrant)?;
            let cx = self.pass();
            let value = work(&mut tree, &cx);
            tree.flush_focus();
            value
        };
        match value {
            Ok(value) => {
                self.drain()?;
                Ok(value)
            }
            Err(err) => {
                self.queue.borrow_mut().clear();
                Err(err)
            }
        }
    }

    /// Read-only access to the tree between passes.
    pub(crate) fn read<R>(&self, read: impl FnOnce(&Tree) -> R) -> Option<R> {
        self.tree.try_borrow().ok().map(|tree| read(&tree))
    }

    /// Queue a re-render of `id` and execute it unless a pass is in flight.
    pub(crate) fn schedule(&self, id: InstanceId) {
        self.queue.borrow_mut().push_back(id);
        if let Err(err) = self.drain() {
            error!(instance = %id, error = %err, "update failed");
            self.fatal.replace(Some(err));
        }
    }

    fn drain(&self) -> Result<()> {
        loop {
            let Ok(mut tree) = self.tree.try_borrow_mut() else {
                // The pass holding the tree drains the queue when it ends.
                return Ok(());
            };
            let Some(id) = self.queue.borrow_mut().pop_front() else {
                return Ok(());
            };

            trace!(instance = %id, "running queued update");
            let cx = self.pass();
            let result = tree.rerender(&cx, id);
            tree.flush_focus();
            if let Err(err) = result {
                drop(tree);
                self.queue.borrow_mut().clear();
                return Err(err);
            }
        }
    }

    pub(crate) fn take_error(&self) -> Option<Error> {
        self.fatal.take()
    }

    // =========================================================================
    // Change Adapter
    // =========================================================================

    /// Run the application `onchange` handler of `id` for a change event,
    /// then restore the controlled value if the handler didn't accept it.
    fn dispatch_change(&self, id: InstanceId, event: &Event) {
        let found = self
            .read(|tree| {
                let instance = tree.instance(id).ok()?;
                let handler = instance
                    .props
                    .get("onchange")
                    .and_then(PropValue::as_handler)?
                    .clone();
                let live = instance
                    .realized()
                    .and_then(|node| instance.options.driver.with(|d| d.property(node, "value")));
                Some((handler, live.or_else(|| event.value.clone())))
            })
            .flatten();
        let Some((handler, live)) = found else {
            warn!(instance = %id, event = %event.name, "change event without a handler, ignoring");
            return;
        };

        let probe = Rc::new(ChangeProbe::new(id, live.clone()));
        self.probe.replace(Some(probe.clone()));

        let mut forwarded = event.clone();
        forwarded.value = live;
        handler.call(&forwarded);

        self.probe.replace(None);
        if !probe.is_accepted() {
            if let Err(err) = self.run(|tree, _| tree.restore_controlled_value(id)) {
                error!(instance = %id, error = %err, "restoring controlled value failed");
                self.fatal.replace(Some(err));
            }
        }
    }
}
