//! Error Boundaries - Guarded invocation chain.
//!
//! Every instance inherits a [`Guard`] through its render options. Render
//! logic (and anything else a component wants protected) runs through
//! [`Guard::invoke`]:
//!
//! - [`Guard::Passthrough`] turns a failure into a fatal [`Error::Render`].
//! - [`Guard::Boundary`] marks its boundary as errored, schedules the
//!   boundary's re-render and answers [`Guarded::Caught`]. Nothing is
//!   re-raised, so the failure stops at the nearest boundary.
//!
//! The chain is built purely by inheritance: a healthy boundary forwards its
//! own guard to its children, an errored one forwards the guard it inherited.
//!
//! ```text
//! Root (Passthrough)
//! └── Try A (forwards A)
//!     ├── Component x        guard = A
//!     └── Try B (forwards B)
//!         └── Component y    guard = B    failure lands in B, never in A
//! ```

mod try_catch;

pub use try_catch::{try_catch, TRY_CATCH_CATCH, TRY_CATCH_CHILDREN};

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::engine::{InstanceId, Updater};
use crate::error::Error;

// =============================================================================
// Boundary
// =============================================================================

/// Failure state of one boundary instance.
pub struct Boundary {
    errored: Cell<bool>,
    updater: Updater,
}

impl Boundary {
    pub(crate) fn new(updater: Updater) -> Self {
        Self {
            errored: Cell::new(false),
            updater,
        }
    }

    /// Once set, it stays set for the lifetime of the boundary instance.
    pub fn is_errored(&self) -> bool {
        self.errored.get()
    }

    /// Boundary instance this state belongs to.
    pub fn instance(&self) -> InstanceId {
        self.updater.instance()
    }

    pub(crate) fn mark_errored(&self) {
        self.errored.set(true);
    }
}

impl fmt::Debug for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boundary")
            .field("instance", &self.instance())
            .field("errored", &self.is_errored())
            .finish()
    }
}

// =============================================================================
// Guard
// =============================================================================

/// Result of a guarded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    Completed(T),
    /// The failure was absorbed by a boundary.
    Caught,
}

impl<T> Guarded<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Guarded::Completed(value) => Some(value),
            Guarded::Caught => None,
        }
    }

    pub fn is_caught(&self) -> bool {
        matches!(self, Guarded::Caught)
    }
}

/// Active failure-catching function of a subtree.
#[derive(Clone, Default)]
pub enum Guard {
    /// No boundary above: failures are fatal.
    #[default]
    Passthrough,
    Boundary(Rc<Boundary>),
}

impl Guard {
    /// Run `callback`, resolving a failure according to this guard.
    pub fn invoke<T>(
        &self,
        callback: impl FnOnce() -> anyhow::Result<T>,
    ) -> Result<Guarded<T>, Error> {
        match callback() {
            Ok(value) => Ok(Guarded::Completed(value)),
            Err(err) => match self {
                Guard::Passthrough => Err(Error::Render(err)),
                Guard::Boundary(boundary) => {
                    debug!(boundary = %boundary.instance(), error = %err, "boundary caught failure");
                    boundary.mark_errored();
                    boundary.updater.request();
                    Ok(Guarded::Caught)
                }
            },
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, Guard::Boundary(_))
    }

    pub fn boundary(&self) -> Option<&Rc<Boundary>> {
        match self {
            Guard::Boundary(boundary) => Some(boundary),
            Guard::Passthrough => None,
        }
    }
}

impl PartialEq for Guard {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Guard::Passthrough, Guard::Passthrough) => true,
            (Guard::Boundary(a), Guard::Boundary(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Passthrough => f.write_str("Passthrough"),
            Guard::Boundary(boundary) => f.debug_tuple("Boundary").field(boundary).finish(),
        }
    }
}
