//! Render Pipeline
//!
//! Connects the instance tree to the outside world: the root entry points,
//! and the scheduler every update travels through.
//!
//! # Pipeline Architecture
//!
//! ```text
//! mount / Renderer::render ─┐
//! store notification ───────┼─► Scheduler ─► Tree pass ─► Driver calls
//! boundary re-render ───────┘        │
//!                                    └─► autofocus flush
//! ```
//!
//! ## Key Design Principles
//!
//! - **One pass at a time**: a pass owns the tree until it completes
//! - **Weak back-references**: updaters and engine handlers never keep a tree alive
//! - **Errors go somewhere**: to the caller of the entry point, or to
//!   [`Renderer::take_error`] when nobody is waiting

mod mount;
mod scheduler;

pub use mount::{mount, Renderer};
pub(crate) use scheduler::{Pass, Scheduler};
