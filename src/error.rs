//! Error types.
//!
//! Two kinds of failure leave the engine:
//! - render failures that no boundary caught ([`Error::Render`])
//! - structural failures, which are programming or integration errors and
//!   are never recovered ([`StructuralError`])

use thiserror::Error;

use crate::engine::InstanceId;

/// Result type used by the render entry points.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure surfaced to the caller of a render entry point.
#[derive(Debug, Error)]
pub enum Error {
    /// Render logic failed and the guard chain reached the top without a boundary.
    #[error("render failed outside of any error boundary: {0:#}")]
    Render(anyhow::Error),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl Error {
    /// The original render failure, if this is one.
    pub fn render_failure(&self) -> Option<&anyhow::Error> {
        match self {
            Error::Render(err) => Some(err),
            Error::Structural(_) => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Structural(_))
    }
}

/// An operation was attempted without a required tree relationship.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("can't append element to not existing parent")]
    MissingParent,

    #[error("the root element can't remove itself")]
    RootRemoval,

    #[error("instance {0} is not part of the tree")]
    UnknownInstance(InstanceId),

    #[error("a render pass is already in progress")]
    Reentrant,

    #[error("instance registry is full")]
    RegistryFull,
}
