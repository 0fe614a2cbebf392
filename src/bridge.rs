//! Capability interface over the platform accessibility tree.
//!
//! The engine never touches the AX API directly: every read and write goes
//! through [`ElementBridge`], which makes the engine testable with an
//! in-memory tree and keeps the platform surface in one module
//! (`macos::ax`). Implementations cache nothing — accessibility nodes back
//! live, externally-mutated UI, so every call queries fresh state.

use std::fmt;

use crate::geometry::{Point, Size};

/// Errors from accessibility-tree I/O. Each variant carries the raw
/// platform error code so logs stay diagnosable when the tree shape drifts
/// across OS versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementError {
    /// The node vanished or the reference went stale. Drop the node and
    /// move on.
    Invalid(i32),
    /// The node exists but does not support the requested attribute.
    /// Logged once, then skipped for that node's lifetime.
    Unsupported(i32),
    /// Accessibility access was revoked. Fatal to the whole engine until
    /// the user regrants it.
    PermissionDenied(i32),
    /// Temporary platform hiccup; worth a bounded local retry.
    Transient(i32),
}

impl ElementError {
    pub fn code(&self) -> i32 {
        match *self {
            ElementError::Invalid(c)
            | ElementError::Unsupported(c)
            | ElementError::PermissionDenied(c)
            | ElementError::Transient(c) => c,
        }
    }
}

impl fmt::Display for ElementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementError::Invalid(c) => write!(f, "invalid element (ax error {})", c),
            ElementError::Unsupported(c) => write!(f, "unsupported attribute (ax error {})", c),
            ElementError::PermissionDenied(c) => {
                write!(f, "accessibility access denied (ax error {})", c)
            }
            ElementError::Transient(c) => write!(f, "transient ax failure (ax error {})", c),
        }
    }
}

impl std::error::Error for ElementError {}

pub type ElementResult<T> = Result<T, ElementError>;

/// Thin, stateless abstraction over the accessibility tree of the overlay
/// host process. Node handles are poll-scoped: the engine re-validates (or
/// drops) them on every I/O and never assumes identity across polls.
pub trait ElementBridge {
    type Node: Clone;

    /// Root element of the process that hosts the overlays.
    fn overlay_root(&self) -> ElementResult<Self::Node>;

    fn children(&self, node: &Self::Node) -> ElementResult<Vec<Self::Node>>;

    fn size(&self, node: &Self::Node) -> ElementResult<Size>;

    /// Current position in AX (top-left-origin) coordinates.
    fn position(&self, node: &Self::Node) -> ElementResult<Point>;

    fn identifier(&self, node: &Self::Node) -> ElementResult<Option<String>>;

    fn subrole(&self, node: &Self::Node) -> ElementResult<Option<String>>;

    /// Stable numeric window id; the engine's identity key for tracking.
    fn window_id(&self, node: &Self::Node) -> ElementResult<u32>;

    fn is_position_writable(&self, node: &Self::Node) -> ElementResult<bool>;

    fn set_position(&self, node: &Self::Node, point: Point) -> ElementResult<()>;
}
