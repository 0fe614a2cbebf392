//! Depth-bounded discovery scan over the overlay host's accessibility tree.
//!
//! The tree is a foreign, externally-mutated graph: nodes appear and vanish
//! between (and during) scans, and nothing guarantees acyclicity. The walk
//! is therefore depth-bounded, holds no references across scans, and treats
//! per-node failures as "skip that subtree" rather than aborting the scan.
//! Only a permission failure stops everything, because nothing else in the
//! tree will be readable either.

use crate::bridge::{ElementBridge, ElementError, ElementResult};
use crate::classify::{ClassifierProfile, OverlayKind};
use crate::geometry::{Point, Size};

/// Maximum traversal depth below the application root. Banners and widget
/// panels sit within the first couple of levels; the bound guards against
/// runaway traversal of a misshapen tree.
pub(crate) const MAX_WALK_DEPTH: usize = 6;

/// A classifier match found during a scan.
pub(crate) struct Discovery<N> {
    pub node: N,
    pub window_id: u32,
    pub kind: OverlayKind,
    pub size: Size,
    /// Current position (AX coordinates) at scan time; used to pick the
    /// screen the overlay belongs to. Zero if unreadable.
    pub position: Point,
}

/// Walks the tree from the overlay root and returns every node the
/// classifier matches as `kind`.
///
/// An unavailable root (host process not running, node gone stale) yields
/// an empty scan; only `PermissionDenied` is propagated.
pub(crate) fn scan<B: ElementBridge>(
    bridge: &B,
    profile: &ClassifierProfile,
    kind: OverlayKind,
    max_depth: usize,
) -> ElementResult<Vec<Discovery<B::Node>>> {
    let root = match soften(bridge.overlay_root())? {
        Some(root) => root,
        None => {
            log::debug!("overlay root unavailable, skipping {} scan", kind.label());
            return Ok(Vec::new());
        }
    };

    let mut found = Vec::new();
    walk(bridge, profile, kind, &root, 0, max_depth, &mut found)?;
    Ok(found)
}

fn walk<B: ElementBridge>(
    bridge: &B,
    profile: &ClassifierProfile,
    kind: OverlayKind,
    node: &B::Node,
    depth: usize,
    max_depth: usize,
    found: &mut Vec<Discovery<B::Node>>,
) -> ElementResult<()> {
    if let Some(discovery) = classify_node(bridge, profile, node)? {
        if discovery.kind == kind {
            found.push(discovery);
        }
        // A matched window is a leaf as far as discovery is concerned.
        return Ok(());
    }

    if depth >= max_depth {
        return Ok(());
    }

    let Some(children) = soften(bridge.children(node))? else {
        return Ok(());
    };
    for child in &children {
        walk(bridge, profile, kind, child, depth + 1, max_depth, found)?;
    }
    Ok(())
}

/// Runs the classifier over one node. Nodes whose attributes cannot be read
/// are simply not candidates; a candidate without a readable window id is
/// untrackable and gets dropped with a log line.
fn classify_node<B: ElementBridge>(
    bridge: &B,
    profile: &ClassifierProfile,
    node: &B::Node,
) -> ElementResult<Option<Discovery<B::Node>>> {
    let Some(size) = soften(bridge.size(node))? else {
        return Ok(None);
    };
    let subrole = soften(bridge.subrole(node))?.flatten();
    let identifier = soften(bridge.identifier(node))?.flatten();

    let Some(kind) = profile.classify(size, subrole.as_deref(), identifier.as_deref()) else {
        return Ok(None);
    };

    let window_id = match soften(bridge.window_id(node))? {
        Some(id) => id,
        None => {
            log::debug!(
                "{} candidate has no readable window id (size {}x{}); ignoring",
                kind.label(),
                size.width,
                size.height
            );
            return Ok(None);
        }
    };

    let position = soften(bridge.position(node))?.unwrap_or_default();

    Ok(Some(Discovery {
        node: node.clone(),
        window_id,
        kind,
        size,
        position,
    }))
}

/// Bubbles `PermissionDenied`, softens every other failure to `None`.
fn soften<T>(result: ElementResult<T>) -> ElementResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err @ ElementError::PermissionDenied(_)) => Err(err),
        Err(_) => Ok(None),
    }
}
