//! Read-back verification of overlay positions.
//!
//! The platform keeps animating a freshly written window, so a write is not
//! proof of placement. Reading the position back and comparing within a
//! small tolerance tells the scheduler whether the overlay has settled
//! (skip the redundant write) or is still being fought over. Verification
//! is an optimization, not a correctness requirement: idempotent re-writes
//! are always safe.

use crate::bridge::{ElementBridge, ElementResult};
use crate::geometry::Point;

/// Maximum per-axis distance between target and read-back position that
/// still counts as "positioned". Sub-pixel rounding in the AX layer makes
/// exact comparison too strict.
pub(crate) const TOLERANCE: f64 = 2.0;

pub(crate) fn within_tolerance(actual: Point, target: Point) -> bool {
    (actual.x - target.x).abs() <= TOLERANCE && (actual.y - target.y).abs() <= TOLERANCE
}

/// Reads the node's current position and checks it against `target`.
pub(crate) fn check<B: ElementBridge>(
    bridge: &B,
    node: &B::Node,
    target: Point,
) -> ElementResult<bool> {
    Ok(within_tolerance(bridge.position(node)?, target))
}
