//! One stabilization step for a tracked overlay.
//!
//! The platform's entrance animation keeps moving a banner after it
//! appears, so a single positional write is not enough: the scheduler
//! re-asserts the same target point at a short interval until the
//! stabilization window elapses or the overlay disappears. Writes are
//! idempotent, which makes the repetition safe.

use std::time::Instant;

use crate::bridge::{ElementBridge, ElementError, ElementResult};
use crate::geometry::Point;

use super::verify;
use super::TrackedOverlay;

/// How many extra attempts a transient write failure gets within a single
/// step before the step is abandoned (the stabilization window itself
/// keeps running).
pub(crate) const TRANSIENT_RETRIES: u32 = 3;

/// What a single stabilization step decided.
pub(crate) enum StepOutcome {
    /// Still tracking; schedule the next re-assertion.
    Continue {
        /// True when this step performed the overlay's first successful
        /// write, which is the moment the positioned event fires.
        newly_placed: bool,
    },
    /// The stabilization window elapsed.
    Expired,
    /// The node went stale mid-stabilization.
    Vanished(ElementError),
    /// The node stopped accepting positional writes.
    Unmovable(ElementError),
    /// Accessibility access was revoked.
    PermissionLost(ElementError),
}

pub(crate) fn step<B: ElementBridge>(
    bridge: &B,
    overlay: &mut TrackedOverlay<B::Node>,
    now: Instant,
) -> StepOutcome {
    if now >= overlay.stabilize_until {
        return StepOutcome::Expired;
    }

    // Once placed, check whether the platform is still fighting back; a
    // settled overlay skips the redundant write.
    if overlay.placed {
        match verify::check(bridge, &overlay.node, overlay.target) {
            Ok(true) => return StepOutcome::Continue { newly_placed: false },
            Ok(false) => {}
            Err(err @ ElementError::Invalid(_)) => return StepOutcome::Vanished(err),
            Err(err @ ElementError::PermissionDenied(_)) => {
                return StepOutcome::PermissionLost(err)
            }
            // Verification is optional; fall through to the write.
            Err(_) => {}
        }
    }

    match assert_position(bridge, &overlay.node, overlay.target) {
        Ok(()) => {
            let newly_placed = !overlay.placed;
            overlay.placed = true;
            StepOutcome::Continue { newly_placed }
        }
        Err(err @ ElementError::Transient(_)) => {
            // Retries exhausted: give up on this tick only, not on the
            // whole stabilization window.
            log::debug!(
                "window {}: set_position still failing after retries: {}",
                overlay.window_id,
                err
            );
            StepOutcome::Continue {
                newly_placed: false,
            }
        }
        Err(err @ ElementError::Invalid(_)) => StepOutcome::Vanished(err),
        Err(err @ ElementError::Unsupported(_)) => StepOutcome::Unmovable(err),
        Err(err @ ElementError::PermissionDenied(_)) => StepOutcome::PermissionLost(err),
    }
}

/// One positional write, with a bounded in-place retry on transient
/// failures.
pub(crate) fn assert_position<B: ElementBridge>(
    bridge: &B,
    node: &B::Node,
    target: Point,
) -> ElementResult<()> {
    let mut attempts = 0;
    loop {
        match bridge.set_position(node, target) {
            Ok(()) => return Ok(()),
            Err(ElementError::Transient(code)) if attempts < TRANSIENT_RETRIES => {
                attempts += 1;
                log::trace!(
                    "transient set_position failure (ax error {}), retry {}/{}",
                    code,
                    attempts,
                    TRANSIENT_RETRIES
                );
            }
            Err(err) => return Err(err),
        }
    }
}
