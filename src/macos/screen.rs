//! NSScreen topology snapshots.
//!
//! NSScreen is main-thread-only, so the main thread keeps a shared
//! [`Topology`] fresh on a timer and the engine thread reads clones of
//! it. Rects are stored exactly as NSScreen reports them (AppKit
//! coordinates); the y-flip lives in the geometry module.

use std::sync::{Arc, RwLock};

use block2::RcBlock;
use objc2::MainThreadMarker;
use objc2::rc::Retained;
use objc2_app_kit::NSScreen;
use objc2_foundation::NSTimer;

use crate::geometry::{Rect, ScreenDescriptor, Topology};

pub type SharedTopology = Arc<RwLock<Topology>>;

/// How often the main thread re-reads the display arrangement.
const REFRESH_INTERVAL_SECS: f64 = 1.0;

fn to_rect(frame: objc2_foundation::NSRect) -> Rect {
    Rect::new(
        frame.origin.x,
        frame.origin.y,
        frame.size.width,
        frame.size.height,
    )
}

/// Reads the current display arrangement. The first screen in NSScreen's
/// order is the primary, which anchors the coordinate flip.
pub fn snapshot(mtm: MainThreadMarker) -> Topology {
    let screens = NSScreen::screens(mtm);
    let mut descriptors = Vec::with_capacity(screens.len());
    let mut primary_height = 0.0;

    for (index, screen) in screens.iter().enumerate() {
        let full = to_rect(screen.frame());
        let safe = to_rect(screen.visibleFrame());
        if index == 0 {
            primary_height = full.size.height;
        }
        descriptors.push(ScreenDescriptor { index, full, safe });
    }

    Topology {
        screens: descriptors,
        primary_height,
    }
}

/// Schedules a repeating main-thread timer that refreshes `shared` and then
/// runs `on_tick` (config reload checks piggyback on the same cadence).
/// The returned timer must stay alive for the refresh to keep firing.
pub fn start_refresh_timer(
    mtm: MainThreadMarker,
    shared: SharedTopology,
    on_tick: impl Fn() + 'static,
) -> Retained<NSTimer> {
    let initial = snapshot(mtm);
    if let Ok(mut topo) = shared.write() {
        *topo = initial;
    }

    let block = RcBlock::new(move |_timer: std::ptr::NonNull<NSTimer>| {
        // The timer only ever fires on the scheduling thread.
        let Some(mtm) = MainThreadMarker::new() else {
            return;
        };
        let fresh = snapshot(mtm);
        if let Ok(mut topo) = shared.write() {
            if *topo != fresh {
                log::info!("display arrangement changed ({} screens)", fresh.screens.len());
            }
            *topo = fresh;
        }
        on_tick();
    });

    unsafe {
        NSTimer::scheduledTimerWithTimeInterval_repeats_block(REFRESH_INTERVAL_SECS, true, &block)
    }
}
