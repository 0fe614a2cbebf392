//! Window discovery and position stabilization.
//!
//! A single scheduler thread owns everything: the per-kind discovery polls,
//! the per-overlay re-assertion timers, and the permission re-probe all
//! carry their own next-due instants and are driven from one `tick`. That
//! serializes every mutation of the tracked map and guarantees writes for
//! one window never interleave. `tick` takes `now` from the caller, so
//! tests drive time explicitly.

pub(crate) mod poller;
pub(crate) mod stabilize;
pub(crate) mod verify;

#[cfg(test)]
pub(crate) mod mock;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bridge::{ElementBridge, ElementError};
use crate::classify::{ClassifierProfile, OverlayKind};
use crate::config::{Config, SharedConfig};
use crate::geometry::{Point, Topology};

use poller::Discovery;
use stabilize::StepOutcome;

/// Granularity of the scheduler loop. Individual tasks fire at their own
/// intervals on top of this.
const BASE_TICK: Duration = Duration::from_millis(10);

/// How often a halted engine re-probes for regranted accessibility access.
const PERMISSION_RECHECK: Duration = Duration::from_secs(2);

/// Events surfaced to the outer layer (logged there; a UI would subscribe
/// the same way).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Fired once per overlay, on its first successful placement.
    OverlayPositioned {
        window_id: u32,
        kind: OverlayKind,
        point: Point,
    },
    /// Tracking ended: the overlay disappeared, went stale, or its
    /// stabilization window elapsed.
    OverlayLost { window_id: u32 },
    /// Accessibility access was revoked; the engine is halted until it
    /// comes back.
    PermissionLost,
}

/// Lock-free diagnostics shared with the IPC layer.
#[derive(Debug, Default)]
pub struct EngineStats {
    tracked: AtomicUsize,
    halted: AtomicBool,
    enabled: AtomicBool,
}

impl EngineStats {
    pub fn tracked_count(&self) -> usize {
        self.tracked.load(Ordering::SeqCst)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// One overlay the engine is currently stabilizing.
///
/// `target` is computed once at discovery and never recomputed, even if the
/// configuration changes mid-stabilization; a config change affects future
/// discoveries only.
pub(crate) struct TrackedOverlay<N> {
    pub(crate) node: N,
    pub(crate) window_id: u32,
    pub(crate) kind: OverlayKind,
    #[allow(dead_code)]
    pub(crate) discovered_at: Instant,
    pub(crate) target: Point,
    pub(crate) stabilize_until: Instant,
    pub(crate) next_assert: Instant,
    pub(crate) placed: bool,
}

pub struct Engine<B: ElementBridge> {
    bridge: B,
    profile: ClassifierProfile,
    config: SharedConfig,
    screens: Box<dyn Fn() -> Topology + Send>,
    permission: Box<dyn Fn() -> bool + Send>,
    events: Sender<EngineEvent>,
    stats: Arc<EngineStats>,
    /// windowId → overlay; exclusively owned by the scheduler thread.
    tracked: HashMap<u32, TrackedOverlay<B::Node>>,
    /// Ids that stay present but are done with: non-writable windows and
    /// overlays whose stabilization window elapsed. Kept so continued
    /// presence never triggers a second hand-off; cleared when the id
    /// disappears from a poll.
    retired: HashMap<u32, OverlayKind>,
    next_notification_poll: Option<Instant>,
    next_widget_poll: Option<Instant>,
    halted: bool,
    next_permission_probe: Instant,
}

impl<B: ElementBridge> Engine<B> {
    pub fn new(
        bridge: B,
        profile: ClassifierProfile,
        config: SharedConfig,
        screens: Box<dyn Fn() -> Topology + Send>,
        permission: Box<dyn Fn() -> bool + Send>,
    ) -> (Self, Receiver<EngineEvent>) {
        let (events, receiver) = channel();
        let engine = Self {
            bridge,
            profile,
            config,
            screens,
            permission,
            events,
            stats: Arc::new(EngineStats::default()),
            tracked: HashMap::new(),
            retired: HashMap::new(),
            next_notification_poll: None,
            next_widget_poll: None,
            halted: false,
            next_permission_probe: Instant::now(),
        };
        (engine, receiver)
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        self.stats.clone()
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Runs the scheduler loop until `stop` is set.
    pub fn run(mut self, stop: Arc<AtomicBool>) {
        log::info!("engine started");
        while !stop.load(Ordering::SeqCst) {
            self.tick(Instant::now());
            std::thread::sleep(BASE_TICK);
        }
        log::info!("engine stopped");
    }

    /// One scheduler pass at time `now`: run whichever polls and
    /// re-assertions are due.
    pub fn tick(&mut self, now: Instant) {
        if self.halted {
            if now >= self.next_permission_probe {
                if (self.permission)() {
                    log::info!("accessibility access regranted; resuming");
                    self.halted = false;
                    self.stats.halted.store(false, Ordering::SeqCst);
                    self.next_notification_poll = None;
                    self.next_widget_poll = None;
                } else {
                    self.next_permission_probe = now + PERMISSION_RECHECK;
                }
            }
            if self.halted {
                return;
            }
        }

        let config = match self.config.read() {
            Ok(config) => config.clone(),
            Err(_) => return,
        };
        self.stats
            .enabled
            .store(config.position.enabled, Ordering::SeqCst);

        // Discovery. Disabled means no new polls; in-flight stabilizations
        // below still run out to their deadlines.
        if config.position.enabled {
            let notification_due =
                config.intercept.notifications && due(self.next_notification_poll, now);
            let widget_due = config.intercept.widgets && due(self.next_widget_poll, now);

            if notification_due || widget_due {
                // Fresh topology snapshot per discovery cycle; monitors
                // come and go at runtime.
                let topology = (self.screens)();
                if notification_due {
                    self.next_notification_poll = Some(now + config.tuning.poll_interval());
                    self.poll_kind(OverlayKind::Notification, now, &config, &topology);
                }
                if widget_due && !self.halted {
                    self.next_widget_poll = Some(now + config.tuning.poll_interval());
                    self.poll_kind(OverlayKind::Widget, now, &config, &topology);
                }
            }
        }

        if !self.halted {
            self.step_stabilizations(now, &config);
        }
        self.stats.tracked.store(self.tracked.len(), Ordering::SeqCst);
    }

    /// One discovery poll for one overlay kind: scan, then diff window ids
    /// against what is already known. Edge-triggered: only the
    /// absent→present transition hands an overlay to stabilization.
    fn poll_kind(&mut self, kind: OverlayKind, now: Instant, config: &Config, topology: &Topology) {
        let found = match poller::scan(&self.bridge, &self.profile, kind, poller::MAX_WALK_DEPTH) {
            Ok(found) => found,
            Err(err) => {
                self.halt(err, now);
                return;
            }
        };

        let present: HashSet<u32> = found.iter().map(|d| d.window_id).collect();

        // Disappearances first; no grace period.
        let vanished: Vec<u32> = self
            .tracked
            .values()
            .filter(|t| t.kind == kind && !present.contains(&t.window_id))
            .map(|t| t.window_id)
            .collect();
        for window_id in vanished {
            self.tracked.remove(&window_id);
            log::debug!("{} window {} disappeared", kind.label(), window_id);
            let _ = self.events.send(EngineEvent::OverlayLost { window_id });
        }
        self.retired
            .retain(|id, k| *k != kind || present.contains(id));

        for discovery in found {
            if self.tracked.contains_key(&discovery.window_id)
                || self.retired.contains_key(&discovery.window_id)
            {
                continue;
            }
            self.begin_tracking(discovery, now, config, topology);
            if self.halted {
                return;
            }
        }
    }

    /// Hands a newly discovered overlay to stabilization: writability gate,
    /// one-time target computation, insertion into the tracked map. The
    /// first positional write happens later this same tick.
    fn begin_tracking(
        &mut self,
        discovery: Discovery<B::Node>,
        now: Instant,
        config: &Config,
        topology: &Topology,
    ) {
        let window_id = discovery.window_id;
        let kind = discovery.kind;

        match self.bridge.is_position_writable(&discovery.node) {
            Ok(true) => {}
            Ok(false) => {
                log::warn!(
                    "{} window {} is not movable; leaving it alone",
                    kind.label(),
                    window_id
                );
                self.retired.insert(window_id, kind);
                return;
            }
            Err(err @ ElementError::PermissionDenied(_)) => {
                self.halt(err, now);
                return;
            }
            Err(err @ ElementError::Unsupported(_)) => {
                log::warn!(
                    "window {}: cannot query position writability ({}); skipping",
                    window_id,
                    err
                );
                self.retired.insert(window_id, kind);
                return;
            }
            Err(err) => {
                // Stale or transient; the next poll rediscovers it if it
                // still exists.
                log::debug!("window {}: writability check failed: {}", window_id, err);
                return;
            }
        }

        let Some(screen) = topology
            .screen_at(discovery.position)
            .or_else(|| topology.screens.first())
        else {
            log::warn!(
                "no screens available; cannot place {} window {}",
                kind.label(),
                window_id
            );
            return;
        };

        let target = topology.target_point(
            screen,
            discovery.size,
            config.position.corner,
            config.position.padding,
        );
        log::info!(
            "discovered {} window {} ({}x{}) on screen {}; pinning to ({}, {})",
            kind.label(),
            window_id,
            discovery.size.width,
            discovery.size.height,
            screen.index,
            target.x,
            target.y
        );

        self.tracked.insert(
            window_id,
            TrackedOverlay {
                node: discovery.node,
                window_id,
                kind,
                discovered_at: now,
                target,
                stabilize_until: now + config.tuning.stabilize_duration(),
                // First assertion runs this very tick.
                next_assert: now,
                placed: false,
            },
        );
    }

    /// Runs every due re-assertion. Failures are per-overlay: one overlay's
    /// trouble never aborts another's stabilization (permission loss
    /// excepted, which halts everything).
    fn step_stabilizations(&mut self, now: Instant, config: &Config) {
        let interval = config.tuning.reassert_interval();
        let due_ids: Vec<u32> = self
            .tracked
            .values()
            .filter(|t| now >= t.next_assert)
            .map(|t| t.window_id)
            .collect();

        for window_id in due_ids {
            let Some(overlay) = self.tracked.get_mut(&window_id) else {
                continue;
            };
            match stabilize::step(&self.bridge, overlay, now) {
                StepOutcome::Continue { newly_placed } => {
                    overlay.next_assert = now + interval;
                    if newly_placed {
                        let kind = overlay.kind;
                        let point = overlay.target;
                        log::info!(
                            "{} window {} positioned at ({}, {})",
                            kind.label(),
                            window_id,
                            point.x,
                            point.y
                        );
                        let _ = self.events.send(EngineEvent::OverlayPositioned {
                            window_id,
                            kind,
                            point,
                        });
                    }
                }
                StepOutcome::Expired => {
                    let kind = overlay.kind;
                    log::debug!("window {}: stabilization window elapsed", window_id);
                    self.tracked.remove(&window_id);
                    // Still on screen; remember it so continued presence is
                    // not treated as a new appearance.
                    self.retired.insert(window_id, kind);
                    let _ = self.events.send(EngineEvent::OverlayLost { window_id });
                }
                StepOutcome::Vanished(err) => {
                    log::debug!(
                        "window {} vanished mid-stabilization: {}",
                        window_id,
                        err
                    );
                    self.tracked.remove(&window_id);
                    let _ = self.events.send(EngineEvent::OverlayLost { window_id });
                }
                StepOutcome::Unmovable(err) => {
                    let kind = overlay.kind;
                    log::warn!(
                        "window {} stopped accepting positional writes: {}",
                        window_id,
                        err
                    );
                    self.tracked.remove(&window_id);
                    self.retired.insert(window_id, kind);
                    let _ = self.events.send(EngineEvent::OverlayLost { window_id });
                }
                StepOutcome::PermissionLost(err) => {
                    self.halt(err, now);
                    return;
                }
            }
        }
    }

    /// Permission loss is fatal for the whole engine until regranted: stop
    /// polling, drop all tracking (overlays stay wherever they were last
    /// written), and start the slow re-probe.
    fn halt(&mut self, err: ElementError, now: Instant) {
        log::error!(
            "accessibility access lost (ax error {}); halting until regranted",
            err.code()
        );
        self.halted = true;
        self.next_permission_probe = now + PERMISSION_RECHECK;
        self.stats.halted.store(true, Ordering::SeqCst);

        let lost: Vec<u32> = self.tracked.keys().copied().collect();
        self.tracked.clear();
        self.retired.clear();
        for window_id in lost {
            let _ = self.events.send(EngineEvent::OverlayLost { window_id });
        }
        let _ = self.events.send(EngineEvent::PermissionLost);
        self.stats.tracked.store(0, Ordering::SeqCst);
    }
}

fn due(slot: Option<Instant>, now: Instant) -> bool {
    slot.map_or(true, |at| now >= at)
}
