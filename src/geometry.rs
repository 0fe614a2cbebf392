//! Screen geometry: corner math and coordinate conversion.
//!
//! NSScreen reports frames in AppKit global coordinates (origin at the
//! bottom-left of the primary display, y grows upward) while the
//! Accessibility API positions windows in a top-left-origin space (y grows
//! downward). The flip between the two happens in exactly one place:
//! [`Topology::target_point`]. Everything upstream stores rects exactly as
//! NSScreen hands them out.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.origin.x && p.x < self.max_x() && p.y >= self.origin.y && p.y < self.max_y()
    }
}

/// Target corner for repositioned overlays. Closed set: the config surface
/// offers no center variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    fn is_right(self) -> bool {
        matches!(self, Corner::TopRight | Corner::BottomRight)
    }

    fn is_top(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopRight)
    }
}

/// One display, as reported by NSScreen (AppKit coordinates).
///
/// `safe` is the visible frame: the full frame minus the menu bar and Dock.
/// Overlays are always anchored inside `safe`, never `full`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenDescriptor {
    pub index: usize,
    pub full: Rect,
    pub safe: Rect,
}

/// Immutable snapshot of the display arrangement, taken once per discovery
/// cycle. `primary_height` is the full height of the primary display, which
/// anchors the AppKit↔AX y-flip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topology {
    pub screens: Vec<ScreenDescriptor>,
    pub primary_height: f64,
}

impl Topology {
    /// The screen whose full frame contains the given AX-coordinate point.
    pub fn screen_at(&self, ax_point: Point) -> Option<&ScreenDescriptor> {
        self.screens.iter().find(|screen| {
            let top = self.primary_height - screen.full.max_y();
            Rect::new(
                screen.full.origin.x,
                top,
                screen.full.size.width,
                screen.full.size.height,
            )
            .contains(ax_point)
        })
    }

    /// Computes the AX-coordinate top-left point that places an overlay of
    /// `overlay` size in `corner` of `screen.safe`, inset by `padding`.
    ///
    /// No clamping: an overlay larger than the safe area ends up partially
    /// off-screen rather than silently resized.
    pub fn target_point(
        &self,
        screen: &ScreenDescriptor,
        overlay: Size,
        corner: Corner,
        padding: f64,
    ) -> Point {
        let safe = screen.safe;

        let x = if corner.is_right() {
            safe.max_x() - overlay.width - padding
        } else {
            safe.origin.x + padding
        };

        // Overlay's top edge in AppKit coordinates (y up), then flipped.
        let appkit_top = if corner.is_top() {
            safe.max_y() - padding
        } else {
            safe.origin.y + padding + overlay.height
        };

        Point::new(x, self.primary_height - appkit_top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1920x1080 primary with a 24-unit menu bar and an 80-unit Dock.
    fn standard_topology() -> Topology {
        Topology {
            screens: vec![ScreenDescriptor {
                index: 0,
                full: Rect::new(0.0, 0.0, 1920.0, 1080.0),
                safe: Rect::new(0.0, 80.0, 1920.0, 976.0),
            }],
            primary_height: 1080.0,
        }
    }

    /// Standard primary plus an inset-free secondary to its right.
    fn dual_topology() -> Topology {
        let mut topo = standard_topology();
        topo.screens.push(ScreenDescriptor {
            index: 1,
            full: Rect::new(1920.0, 0.0, 1920.0, 1080.0),
            safe: Rect::new(1920.0, 0.0, 1920.0, 1080.0),
        });
        topo
    }

    const BANNER: Size = Size {
        width: 300.0,
        height: 80.0,
    };

    #[test]
    fn top_left_on_standard_screen() {
        let topo = standard_topology();
        let p = topo.target_point(&topo.screens[0], BANNER, Corner::TopLeft, 20.0);
        assert_eq!(p, Point::new(20.0, 44.0));
    }

    #[test]
    fn top_right_on_standard_screen() {
        let topo = standard_topology();
        let p = topo.target_point(&topo.screens[0], BANNER, Corner::TopRight, 20.0);
        assert_eq!(p, Point::new(1600.0, 44.0));
    }

    #[test]
    fn bottom_right_on_standard_screen() {
        let topo = standard_topology();
        let p = topo.target_point(&topo.screens[0], BANNER, Corner::BottomRight, 20.0);
        assert_eq!(p, Point::new(1600.0, 900.0));
    }

    #[test]
    fn bottom_left_clears_the_dock() {
        let topo = standard_topology();
        let p = topo.target_point(&topo.screens[0], BANNER, Corner::BottomLeft, 20.0);
        // Dock is 80 tall, padding 20, overlay 80: top edge at 1080-180=900.
        assert_eq!(p, Point::new(20.0, 900.0));
    }

    #[test]
    fn top_left_on_inset_free_secondary() {
        let topo = dual_topology();
        let p = topo.target_point(&topo.screens[1], BANNER, Corner::TopLeft, 20.0);
        assert_eq!(p, Point::new(1940.0, 20.0));
    }

    #[test]
    fn oversized_overlay_is_not_clamped() {
        let topo = standard_topology();
        let huge = Size::new(2400.0, 80.0);
        let p = topo.target_point(&topo.screens[0], huge, Corner::TopRight, 20.0);
        // maxX - width - padding goes negative here.
        assert_eq!(p.x, 1920.0 - 2400.0 - 20.0);
    }

    #[test]
    fn screen_at_picks_containing_display() {
        let topo = dual_topology();
        assert_eq!(topo.screen_at(Point::new(100.0, 100.0)).unwrap().index, 0);
        assert_eq!(topo.screen_at(Point::new(2000.0, 500.0)).unwrap().index, 1);
        assert!(topo.screen_at(Point::new(-5.0, 100.0)).is_none());
    }

    #[test]
    fn zero_padding_hugs_the_safe_rect() {
        let topo = standard_topology();
        let p = topo.target_point(&topo.screens[0], BANNER, Corner::TopLeft, 0.0);
        // Menu bar is 24 tall, so the safe top sits at y=24 in AX coords.
        assert_eq!(p, Point::new(0.0, 24.0));
    }
}
