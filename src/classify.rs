//! Decides whether an accessibility node is a candidate overlay.
//!
//! Two independent matchers, both pure functions over what the poller has
//! already read off the node: notification banners match on a size
//! heuristic or a subrole allow-list; widget panels match on an identifier
//! prefix plus a minimum visible size. The subrole allow-list varies across
//! macOS releases, so it is resolved once at startup from the OS version
//! rather than per node.

use crate::geometry::Size;

/// Which kind of overlay a node was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Notification,
    Widget,
}

impl OverlayKind {
    pub fn label(self) -> &'static str {
        match self {
            OverlayKind::Notification => "notification",
            OverlayKind::Widget => "widget",
        }
    }
}

/// Notification banners are wider than they are tall, in a fairly narrow
/// band across OS versions.
const BANNER_WIDTH: (f64, f64) = (200.0, 800.0);
const BANNER_HEIGHT: (f64, f64) = (60.0, 200.0);

/// Widget panels carry an AX identifier with this prefix; anything smaller
/// than the minimum is a collapsed or hidden instance.
const WIDGET_IDENTIFIER_PREFIX: &str = "widget";
const WIDGET_MIN_SIZE: f64 = 64.0;

/// Startup-resolved matching rules (the subrole allow-list is the only OS
/// version dependent part).
#[derive(Debug, Clone)]
pub struct ClassifierProfile {
    banner_subroles: &'static [&'static str],
}

impl ClassifierProfile {
    /// Resolves the profile for a macOS major version.
    pub fn for_os(major: isize) -> Self {
        // Big Sur reworked Notification Center; alerts got their own
        // subrole from 11 on.
        let banner_subroles: &'static [&'static str] = if major >= 11 {
            &["AXNotificationCenterBanner", "AXNotificationCenterAlert"]
        } else {
            &["AXNotificationCenterBanner"]
        };
        Self { banner_subroles }
    }

    /// Classifies a node from its size, subrole, and identifier. The
    /// notification matcher wins if both happen to match.
    pub fn classify(
        &self,
        size: Size,
        subrole: Option<&str>,
        identifier: Option<&str>,
    ) -> Option<OverlayKind> {
        let notification = self.matches_notification(size, subrole);
        let widget = matches_widget(size, identifier);

        if notification && widget {
            log::warn!(
                "node matches both notification and widget heuristics \
                 (size {}x{}, subrole {:?}, identifier {:?}); treating as notification",
                size.width,
                size.height,
                subrole,
                identifier
            );
        }

        if notification {
            Some(OverlayKind::Notification)
        } else if widget {
            Some(OverlayKind::Widget)
        } else {
            None
        }
    }

    fn matches_notification(&self, size: Size, subrole: Option<&str>) -> bool {
        if let Some(subrole) = subrole {
            if self.banner_subroles.contains(&subrole) {
                return true;
            }
        }
        (BANNER_WIDTH.0..=BANNER_WIDTH.1).contains(&size.width)
            && (BANNER_HEIGHT.0..=BANNER_HEIGHT.1).contains(&size.height)
    }
}

fn matches_widget(size: Size, identifier: Option<&str>) -> bool {
    let Some(identifier) = identifier else {
        return false;
    };
    identifier.starts_with(WIDGET_IDENTIFIER_PREFIX)
        && size.width >= WIDGET_MIN_SIZE
        && size.height >= WIDGET_MIN_SIZE
}
