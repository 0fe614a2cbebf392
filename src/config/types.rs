use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::geometry::Corner;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub intercept: InterceptConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
}

/// Where overlays get pinned.
#[derive(Debug, Deserialize, Clone)]
pub struct PositionConfig {
    /// Target screen corner.
    #[serde(default = "default_corner")]
    pub corner: Corner,
    /// Inset from the safe-area edges, in points.
    #[serde(default = "default_padding")]
    pub padding: f64,
    /// Master switch; `false` stops the engine from polling at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            corner: default_corner(),
            padding: default_padding(),
            enabled: true,
        }
    }
}

/// Which overlay kinds to intercept.
#[derive(Debug, Deserialize, Clone)]
pub struct InterceptConfig {
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub widgets: bool,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            notifications: true,
            widgets: false,
        }
    }
}

/// Timing knobs for the discovery/stabilization loop. The defaults are
/// tuned against the platform's banner slide-in; exposed here so they can
/// be adjusted without touching the algorithm.
#[derive(Debug, Deserialize, Clone)]
pub struct TuningConfig {
    /// How often each kind's discovery poll runs.
    #[serde(default = "default_poll_ms")]
    pub poll_interval_ms: u64,
    /// How often a tracked overlay's position is re-asserted.
    #[serde(default = "default_reassert_ms")]
    pub reassert_interval_ms: u64,
    /// How long after discovery re-assertion keeps running.
    #[serde(default = "default_stabilize_ms")]
    pub stabilize_ms: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_ms(),
            reassert_interval_ms: default_reassert_ms(),
            stabilize_ms: default_stabilize_ms(),
        }
    }
}

impl TuningConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reassert_interval(&self) -> Duration {
        Duration::from_millis(self.reassert_interval_ms)
    }

    pub fn stabilize_duration(&self) -> Duration {
        Duration::from_millis(self.stabilize_ms)
    }
}

fn default_corner() -> Corner {
    Corner::BottomRight
}

fn default_padding() -> f64 {
    20.0
}

fn default_true() -> bool {
    true
}

fn default_poll_ms() -> u64 {
    50
}

fn default_reassert_ms() -> u64 {
    25
}

fn default_stabilize_ms() -> u64 {
    3000
}

/// A single validation finding; errors make the config unusable, warnings
/// are only logged.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub message: String,
    pub is_error: bool,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Config {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let mut error = |message: String| {
            issues.push(ConfigIssue {
                message,
                is_error: true,
            })
        };

        if self.position.padding < 0.0 {
            error(format!(
                "position.padding must be >= 0 (got {})",
                self.position.padding
            ));
        }
        if self.tuning.poll_interval_ms == 0 {
            error("tuning.poll_interval_ms must be > 0".to_string());
        }
        if self.tuning.reassert_interval_ms == 0 {
            error("tuning.reassert_interval_ms must be > 0".to_string());
        }

        let mut warn = |message: String| {
            issues.push(ConfigIssue {
                message,
                is_error: false,
            })
        };

        if self.tuning.poll_interval_ms > 1000 {
            warn(format!(
                "tuning.poll_interval_ms = {} is slower than the platform's \
                 entrance animation; overlays may settle before they are found",
                self.tuning.poll_interval_ms
            ));
        }
        if self.tuning.stabilize_ms < self.tuning.reassert_interval_ms {
            warn(
                "tuning.stabilize_ms is shorter than tuning.reassert_interval_ms; \
                 each overlay gets at most one re-assertion"
                    .to_string(),
            );
        }
        if self.position.padding > 500.0 {
            warn(format!(
                "position.padding = {} will push overlays far from the corner",
                self.position.padding
            ));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.position.corner, Corner::BottomRight);
        assert_eq!(config.position.padding, 20.0);
        assert!(config.position.enabled);
        assert!(config.intercept.notifications);
        assert!(!config.intercept.widgets);
        assert_eq!(config.tuning.poll_interval_ms, 50);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [position]
            corner = "top_left"
            padding = 12.5
            enabled = false

            [intercept]
            notifications = false
            widgets = true

            [tuning]
            poll_interval_ms = 30
            reassert_interval_ms = 10
            stabilize_ms = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.position.corner, Corner::TopLeft);
        assert_eq!(config.position.padding, 12.5);
        assert!(!config.position.enabled);
        assert!(!config.intercept.notifications);
        assert!(config.intercept.widgets);
        assert_eq!(config.tuning.stabilize_duration(), Duration::from_secs(2));
    }

    #[test]
    fn unknown_corner_is_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [position]
            corner = "center"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn negative_padding_is_an_error() {
        let config: Config = toml::from_str(
            r#"
            [position]
            padding = -4.0
            "#,
        )
        .unwrap();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.is_error));
    }

    #[test]
    fn zero_poll_interval_is_an_error() {
        let config: Config = toml::from_str(
            r#"
            [tuning]
            poll_interval_ms = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().iter().any(|i| i.is_error));
    }

    #[test]
    fn slow_poll_is_only_a_warning() {
        let config: Config = toml::from_str(
            r#"
            [tuning]
            poll_interval_ms = 5000
            "#,
        )
        .unwrap();
        let issues = config.validate();
        assert!(!issues.is_empty());
        assert!(issues.iter().all(|i| !i.is_error));
    }
}
