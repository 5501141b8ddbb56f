//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SudoConfig {
    /// Protocol timeout settings.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Elevation launcher settings.
    #[serde(default)]
    pub elevation: ElevationConfig,
}

impl SudoConfig {
    /// Merge another config into this one. Scalars the other config set
    /// explicitly override this one's; unset fields are kept.
    pub fn merge(&mut self, other: SudoConfig) {
        self.timeouts.merge(other.timeouts);
        self.elevation.merge(other.elevation);
    }

    /// The configured timeouts as durations.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            ready: Duration::from_secs(self.timeouts.ready_secs),
            call: Duration::from_secs(self.timeouts.call_secs),
            close: Duration::from_secs(self.timeouts.close_secs),
        }
    }
}

/// Bounded waits for the three points where the unprivileged side blocks
/// on the elevated one. Seconds; 0 is not meaningful and is treated as the
/// default by the merge rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// Wait for the readiness sentinel after spawning. Generous: a human
    /// may be typing a password.
    #[serde(default = "default_ready_secs")]
    pub ready_secs: u64,

    /// Wait for each call's response. Privileged installs can be slow.
    #[serde(default = "default_call_secs")]
    pub call_secs: u64,

    /// Wait for the shutdown acknowledgement.
    #[serde(default = "default_close_secs")]
    pub close_secs: u64,
}

fn default_ready_secs() -> u64 {
    120
}

fn default_call_secs() -> u64 {
    300
}

fn default_close_secs() -> u64 {
    5
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ready_secs: default_ready_secs(),
            call_secs: default_call_secs(),
            close_secs: default_close_secs(),
        }
    }
}

impl TimeoutConfig {
    fn merge(&mut self, other: TimeoutConfig) {
        if other.ready_secs != default_ready_secs() && other.ready_secs != 0 {
            self.ready_secs = other.ready_secs;
        }
        if other.call_secs != default_call_secs() && other.call_secs != 0 {
            self.call_secs = other.call_secs;
        }
        if other.close_secs != default_close_secs() && other.close_secs != 0 {
            self.close_secs = other.close_secs;
        }
    }
}

/// Elevation launcher settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ElevationConfig {
    /// Explicit elevation front-end binary. Unset means: discover pkexec
    /// or sudo on PATH.
    #[serde(default)]
    pub frontend: Option<PathBuf>,
}

impl ElevationConfig {
    fn merge(&mut self, other: ElevationConfig) {
        if other.frontend.is_some() {
            self.frontend = other.frontend;
        }
    }
}

/// The resolved timeout durations the proxy actually uses.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Readiness handshake bound.
    pub ready: Duration,
    /// Per-call response bound.
    pub call: Duration,
    /// Shutdown acknowledgement bound.
    pub close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        TimeoutConfig::default().into()
    }
}

impl From<TimeoutConfig> for Timeouts {
    fn from(config: TimeoutConfig) -> Self {
        Timeouts {
            ready: Duration::from_secs(config.ready_secs),
            call: Duration::from_secs(config.call_secs),
            close: Duration::from_secs(config.close_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SudoConfig::default();
        let timeouts = config.timeouts();
        assert_eq!(timeouts.ready, Duration::from_secs(120));
        assert_eq!(timeouts.call, Duration::from_secs(300));
        assert_eq!(timeouts.close, Duration::from_secs(5));
        assert!(config.elevation.frontend.is_none());
    }

    #[test]
    fn test_merge_overrides_set_scalars() {
        let mut base = SudoConfig::default();
        let overlay: SudoConfig = toml::from_str(
            r#"
            [timeouts]
            call_secs = 60

            [elevation]
            frontend = "/usr/bin/sudo"
            "#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.timeouts.call_secs, 60);
        // Untouched fields keep their values.
        assert_eq!(base.timeouts.ready_secs, 120);
        assert_eq!(
            base.elevation.frontend,
            Some(PathBuf::from("/usr/bin/sudo"))
        );
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config: SudoConfig = toml::from_str("").unwrap();
        assert_eq!(config.timeouts.ready_secs, 120);
    }
}
