//! Monitor configuration: defaults, validation and TOML file loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::MonitorError;

/// Kinds of raw activity signals a monitor can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Pointer movement.
    PointerMove,
    /// Pointer button press.
    PointerDown,
    /// Scroll wheel input.
    Wheel,
    /// Key press.
    KeyDown,
    /// Touch contact started.
    TouchStart,
    /// Touch contact moved.
    TouchMove,
}

impl SignalKind {
    /// Every signal kind; the default listening set.
    pub const ALL: [SignalKind; 6] = [
        SignalKind::PointerMove,
        SignalKind::PointerDown,
        SignalKind::Wheel,
        SignalKind::KeyDown,
        SignalKind::TouchStart,
        SignalKind::TouchMove,
    ];
}

/// Configuration for a single [`ActivityMonitor`](crate::ActivityMonitor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Inactivity threshold in milliseconds before the idle transition.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Whether the watchdog runs at all. A disabled monitor still accepts
    /// signals but never schedules a watchdog and never changes state.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Arm the watchdog immediately on start instead of waiting for the
    /// first signal.
    #[serde(default = "default_true")]
    pub arm_immediately: bool,
    /// Start in the idle state.
    #[serde(default)]
    pub initial_idle: bool,
    /// Signal kinds this monitor listens for. Signals of other kinds are
    /// ignored before they reach the debounce gate.
    #[serde(default = "default_signals")]
    pub signals: Vec<SignalKind>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            enabled: true,
            arm_immediately: true,
            initial_idle: false,
            signals: default_signals(),
        }
    }
}

impl MonitorConfig {
    /// The inactivity threshold as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether this monitor listens for the given signal kind.
    pub fn listens_for(&self, kind: SignalKind) -> bool {
        self.signals.contains(&kind)
    }

    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::InvalidConfig(format!("failed to read {:?}: {}", path, e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| MonitorError::InvalidConfig(format!("failed to parse {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.timeout_ms == 0 {
            return Err(MonitorError::InvalidConfig(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.signals.is_empty() {
            return Err(MonitorError::InvalidConfig(
                "signal set cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_timeout_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

fn default_signals() -> Vec<SignalKind> {
    SignalKind::ALL.to_vec()
}
