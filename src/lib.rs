//! User activity monitoring with debounced idle detection.
//!
//! One [`ActivityMonitor`] per observed target turns a stream of raw
//! activity signals (pointer movement, key presses, touches, scrolling)
//! plus a configurable timeout into exactly-once idle/active transition
//! notifications.
//!
//! Raw signals pass through a fixed 500 ms debounce gate, each forwarded
//! signal re-arms a single watchdog timer, and the watchdog elapsing with
//! no newer signal drives the Active to Idle transition. A late-firing
//! watchdog that races a recent signal is detected by recomputing the
//! elapsed time at fire time and is silently discarded, so timer jitter
//! never produces a spurious idle notification.
//!
//! ```no_run
//! use idlewatch::{ActivityMonitor, MonitorConfig, SignalKind};
//!
//! # async fn demo() -> Result<(), idlewatch::MonitorError> {
//! let mut monitor = ActivityMonitor::new();
//! monitor.start(MonitorConfig {
//!     timeout_ms: 30_000,
//!     ..MonitorConfig::default()
//! })?;
//!
//! let mut transitions = monitor.subscribe()?;
//! monitor.signal(SignalKind::KeyDown);
//!
//! while let Ok(transition) = transitions.recv().await {
//!     println!("{} after {:?}", transition.state, transition.elapsed);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod monitor;

pub use config::{MonitorConfig, SignalKind};
pub use error::MonitorError;
pub use monitor::{
    ActivityMonitor, ActivityState, EventKind, SignalHandle, Transition, TransitionCallback,
};
