//! The idle/active state machine: debounce gate, watchdog deadline and the
//! drift-corrected toggle step.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;

use crate::config::MonitorConfig;

use super::{ActivityState, Transition};

/// Fixed lock window for the debounce gate. Pointer movement can fire
/// hundreds of signals per second; one forwarded signal per window is
/// enough to keep the watchdog honest.
pub(super) const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// State machine for a single monitored target.
///
/// Pure with respect to time: every entry point takes `now` explicitly, so
/// tests drive it with hand-picked instants. The driver task owns the only
/// instance, which keeps `idle` and `last_transition` updates atomic from
/// the perspective of every observer.
#[derive(Debug)]
pub(super) struct Machine {
    timeout: Duration,
    enabled: bool,
    idle: bool,
    /// Time of the last confirmed transition; reference point for elapsed
    /// computations, including the premature-fire check.
    last_transition: Instant,
    /// The single outstanding watchdog deadline. Replacing or clearing it
    /// is the cancellation mechanism: the driver rebuilds its sleep future
    /// from this field on every loop iteration.
    deadline: Option<Instant>,
    gate_locked_until: Option<Instant>,
}

impl Machine {
    pub(super) fn new(config: &MonitorConfig, now: Instant) -> Self {
        let deadline = if config.enabled && config.arm_immediately {
            Some(now + config.timeout())
        } else {
            None
        };
        Self {
            timeout: config.timeout(),
            enabled: config.enabled,
            idle: config.initial_idle,
            last_transition: now,
            deadline,
            gate_locked_until: None,
        }
    }

    /// The outstanding watchdog deadline, if armed.
    pub(super) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(super) fn is_idle(&self) -> bool {
        self.idle
    }

    pub(super) fn last_transition(&self) -> Instant {
        self.last_transition
    }

    fn gate_locked(&self, now: Instant) -> bool {
        self.gate_locked_until.is_some_and(|until| now < until)
    }

    /// Process one raw activity signal. Returns the transition to publish,
    /// if the signal made it through the gate and flipped the state.
    pub(super) fn on_signal(&mut self, now: Instant) -> Option<Transition> {
        if self.gate_locked(now) {
            return None;
        }
        self.gate_locked_until = Some(now + DEBOUNCE_WINDOW);

        // Cancel the outstanding watchdog; rescheduled below when enabled.
        self.deadline = None;

        if !self.enabled {
            return None;
        }

        let transition = if self.idle { self.toggle(now) } else { None };
        self.deadline = Some(now + self.timeout);
        transition
    }

    /// The watchdog elapsed with no intervening forwarded signal.
    pub(super) fn on_watchdog(&mut self, now: Instant) -> Option<Transition> {
        self.deadline = None;
        self.toggle(now)
    }

    /// Flip the state and stamp the transition, unless the elapsed time
    /// proves the watchdog fired prematurely relative to a signal that
    /// slipped in between scheduling and firing. A discarded fire re-arms
    /// the watchdog with a fresh deadline computed from `now`.
    fn toggle(&mut self, now: Instant) -> Option<Transition> {
        let elapsed = now.saturating_duration_since(self.last_transition);
        let becoming_idle = !self.idle;

        if becoming_idle && elapsed < self.timeout {
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = self.timeout.as_millis() as u64,
                "premature watchdog fire discarded"
            );
            if self.enabled {
                self.deadline = Some(now + self.timeout);
            }
            return None;
        }

        self.idle = becoming_idle;
        self.last_transition = now;

        let state = if self.idle {
            ActivityState::Idle
        } else {
            ActivityState::Active
        };
        Some(Transition {
            state,
            elapsed,
            at: Utc::now(),
        })
    }
}
