//! Per-target activity monitoring: the public [`ActivityMonitor`] API and
//! the shared state its queries read.

mod driver;
mod machine;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{MonitorConfig, SignalKind};
use crate::error::MonitorError;

use driver::{Command, Driver};
use machine::Machine;

/// Reported user state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    /// The user is currently active.
    Active,
    /// No activity has been observed for at least the configured timeout.
    Idle,
}

impl ActivityState {
    /// The state name, `"active"` or `"idle"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Active => "active",
            ActivityState::Idle => "idle",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed state change.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    /// The state just entered.
    pub state: ActivityState,
    /// Time since the previous confirmed transition.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Wall-clock time of the transition.
    pub at: DateTime<Utc>,
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Notification streams a callback can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Transitions into [`ActivityState::Idle`].
    Idle,
    /// Transitions into [`ActivityState::Active`].
    Active,
    /// Every confirmed transition.
    Any,
}

/// Callback invoked synchronously on a confirmed transition.
pub type TransitionCallback = Box<dyn FnMut(&Transition) + Send>;

/// Query-side mirror of the machine, written only by the driver task.
struct Shared {
    /// Reference point for last-transition arithmetic.
    origin: Instant,
    idle: AtomicBool,
    running: AtomicBool,
    /// Milliseconds from `origin` to the last confirmed transition.
    last_transition_ms: AtomicU64,
}

impl Shared {
    fn new(initial_idle: bool) -> Self {
        Self {
            origin: Instant::now(),
            idle: AtomicBool::new(initial_idle),
            running: AtomicBool::new(true),
            last_transition_ms: AtomicU64::new(0),
        }
    }

    fn record_transition(&self, idle: bool, at: Instant) {
        let offset = at.saturating_duration_since(self.origin).as_millis() as u64;
        self.idle.store(idle, Ordering::SeqCst);
        self.last_transition_ms.store(offset, Ordering::SeqCst);
    }

    fn state(&self) -> ActivityState {
        if self.idle.load(Ordering::SeqCst) {
            ActivityState::Idle
        } else {
            ActivityState::Active
        }
    }

    fn elapsed(&self) -> Duration {
        let now_ms = Instant::now()
            .saturating_duration_since(self.origin)
            .as_millis() as u64;
        let last_ms = self.last_transition_ms.load(Ordering::SeqCst);
        Duration::from_millis(now_ms.saturating_sub(last_ms))
    }
}

/// Cheap clonable handle for delivering raw activity signals to a monitor.
///
/// Delivery is best-effort: signals sent after the monitor stops, or past a
/// full intake buffer, are dropped. The debounce gate would discard the
/// excess of any burst anyway.
#[derive(Debug, Clone)]
pub struct SignalHandle {
    tx: mpsc::Sender<SignalKind>,
}

impl SignalHandle {
    /// Report that the observed target experienced user interaction.
    pub fn send(&self, kind: SignalKind) {
        let _ = self.tx.try_send(kind);
    }
}

/// Everything that exists only while a monitor is started.
struct Started {
    config: MonitorConfig,
    shared: Arc<Shared>,
    signal_tx: mpsc::Sender<SignalKind>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    event_tx: broadcast::Sender<Transition>,
    task: JoinHandle<()>,
}

/// Idle/active detector for one observed target.
///
/// Owns a debounce gate, a single watchdog timer and the toggle/notify
/// step, all running on one spawned task. Raw signals are delivered through
/// [`signal`](Self::signal) or a cloned [`SignalHandle`]; transitions reach
/// registered callbacks and [`subscribe`](Self::subscribe) receivers.
///
/// Instances are independent; any number of monitors may run concurrently
/// without coordination.
///
/// State queries require a started monitor and return
/// [`MonitorError::NotStarted`] otherwise.
pub struct ActivityMonitor {
    inner: Option<Started>,
}

impl ActivityMonitor {
    /// Create an unstarted monitor.
    pub fn new() -> Self {
        Self { inner: None }
    }

    /// Start monitoring with the given configuration.
    ///
    /// Idempotent: a second call while already started is a silent no-op
    /// and keeps the first call's configuration. Must be called inside a
    /// tokio runtime.
    pub fn start(&mut self, config: MonitorConfig) -> Result<(), MonitorError> {
        if self.inner.is_some() {
            debug!("monitor already started, ignoring start");
            return Ok(());
        }
        config.validate()?;

        let shared = Arc::new(Shared::new(config.initial_idle));
        let (signal_tx, signal_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(16);

        let machine = Machine::new(&config, Instant::now());
        let driver = Driver::new(
            machine,
            config.clone(),
            shared.clone(),
            signal_rx,
            cmd_rx,
            event_tx.clone(),
        );
        let task = tokio::spawn(driver.run());

        info!(timeout_ms = config.timeout_ms, "activity monitor started");
        self.inner = Some(Started {
            config,
            shared,
            signal_tx,
            cmd_tx,
            event_tx,
            task,
        });
        Ok(())
    }

    /// Stop monitoring and discard per-target state.
    ///
    /// Cancels the outstanding watchdog and detaches signal intake; no
    /// notification is emitted after this returns. Harmless on a
    /// never-started or already-stopped monitor.
    pub fn stop(&mut self) {
        if let Some(started) = self.inner.take() {
            started.shared.running.store(false, Ordering::SeqCst);
            started.task.abort();
            info!("activity monitor stopped");
        }
    }

    fn started(&self) -> Result<&Started, MonitorError> {
        self.inner.as_ref().ok_or(MonitorError::NotStarted)
    }

    /// Whether the monitor is currently started.
    pub fn is_started(&self) -> bool {
        self.inner.is_some()
    }

    /// The configuration the monitor was started with.
    pub fn config(&self) -> Result<&MonitorConfig, MonitorError> {
        Ok(&self.started()?.config)
    }

    /// Current reported state. Pure read, no side effect.
    pub fn current_state(&self) -> Result<ActivityState, MonitorError> {
        Ok(self.started()?.shared.state())
    }

    /// Time since the last confirmed transition. Pure read, no side effect.
    pub fn elapsed_since_last_transition(&self) -> Result<Duration, MonitorError> {
        Ok(self.started()?.shared.elapsed())
    }

    /// A handle for delivering raw activity signals, for wiring into a
    /// signal source.
    pub fn signal_handle(&self) -> Result<SignalHandle, MonitorError> {
        Ok(SignalHandle {
            tx: self.started()?.signal_tx.clone(),
        })
    }

    /// Deliver one raw activity signal. No-op on a stopped monitor.
    pub fn signal(&self, kind: SignalKind) {
        if let Some(started) = &self.inner {
            let _ = started.signal_tx.try_send(kind);
        }
    }

    /// Subscribe to transition broadcasts.
    pub fn subscribe(&self) -> Result<broadcast::Receiver<Transition>, MonitorError> {
        Ok(self.started()?.event_tx.subscribe())
    }

    /// Register a callback for transitions into the idle state.
    pub fn on_idle<F>(&self, callback: F) -> Result<(), MonitorError>
    where
        F: FnMut(&Transition) + Send + 'static,
    {
        self.register(EventKind::Idle, Box::new(callback))
    }

    /// Register a callback for transitions into the active state.
    pub fn on_active<F>(&self, callback: F) -> Result<(), MonitorError>
    where
        F: FnMut(&Transition) + Send + 'static,
    {
        self.register(EventKind::Active, Box::new(callback))
    }

    /// Register a callback for every confirmed transition. Any-transition
    /// callbacks run after the state-specific ones.
    pub fn on_transition<F>(&self, callback: F) -> Result<(), MonitorError>
    where
        F: FnMut(&Transition) + Send + 'static,
    {
        self.register(EventKind::Any, Box::new(callback))
    }

    fn register(&self, kind: EventKind, callback: TransitionCallback) -> Result<(), MonitorError> {
        let started = self.started()?;
        let _ = started.cmd_tx.send(Command::Register(kind, callback));
        Ok(())
    }
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
