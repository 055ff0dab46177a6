//! Event loop task driving a monitor's state machine.

use std::future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::config::{MonitorConfig, SignalKind};

use super::machine::Machine;
use super::{ActivityState, EventKind, Shared, Transition, TransitionCallback};

/// Control messages from the monitor handle to the driver task.
pub(super) enum Command {
    Register(EventKind, TransitionCallback),
}

/// Owns the state machine and runs all signal, timer and dispatch handling
/// on one task, so handlers execute atomically with respect to each other.
pub(super) struct Driver {
    machine: Machine,
    config: MonitorConfig,
    shared: Arc<Shared>,
    signal_rx: mpsc::Receiver<SignalKind>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: broadcast::Sender<Transition>,
    on_idle: Vec<TransitionCallback>,
    on_active: Vec<TransitionCallback>,
    on_any: Vec<TransitionCallback>,
}

impl Driver {
    pub(super) fn new(
        machine: Machine,
        config: MonitorConfig,
        shared: Arc<Shared>,
        signal_rx: mpsc::Receiver<SignalKind>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        event_tx: broadcast::Sender<Transition>,
    ) -> Self {
        Self {
            machine,
            config,
            shared,
            signal_rx,
            cmd_rx,
            event_tx,
            on_idle: Vec::new(),
            on_active: Vec::new(),
            on_any: Vec::new(),
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            if !self.shared.running.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Register(kind, callback)) => self.attach(kind, callback),
                    None => break,
                },
                signal = self.signal_rx.recv() => match signal {
                    Some(kind) => self.handle_signal(kind),
                    None => break,
                },
                () = watchdog_wait(self.machine.deadline()) => self.handle_watchdog(),
            }
        }

        debug!("monitor driver exiting");
    }

    fn attach(&mut self, kind: EventKind, callback: TransitionCallback) {
        match kind {
            EventKind::Idle => self.on_idle.push(callback),
            EventKind::Active => self.on_active.push(callback),
            EventKind::Any => self.on_any.push(callback),
        }
    }

    fn handle_signal(&mut self, kind: SignalKind) {
        if !self.config.listens_for(kind) {
            trace!(?kind, "signal kind not monitored, ignoring");
            return;
        }
        if let Some(transition) = self.machine.on_signal(Instant::now()) {
            self.dispatch(transition);
        }
    }

    fn handle_watchdog(&mut self) {
        if let Some(transition) = self.machine.on_watchdog(Instant::now()) {
            self.dispatch(transition);
        }
    }

    /// Publish a confirmed transition: callbacks for the entered state
    /// first, then the any-transition callbacks, then the broadcast
    /// channel. Everything runs synchronously on this task.
    fn dispatch(&mut self, transition: Transition) {
        self.shared
            .record_transition(self.machine.is_idle(), self.machine.last_transition());

        debug!(
            state = transition.state.as_str(),
            elapsed_ms = transition.elapsed.as_millis() as u64,
            "state transition"
        );

        let specific = match transition.state {
            ActivityState::Idle => &mut self.on_idle,
            ActivityState::Active => &mut self.on_active,
        };
        for callback in specific.iter_mut() {
            callback(&transition);
        }
        for callback in self.on_any.iter_mut() {
            callback(&transition);
        }

        let _ = self.event_tx.send(transition);
    }
}

/// Wait until the watchdog deadline; pends forever when none is armed.
async fn watchdog_wait(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
