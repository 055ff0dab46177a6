//! End-to-end monitor scenarios on a paused tokio clock.
//!
//! `start_paused` makes every `time::sleep` auto-advance the clock once all
//! tasks are otherwise blocked, so the driver task always processes pending
//! signals and due watchdog fires before a test resumes. Elapsed values are
//! therefore exact.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use idlewatch::{ActivityMonitor, ActivityState, MonitorConfig, MonitorError, SignalKind};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time;

fn config(timeout_ms: u64) -> MonitorConfig {
    MonitorConfig {
        timeout_ms,
        ..MonitorConfig::default()
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn goes_idle_after_timeout_and_notifies_once() {
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(1000)).unwrap();
    let mut events = monitor.subscribe().unwrap();

    time::sleep(ms(1100)).await;

    let transition = events.try_recv().expect("idle notification");
    assert_eq!(transition.state, ActivityState::Idle);
    assert_eq!(transition.elapsed, ms(1000));
    assert_eq!(monitor.current_state().unwrap(), ActivityState::Idle);

    // No watchdog is re-armed while idle; nothing further fires.
    time::sleep(ms(3000)).await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn round_trip_emits_two_notifications_with_real_deltas() {
    // timeout=1000, start Active at t=0, signal at t=1500:
    // idle fires at t=1000 with elapsed 1000, active at t=1500 with 500.
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(1000)).unwrap();
    let mut events = monitor.subscribe().unwrap();

    time::sleep(ms(1500)).await;
    monitor.signal(SignalKind::KeyDown);
    time::sleep(ms(1)).await;

    let idle = events.try_recv().expect("idle notification");
    assert_eq!(idle.state, ActivityState::Idle);
    assert_eq!(idle.elapsed, ms(1000));

    let active = events.try_recv().expect("active notification");
    assert_eq!(active.state, ActivityState::Active);
    assert_eq!(active.elapsed, ms(500));

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(monitor.current_state().unwrap(), ActivityState::Active);
}

#[tokio::test(start_paused = true)]
async fn burst_signals_reschedule_watchdog_once() {
    // Two signals at t=100 and t=150: the second is inside the debounce
    // window, so the watchdog stays scheduled from t=100 and fires at
    // t=1100 with elapsed 1100 (measured from the start transition point).
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(1000)).unwrap();
    let mut events = monitor.subscribe().unwrap();

    time::sleep(ms(100)).await;
    monitor.signal(SignalKind::PointerMove);
    time::sleep(ms(50)).await;
    monitor.signal(SignalKind::PointerMove);

    time::sleep(ms(949)).await; // t=1099, watchdog from t=100 not yet due
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(monitor.current_state().unwrap(), ActivityState::Active);

    time::sleep(ms(2)).await; // past t=1100
    let transition = events.try_recv().expect("idle notification");
    assert_eq!(transition.state, ActivityState::Idle);
    assert_eq!(transition.elapsed, ms(1100));
}

#[tokio::test(start_paused = true)]
async fn signal_while_active_emits_nothing() {
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(1000)).unwrap();
    let mut events = monitor.subscribe().unwrap();

    for _ in 0..5 {
        monitor.signal(SignalKind::PointerMove);
        time::sleep(ms(600)).await;
    }

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(monitor.current_state().unwrap(), ActivityState::Active);
}

#[tokio::test(start_paused = true)]
async fn unmonitored_signal_kinds_do_not_reset_the_clock() {
    let mut monitor = ActivityMonitor::new();
    monitor
        .start(MonitorConfig {
            signals: vec![SignalKind::KeyDown],
            ..config(1000)
        })
        .unwrap();
    let mut events = monitor.subscribe().unwrap();

    // Pointer noise is not in the signal set and must not keep us active.
    for _ in 0..3 {
        time::sleep(ms(300)).await;
        monitor.signal(SignalKind::PointerMove);
    }
    time::sleep(ms(200)).await; // t=1100

    let transition = events.try_recv().expect("idle notification");
    assert_eq!(transition.state, ActivityState::Idle);

    monitor.signal(SignalKind::KeyDown);
    time::sleep(ms(1)).await;
    let transition = events.try_recv().expect("active notification");
    assert_eq!(transition.state, ActivityState::Active);
}

#[tokio::test(start_paused = true)]
async fn callbacks_run_in_declared_order() {
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(1000)).unwrap();

    let calls = Arc::new(Mutex::new(Vec::new()));

    let log = calls.clone();
    monitor
        .on_idle(move |t| {
            log.lock().unwrap().push(format!("idle:{}", t.elapsed.as_millis()))
        })
        .unwrap();
    let log = calls.clone();
    monitor
        .on_active(move |t| {
            log.lock().unwrap().push(format!("active:{}", t.elapsed.as_millis()))
        })
        .unwrap();
    let log = calls.clone();
    monitor
        .on_transition(move |t| log.lock().unwrap().push(format!("any:{}", t.state)))
        .unwrap();

    time::sleep(ms(1100)).await;
    monitor.signal(SignalKind::TouchStart);
    time::sleep(ms(1)).await;

    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec!["idle:1000", "any:idle", "active:100", "any:active"]
    );
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(1000)).unwrap();

    // The second start is a silent no-op, even with different values.
    monitor.start(config(99_000)).unwrap();
    assert_eq!(monitor.config().unwrap().timeout_ms, 1000);

    let mut events = monitor.subscribe().unwrap();
    time::sleep(ms(1100)).await;
    let transition = events.try_recv().expect("idle from the first config");
    assert_eq!(transition.elapsed, ms(1000));
}

#[tokio::test(start_paused = true)]
async fn queries_before_start_are_rejected() {
    let monitor = ActivityMonitor::new();
    assert!(matches!(
        monitor.current_state(),
        Err(MonitorError::NotStarted)
    ));
    assert!(matches!(
        monitor.elapsed_since_last_transition(),
        Err(MonitorError::NotStarted)
    ));
    assert!(matches!(monitor.subscribe(), Err(MonitorError::NotStarted)));
    assert!(matches!(
        monitor.signal_handle(),
        Err(MonitorError::NotStarted)
    ));
}

#[tokio::test(start_paused = true)]
async fn invalid_configuration_is_rejected_at_start() {
    let mut monitor = ActivityMonitor::new();
    assert!(matches!(
        monitor.start(config(0)),
        Err(MonitorError::InvalidConfig(_))
    ));
    assert!(!monitor.is_started());

    assert!(matches!(
        monitor.start(MonitorConfig {
            signals: Vec::new(),
            ..MonitorConfig::default()
        }),
        Err(MonitorError::InvalidConfig(_))
    ));
    assert!(!monitor.is_started());
}

#[tokio::test(start_paused = true)]
async fn elapsed_tracks_time_since_last_transition() {
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(60_000)).unwrap();

    time::sleep(ms(300)).await;
    assert_eq!(monitor.elapsed_since_last_transition().unwrap(), ms(300));

    // A signal while active does not move the transition point.
    monitor.signal(SignalKind::Wheel);
    time::sleep(ms(200)).await;
    assert_eq!(monitor.elapsed_since_last_transition().unwrap(), ms(500));
}

#[tokio::test(start_paused = true)]
async fn stop_silences_all_further_notifications() {
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(1000)).unwrap();
    let mut events = monitor.subscribe().unwrap();
    let handle = monitor.signal_handle().unwrap();

    monitor.stop();
    monitor.stop(); // safe to call again

    handle.send(SignalKind::KeyDown);
    time::sleep(ms(5000)).await;

    assert!(matches!(events.try_recv(), Err(TryRecvError::Closed)));
    assert!(matches!(
        monitor.current_state(),
        Err(MonitorError::NotStarted)
    ));
}

#[tokio::test(start_paused = true)]
async fn disabled_monitor_reports_state_but_never_toggles() {
    let mut monitor = ActivityMonitor::new();
    monitor
        .start(MonitorConfig {
            enabled: false,
            ..config(1000)
        })
        .unwrap();
    let mut events = monitor.subscribe().unwrap();

    time::sleep(ms(5000)).await;
    monitor.signal(SignalKind::KeyDown);
    time::sleep(ms(5000)).await;

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(monitor.current_state().unwrap(), ActivityState::Active);
}

#[tokio::test(start_paused = true)]
async fn waits_for_first_signal_when_not_armed_immediately() {
    let mut monitor = ActivityMonitor::new();
    monitor
        .start(MonitorConfig {
            arm_immediately: false,
            ..config(1000)
        })
        .unwrap();
    let mut events = monitor.subscribe().unwrap();

    // Without a first signal there is no watchdog to fire.
    time::sleep(ms(3000)).await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    monitor.signal(SignalKind::PointerDown);
    time::sleep(ms(1100)).await;

    let transition = events.try_recv().expect("idle notification");
    assert_eq!(transition.state, ActivityState::Idle);
}

#[tokio::test(start_paused = true)]
async fn monitors_are_independent() {
    let mut fast = ActivityMonitor::new();
    let mut slow = ActivityMonitor::new();
    fast.start(config(1000)).unwrap();
    slow.start(config(10_000)).unwrap();

    time::sleep(ms(1100)).await;
    assert_eq!(fast.current_state().unwrap(), ActivityState::Idle);
    assert_eq!(slow.current_state().unwrap(), ActivityState::Active);

    fast.signal(SignalKind::KeyDown);
    time::sleep(ms(1)).await;
    assert_eq!(fast.current_state().unwrap(), ActivityState::Active);
    assert_eq!(slow.current_state().unwrap(), ActivityState::Active);
}

#[tokio::test(start_paused = true)]
async fn transition_serializes_with_state_name_and_millis() {
    let mut monitor = ActivityMonitor::new();
    monitor.start(config(1000)).unwrap();
    let mut events = monitor.subscribe().unwrap();

    time::sleep(ms(1100)).await;
    let transition = events.try_recv().expect("idle notification");

    let json = serde_json::to_value(&transition).unwrap();
    assert_eq!(json["state"], "idle");
    assert_eq!(json["elapsed_ms"], 1000);
    assert!(json["at"].is_string());
}
