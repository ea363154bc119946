//! End-to-end monitoring scenarios.
//!
//! No audio hardware required: ticks are synthesized and submitted the way
//! an audio callback would, and outcomes are collected through observers.

use larsen_monitor::{
    DetectorConfig, FeedbackEvent, FeedbackMonitor, MonitorConfig, MonitorObserver,
    PreventionAction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
/// Long enough for the analysis worker to drain everything submitted so far.
const DRAIN: Duration = Duration::from_millis(100);

fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// One interleaved 2-channel tick with constant per-channel levels.
fn stereo_tick(frames: usize, level_a: f32, level_b: f32) -> Vec<f32> {
    let mut tick = Vec::with_capacity(frames * 2);
    for _ in 0..frames {
        tick.push(level_a);
        tick.push(level_b);
    }
    tick
}

/// Monitor wired to forward events and actions over std channels.
fn collecting_monitor(
    config: MonitorConfig,
) -> (
    FeedbackMonitor,
    mpsc::Receiver<FeedbackEvent>,
    mpsc::Receiver<PreventionAction>,
) {
    let monitor = FeedbackMonitor::new(config).unwrap();
    let (event_tx, event_rx) = mpsc::channel();
    let (action_tx, action_rx) = mpsc::channel();
    monitor.on_feedback_event(move |event| {
        let _ = event_tx.send(event.clone());
    });
    monitor.on_prevention_action(move |action| {
        let _ = action_tx.send(action.clone());
    });
    (monitor, event_rx, action_rx)
}

#[test]
fn five_tick_scenario_fires_once_on_channel_zero() {
    let (mut monitor, events, actions) = collecting_monitor(MonitorConfig {
        queue_depth: 16,
        ..MonitorConfig::new(2, 512)
    });

    // Channel 0 rings at -3 dB, channel 1 idles at -40 dB.
    let tick = stereo_tick(512, db_to_linear(-3.0), db_to_linear(-40.0));
    for _ in 0..5 {
        monitor.submit_interleaved(&tick).unwrap();
    }

    let event = events.recv_timeout(EVENT_TIMEOUT).expect("one event");
    assert_eq!(event.channels, vec![0]);

    let p0 = db_to_linear(-3.0);
    let p1 = db_to_linear(-40.0);
    let expected = ((p0 * p0 + p1 * p1) / 2.0).sqrt();
    assert!((event.magnitude - expected).abs() < 1e-4);

    let action = actions.recv_timeout(EVENT_TIMEOUT).expect("one action");
    match action {
        PreventionAction::GainReduction { amount_db } => {
            assert!((amount_db - (expected + 6.0)).abs() < 1e-4);
        }
        other => panic!("expected gain reduction, got {other:?}"),
    }

    // Ticks 4-5 only restart accumulation; no second event.
    thread::sleep(DRAIN);
    assert!(events.try_recv().is_err());
    monitor.stop();
}

#[test]
fn back_to_back_ticks_are_processed_in_submission_order() {
    // Trigger count 2: an event can only fire if the second tick's
    // comparison sees the first tick as its predecessor.
    let (mut monitor, events, _actions) = collecting_monitor(MonitorConfig {
        detector: DetectorConfig {
            sustained_trigger_count: 2,
            ..DetectorConfig::default()
        },
        queue_depth: 16,
        ..MonitorConfig::new(1, 64)
    });

    let loud = vec![db_to_linear(-3.0); 64];
    monitor.submit_interleaved(&loud).unwrap();
    monitor.submit_interleaved(&loud).unwrap();

    assert!(events.recv_timeout(EVENT_TIMEOUT).is_ok());
    monitor.stop();
}

#[test]
fn no_callback_fires_after_stop_returns() {
    struct Counter(AtomicUsize);
    impl MonitorObserver for Counter {
        fn on_feedback_event(&self, _event: &FeedbackEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let mut monitor = FeedbackMonitor::new(MonitorConfig {
        detector: DetectorConfig {
            sustained_trigger_count: 1,
            ..DetectorConfig::default()
        },
        queue_depth: 64,
        ..MonitorConfig::new(1, 64)
    })
    .unwrap();

    let counter = Arc::new(Counter(AtomicUsize::new(0)));
    monitor.register_observer(counter.clone());

    let loud = vec![db_to_linear(-3.0); 64];
    for _ in 0..8 {
        monitor.submit_interleaved(&loud).unwrap();
    }
    monitor.stop();

    let at_stop = counter.0.load(Ordering::SeqCst);
    thread::sleep(DRAIN);
    assert_eq!(counter.0.load(Ordering::SeqCst), at_stop);
    assert!(monitor.submit_interleaved(&loud).is_err());
}

#[test]
fn overload_never_blocks_and_session_stays_healthy() {
    let (mut monitor, events, _actions) = collecting_monitor(MonitorConfig {
        queue_depth: 2,
        ..MonitorConfig::new(1, 32)
    });

    // Flood with sub-noise-floor ticks: none may produce an event, and
    // force-push must absorb the overload without ever blocking.
    let quiet = vec![db_to_linear(-80.0); 32];
    for _ in 0..256 {
        monitor.submit_interleaved(&quiet).unwrap();
    }
    thread::sleep(DRAIN);
    assert!(events.try_recv().is_err());

    // The session still detects a genuine ring afterwards. Four windows:
    // the first fails the stability check against the quiet predecessor,
    // the next three accumulate to the trigger.
    let loud = vec![db_to_linear(-3.0); 32];
    for _ in 0..4 {
        monitor.submit_interleaved(&loud).unwrap();
        // Pace the trigger sequence so no tick of it is coalesced away.
        thread::sleep(Duration::from_millis(10));
    }
    assert!(events.recv_timeout(EVENT_TIMEOUT).is_ok());
    monitor.stop();
}

#[test]
fn reconfiguration_applies_to_subsequent_ticks() {
    let (mut monitor, events, _actions) = collecting_monitor(MonitorConfig {
        queue_depth: 16,
        ..MonitorConfig::new(1, 64)
    });

    // At -12 dB the default -6 dB threshold stays silent.
    let moderate = vec![db_to_linear(-12.0); 64];
    for _ in 0..4 {
        monitor.submit_interleaved(&moderate).unwrap();
    }
    thread::sleep(DRAIN);
    assert!(events.try_recv().is_err());

    // Drop the threshold below the signal; same ticks now trigger.
    monitor
        .configure(DetectorConfig {
            detection_threshold_db: -20.0,
            sustained_trigger_count: 2,
            ..DetectorConfig::default()
        })
        .unwrap();
    thread::sleep(DRAIN);

    monitor.submit_interleaved(&moderate).unwrap();
    monitor.submit_interleaved(&moderate).unwrap();
    assert!(events.recv_timeout(EVENT_TIMEOUT).is_ok());
    monitor.stop();
}

#[test]
fn reset_discards_accumulation_across_topology_changes() {
    let (mut monitor, events, _actions) = collecting_monitor(MonitorConfig {
        queue_depth: 16,
        ..MonitorConfig::new(1, 64)
    });

    let loud = vec![db_to_linear(-3.0); 64];
    monitor.submit_interleaved(&loud).unwrap();
    monitor.submit_interleaved(&loud).unwrap();
    thread::sleep(DRAIN);

    // Topology change: accumulation must start over, so the trigger needs
    // three more windows, not one.
    monitor.reset();
    monitor.submit_interleaved(&loud).unwrap();
    monitor.submit_interleaved(&loud).unwrap();
    thread::sleep(DRAIN);
    assert!(events.try_recv().is_err());

    monitor.submit_interleaved(&loud).unwrap();
    assert!(events.recv_timeout(EVENT_TIMEOUT).is_ok());
    monitor.stop();
}

#[test]
fn multiple_observers_each_see_the_event() {
    let mut monitor = FeedbackMonitor::new(MonitorConfig {
        detector: DetectorConfig {
            sustained_trigger_count: 1,
            ..DetectorConfig::default()
        },
        queue_depth: 16,
        ..MonitorConfig::new(1, 64)
    })
    .unwrap();

    let (tx_a, rx_a) = mpsc::channel();
    let (tx_b, rx_b) = mpsc::channel();
    monitor.on_feedback_event(move |event| {
        let _ = tx_a.send(event.channels.clone());
    });
    monitor.on_feedback_event(move |event| {
        let _ = tx_b.send(event.channels.clone());
    });

    monitor
        .submit_interleaved(&vec![db_to_linear(-3.0); 64])
        .unwrap();

    assert_eq!(rx_a.recv_timeout(EVENT_TIMEOUT).unwrap(), vec![0]);
    assert_eq!(rx_b.recv_timeout(EVENT_TIMEOUT).unwrap(), vec![0]);
    monitor.stop();
}

#[test]
fn dropped_tick_counter_accounts_for_overload() {
    let (mut monitor, _events, _actions) = collecting_monitor(MonitorConfig {
        queue_depth: 1,
        ..MonitorConfig::new(1, 16)
    });

    let quiet = vec![0.0; 16];
    for _ in 0..512 {
        monitor.submit_interleaved(&quiet).unwrap();
    }
    // With a depth-1 queue and 512 rapid-fire ticks, the counter can never
    // exceed the submission count; whether any were dropped depends on
    // scheduling, so only the upper bound is asserted.
    assert!(monitor.dropped_ticks() <= 512);
    monitor.stop();
}
