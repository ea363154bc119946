//! The real-time feedback monitoring engine.
//!
//! [`FeedbackMonitor`] splits one monitoring session across three
//! execution contexts:
//!
//! - the **producer** context calls
//!   [`submit_interleaved`](FeedbackMonitor::submit_interleaved) once per
//!   tick; the call validates, extracts peaks, and enqueues — bounded
//!   work, no blocking locks, no I/O;
//! - the **analysis** worker thread exclusively owns the
//!   [`FeedbackDetector`] and [`PreventionController`] and processes ticks
//!   in arrival order;
//! - the **notification** thread fans confirmed events out to registered
//!   observers, so a slow observer can never stall analysis.
//!
//! Backpressure favors freshness over completeness: the tick queue is
//! bounded and a full queue discards the *oldest* pending tick. Ticks carry
//! the epoch current at submission; [`reset`](FeedbackMonitor::reset) bumps
//! the epoch, so ticks queued before a topology change are discarded
//! instead of being compared across it.

use crate::observer::{FnActionObserver, FnEventObserver, MonitorObserver};
use crate::{Error, Result};
use crossbeam::queue::ArrayQueue;
use larsen_core::{
    DetectorConfig, FeedbackDetector, FeedbackEvent, PreventionAction, PreventionController,
    PreventionPolicy, SecureSampleBuffer, compute_peaks,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the analysis worker sleeps when the tick queue is empty.
/// Submissions unpark it immediately; this only bounds shutdown latency.
const IDLE_PARK: Duration = Duration::from_millis(5);

/// Monitoring session configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Number of channels on the monitored signal path.
    pub channel_count: usize,
    /// Capacity of the producer-side buffer in frames per channel.
    pub frame_capacity: usize,
    /// Bound on pending analysis ticks; a full queue drops the oldest.
    pub queue_depth: usize,
    /// Detection tunables.
    pub detector: DetectorConfig,
    /// Prevention tunables.
    pub policy: PreventionPolicy,
}

impl MonitorConfig {
    /// Configuration with default tunables and queue depth.
    pub fn new(channel_count: usize, frame_capacity: usize) -> Self {
        Self {
            channel_count,
            frame_capacity,
            queue_depth: 8,
            detector: DetectorConfig::default(),
            policy: PreventionPolicy::default(),
        }
    }
}

/// One queued analysis tick: the peak vector plus the epoch it was
/// submitted under.
struct Tick {
    epoch: u64,
    peaks: Vec<f32>,
}

/// What the analysis worker hands to the notification thread.
struct Notification {
    event: FeedbackEvent,
    action: Option<PreventionAction>,
}

/// State shared between the producer API and the analysis worker.
struct Shared {
    running: AtomicBool,
    epoch: AtomicU64,
    queue: ArrayQueue<Tick>,
    dropped_ticks: AtomicU64,
    pending_config: Mutex<DetectorConfig>,
    config_generation: AtomicU64,
}

/// A live feedback monitoring session.
///
/// Construction spawns the analysis and notification threads; dropping the
/// monitor (or calling [`stop`](Self::stop)) shuts both down, discards
/// pending ticks, and zeroes the producer-side sample buffer.
pub struct FeedbackMonitor {
    shared: Arc<Shared>,
    producer_buffer: Mutex<SecureSampleBuffer>,
    observers: Arc<Mutex<Vec<Arc<dyn MonitorObserver>>>>,
    worker: Option<JoinHandle<()>>,
    notifier: Option<JoinHandle<()>>,
}

impl FeedbackMonitor {
    /// Start a monitoring session.
    ///
    /// Fails on a zero-sized buffer or queue, or on invalid tunables —
    /// these are the only session-fatal errors; everything after
    /// construction is per-tick.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        if config.queue_depth == 0 {
            return Err(larsen_core::ConfigError::ZeroCount {
                field: "queue_depth",
            }
            .into());
        }
        let producer_buffer =
            SecureSampleBuffer::new(config.channel_count, config.frame_capacity)?;
        let detector = FeedbackDetector::new(config.detector)?;
        let controller = PreventionController::new(config.policy.clone())?;

        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            epoch: AtomicU64::new(0),
            queue: ArrayQueue::new(config.queue_depth),
            dropped_ticks: AtomicU64::new(0),
            pending_config: Mutex::new(config.detector),
            config_generation: AtomicU64::new(0),
        });
        let observers: Arc<Mutex<Vec<Arc<dyn MonitorObserver>>>> =
            Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel::<Notification>();

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("larsen-analysis".into())
                .spawn(move || analysis_loop(&shared, detector, controller, &tx))?
        };
        let notifier = {
            let observers = Arc::clone(&observers);
            let spawned = thread::Builder::new()
                .name("larsen-notify".into())
                .spawn(move || notify_loop(&rx, &observers));
            match spawned {
                Ok(handle) => handle,
                Err(err) => {
                    // Unwind the already-running analysis thread before
                    // reporting the failure.
                    shared.running.store(false, Ordering::Release);
                    worker.thread().unpark();
                    let _ = worker.join();
                    return Err(err.into());
                }
            }
        };

        tracing::info!(
            channels = config.channel_count,
            frame_capacity = config.frame_capacity,
            queue_depth = config.queue_depth,
            "feedback monitor started"
        );

        Ok(Self {
            shared,
            producer_buffer: Mutex::new(producer_buffer),
            observers,
            worker: Some(worker),
            notifier: Some(notifier),
        })
    }

    /// Whether the session is accepting ticks.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Ticks discarded because the analysis queue was full.
    pub fn dropped_ticks(&self) -> u64 {
        self.shared.dropped_ticks.load(Ordering::Relaxed)
    }

    /// Submit one tick of interleaved samples from the producer context.
    ///
    /// Non-blocking: the producer-side buffer is taken with `try_lock`
    /// (a collision returns [`Error::Busy`] and drops the tick), and a full
    /// queue discards its oldest pending tick instead of waiting. A tick
    /// failing validation is dropped and reported; the session continues.
    pub fn submit_interleaved(&self, interleaved: &[f32]) -> Result<()> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(Error::NotRunning);
        }

        let peaks = {
            let mut buffer = self.producer_buffer.try_lock().map_err(|_| Error::Busy)?;
            let result = buffer.write_interleaved(interleaved).map_err(Error::from).and_then(
                |frames| {
                    buffer
                        .with_scoped_access(frames, |view| compute_peaks(view).map_err(Error::from))
                },
            );
            match result {
                Ok(peaks) => peaks,
                Err(err) => {
                    tracing::debug!(
                        error = %err,
                        samples = interleaved.len(),
                        "tick rejected by validation"
                    );
                    return Err(err);
                }
            }
        };

        let tick = Tick {
            epoch: self.shared.epoch.load(Ordering::Acquire),
            peaks,
        };
        if self.shared.queue.force_push(tick).is_some() {
            let dropped = self.shared.dropped_ticks.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!(dropped, "tick queue full, oldest tick discarded");
        }
        if let Some(worker) = &self.worker {
            worker.thread().unpark();
        }
        Ok(())
    }

    /// Replace the detector tunables for subsequent ticks.
    ///
    /// An invalid configuration is rejected here and the previous one stays
    /// active; a valid one is picked up by the analysis worker before the
    /// next tick it processes.
    pub fn configure(&self, config: DetectorConfig) -> Result<()> {
        config.validate()?;
        *self
            .shared
            .pending_config
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = config;
        self.shared.config_generation.fetch_add(1, Ordering::Release);
        if let Some(worker) = &self.worker {
            worker.thread().unpark();
        }
        tracing::debug!(?config, "detector reconfigured");
        Ok(())
    }

    /// Invalidate all tick-to-tick state.
    ///
    /// Call whenever the external pipeline reports a channel-topology
    /// change. Ticks already queued are discarded rather than compared
    /// across the change, and the detector and escalation state reset
    /// before the next accepted tick.
    pub fn reset(&self) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        if let Some(worker) = &self.worker {
            worker.thread().unpark();
        }
        tracing::debug!("monitor reset, pending ticks invalidated");
    }

    /// Register a typed observer. Any number may register; each sees events
    /// in arrival order.
    pub fn register_observer(&self, observer: Arc<dyn MonitorObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Register a closure called for every confirmed feedback event.
    pub fn on_feedback_event<F>(&self, f: F)
    where
        F: Fn(&FeedbackEvent) + Send + Sync + 'static,
    {
        self.register_observer(Arc::new(FnEventObserver(f)));
    }

    /// Register a closure called for every prevention action.
    pub fn on_prevention_action<F>(&self, f: F)
    where
        F: Fn(&PreventionAction) + Send + Sync + 'static,
    {
        self.register_observer(Arc::new(FnActionObserver(f)));
    }

    /// Stop the session.
    ///
    /// New submissions are rejected immediately; the in-flight analysis
    /// tick (if any) completes; queued ticks are discarded; the producer
    /// buffer is zeroed. When this returns, both threads have exited and no
    /// observer callback will fire again. Idempotent.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
        // The worker held the only notification sender; its exit
        // disconnects the channel and the notifier drains out.
        if let Some(notifier) = self.notifier.take() {
            let _ = notifier.join();
        }
        while self.shared.queue.pop().is_some() {}
        self.producer_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!(
            dropped_ticks = self.dropped_ticks(),
            "feedback monitor stopped"
        );
    }
}

impl Drop for FeedbackMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Analysis worker body: exclusive owner of detector and controller state.
fn analysis_loop(
    shared: &Shared,
    mut detector: FeedbackDetector,
    mut controller: PreventionController,
    tx: &mpsc::Sender<Notification>,
) {
    let mut epoch_seen = shared.epoch.load(Ordering::Acquire);
    let mut config_seen = shared.config_generation.load(Ordering::Acquire);

    while shared.running.load(Ordering::Acquire) {
        let generation = shared.config_generation.load(Ordering::Acquire);
        if generation != config_seen {
            config_seen = generation;
            let config = *shared
                .pending_config
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Validated at configure(); a failure here means the pending
            // config was never replaced, so keep the active one.
            if detector.set_config(config).is_err() {
                tracing::warn!("pending detector config rejected, keeping active config");
            }
        }

        while let Some(tick) = shared.queue.pop() {
            if !shared.running.load(Ordering::Acquire) {
                return;
            }
            if tick.epoch != shared.epoch.load(Ordering::Acquire) {
                // Stale tick from before a reset; never compare across a
                // topology change.
                continue;
            }
            if tick.epoch != epoch_seen {
                epoch_seen = tick.epoch;
                detector.reset();
                controller.reset();
            }

            if let Some(event) = detector.update(&tick.peaks) {
                // Report first, then act: the log line must exist even if
                // no action results.
                tracing::warn!(
                    channels = ?event.channels,
                    magnitude = event.magnitude,
                    "feedback detected"
                );
                let action = controller.on_event(&event);
                if let Some(action) = &action {
                    tracing::info!(?action, "prevention action chosen");
                }
                if tx.send(Notification { event, action }).is_err() {
                    // Notification side is gone; nothing left to report to.
                    return;
                }
            }
        }

        thread::park_timeout(IDLE_PARK);
    }
}

/// Notification thread body: fans events out to observers in arrival order.
fn notify_loop(
    rx: &mpsc::Receiver<Notification>,
    observers: &Mutex<Vec<Arc<dyn MonitorObserver>>>,
) {
    while let Ok(notification) = rx.recv() {
        let snapshot: Vec<Arc<dyn MonitorObserver>> = observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &snapshot {
            observer.on_feedback_event(&notification.event);
            if let Some(action) = &notification.action {
                observer.on_prevention_action(action);
            }
        }
    }
}
