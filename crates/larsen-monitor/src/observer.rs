//! Event observation interface.
//!
//! The monitor reports outcomes through [`MonitorObserver`], a typed
//! notification interface: any number of listeners can register, each sees
//! events in arrival order, and delivery happens on the monitor's
//! notification thread — never on the producer or analysis contexts.

use larsen_core::{FeedbackEvent, PreventionAction};

/// Receives monitoring outcomes on the notification thread.
///
/// Both methods default to no-ops so implementors can subscribe to only the
/// side they care about. Observers only ever receive immutable event
/// values, never a handle into detector state. Keep callbacks short; a slow
/// observer delays other observers, though never the analysis context.
pub trait MonitorObserver: Send + Sync {
    /// Called once per confirmed feedback event.
    fn on_feedback_event(&self, _event: &FeedbackEvent) {}

    /// Called with the corrective action chosen for an event, if any.
    fn on_prevention_action(&self, _action: &PreventionAction) {}
}

/// Closure adapter registered via `FeedbackMonitor::on_feedback_event`.
pub(crate) struct FnEventObserver<F>(pub F);

impl<F> MonitorObserver for FnEventObserver<F>
where
    F: Fn(&FeedbackEvent) + Send + Sync,
{
    fn on_feedback_event(&self, event: &FeedbackEvent) {
        (self.0)(event);
    }
}

/// Closure adapter registered via `FeedbackMonitor::on_prevention_action`.
pub(crate) struct FnActionObserver<F>(pub F);

impl<F> MonitorObserver for FnActionObserver<F>
where
    F: Fn(&PreventionAction) + Send + Sync,
{
    fn on_prevention_action(&self, action: &PreventionAction) {
        (self.0)(action);
    }
}
