//! Real-time acoustic feedback monitoring for the Larsen framework.
//!
//! This crate wraps the pure `larsen-core` detection pipeline in a
//! threaded engine:
//!
//! - **[`FeedbackMonitor`]**: accepts one sample buffer per tick from a
//!   real-time producer, analyzes on a background worker, and notifies
//!   observers — without ever blocking the producer.
//! - **[`MonitorObserver`]**: typed registration for feedback events and
//!   prevention actions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use larsen_monitor::{FeedbackMonitor, MonitorConfig};
//!
//! let mut monitor = FeedbackMonitor::new(MonitorConfig::new(2, 4096))?;
//! monitor.on_feedback_event(|event| {
//!     println!("feedback on channels {:?}", event.channels);
//! });
//!
//! // Audio callback, once per buffer:
//! // monitor.submit_interleaved(&samples)?;
//!
//! monitor.stop();
//! # Ok::<(), larsen_monitor::Error>(())
//! ```

mod monitor;
mod observer;

pub use monitor::{FeedbackMonitor, MonitorConfig};
pub use observer::MonitorObserver;

// Re-export the core types that appear in this crate's public API.
pub use larsen_core::{
    AnalysisError, BufferError, ConfigError, DetectorConfig, FeedbackEvent, PreventionAction,
    PreventionPolicy, RoutePair,
};

/// Error types for monitoring operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Buffer allocation, loading, or validation error.
    ///
    /// Fatal at session construction; per-tick otherwise (the tick is
    /// dropped, the session continues).
    #[error("buffer error: {0}")]
    Buffer(#[from] larsen_core::BufferError),

    /// Peak/RMS analysis rejected a tick.
    #[error("analysis error: {0}")]
    Analysis(#[from] larsen_core::AnalysisError),

    /// Invalid tunables; the previous configuration remains active.
    #[error("configuration error: {0}")]
    Config(#[from] larsen_core::ConfigError),

    /// The session has been stopped and no longer accepts ticks.
    #[error("monitor is not running")]
    NotRunning,

    /// The producer-side buffer was already in use; the tick was dropped
    /// rather than blocking the producer.
    #[error("producer buffer busy, tick dropped")]
    Busy,

    /// Thread spawn or other OS-level failure at session construction.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for monitoring operations.
pub type Result<T> = std::result::Result<T, Error>;
