//! Larsen Core - acoustic feedback detection primitives
//!
//! This crate provides the detection pipeline for runaway positive gain
//! loops (the Larsen effect) on a live multi-channel signal path. It is
//! pure computation: no threads, no I/O, no clocks. The companion
//! `larsen-monitor` crate wraps it in a real-time-safe engine.
//!
//! # Pipeline
//!
//! One analysis tick flows through four stages:
//!
//! 1. [`SecureSampleBuffer`] validates the incoming samples and guarantees
//!    the memory is zeroed after every access, success or failure.
//! 2. [`compute_peaks`] reduces each channel to its peak magnitude
//!    ([`peak`], [`rms`] are also usable standalone).
//! 3. [`FeedbackDetector`] compares the peak vector against the previous
//!    window and accumulates a sustain counter behind a triple hysteresis
//!    condition (loud, stable, above the noise floor).
//! 4. [`PreventionController`] turns a confirmed [`FeedbackEvent`] into a
//!    [`PreventionAction`] (gain reduction, escalating to mute or reroute).
//!
//! The detector's previous-window state is the only persistent state in
//! the pipeline; everything else is request/response.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (with `alloc`). Disable the default
//! `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! larsen-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use larsen_core::{
//!     compute_peaks, db_to_linear, DetectorConfig, Error, FeedbackDetector,
//!     PreventionController, SecureSampleBuffer,
//! };
//!
//! let mut buffer = SecureSampleBuffer::new(2, 256)?;
//! let mut detector = FeedbackDetector::new(DetectorConfig::default())?;
//! let mut controller = PreventionController::default();
//!
//! // One tick: a loud stable tone on both channels.
//! let tone = vec![db_to_linear(-3.0); 512];
//! for _ in 0..3 {
//!     let frames = buffer.write_interleaved(&tone)?;
//!     let peaks = buffer
//!         .with_scoped_access(frames, |view| compute_peaks(view).map_err(Error::from))?;
//!     if let Some(event) = detector.update(&peaks) {
//!         let action = controller.on_event(&event);
//!         assert!(action.is_some());
//!     }
//! }
//! # Ok::<(), larsen_core::Error>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod analysis;
pub mod buffer;
pub mod detector;
pub mod math;
pub mod prevention;

pub use analysis::{AnalysisError, compute_peaks, peak, peak_db, rms, rms_db};
pub use buffer::{BufferError, ChannelFrames, SecureSampleBuffer};
pub use detector::{ConfigError, DetectorConfig, FeedbackDetector, FeedbackEvent};
pub use math::{db_to_linear, linear_to_db};
pub use prevention::{PreventionAction, PreventionController, PreventionPolicy, RoutePair};

/// Any error from the detection pipeline.
///
/// Aggregates the per-stage error types so callers can thread one error
/// through a whole tick, e.g. as the closure error of
/// [`SecureSampleBuffer::with_scoped_access`].
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Buffer allocation, loading, or validation failed.
    Buffer(BufferError),
    /// Peak/RMS analysis rejected its input.
    Analysis(AnalysisError),
    /// A configuration was internally inconsistent.
    Config(ConfigError),
}

impl From<BufferError> for Error {
    fn from(err: BufferError) -> Self {
        Self::Buffer(err)
    }
}

impl From<AnalysisError> for Error {
    fn from(err: AnalysisError) -> Self {
        Self::Analysis(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

#[cfg(feature = "std")]
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Buffer(err) => write!(f, "buffer error: {err}"),
            Self::Analysis(err) => write!(f, "analysis error: {err}"),
            Self::Config(err) => write!(f, "configuration error: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Buffer(err) => Some(err),
            Self::Analysis(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}
