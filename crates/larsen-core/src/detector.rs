//! Sustained-feedback hysteresis detection.
//!
//! [`FeedbackDetector`] compares successive per-channel peak vectors and
//! flags channels that stay loud *and* stable across several consecutive
//! analysis windows. A loud transient changes level between windows and
//! fails the stability test; background noise fails the noise-floor test;
//! resonant feedback passes all three and accumulates until the sustain
//! counter trips.
//!
//! All threshold comparisons happen in dBFS. Incoming peak vectors are
//! linear magnitudes (what [`compute_peaks`](crate::compute_peaks)
//! produces) and are converted on entry, so the three tunables share one
//! unit. Event magnitude stays in linear scale: the RMS of the peak vector.

use crate::math::linear_to_db;
use alloc::vec::Vec;
use libm::{fabsf, sqrtf};

/// Errors from tunable-parameter validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// A tunable is NaN or infinite.
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
        /// The offending value.
        value: f32,
    },
    /// The noise floor must stay below the detection threshold.
    NoiseFloorTooHigh {
        /// Configured noise floor in dB.
        noise_floor_db: f32,
        /// Configured detection threshold in dB.
        detection_threshold_db: f32,
    },
    /// The stability epsilon must be positive.
    NonPositiveEpsilon {
        /// The offending value.
        value: f32,
    },
    /// A count field must be nonzero.
    ZeroCount {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A gain field must be positive.
    NonPositiveGain {
        /// Name of the offending field.
        field: &'static str,
        /// The offending value.
        value: f32,
    },
    /// Route escalation was configured without a route to change to.
    RouteWithoutTarget,
}

#[cfg(feature = "std")]
impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NonFinite { field, value } => {
                write!(f, "{field} must be finite, got {value}")
            }
            Self::NoiseFloorTooHigh {
                noise_floor_db,
                detection_threshold_db,
            } => write!(
                f,
                "noise floor {noise_floor_db} dB must be below detection threshold {detection_threshold_db} dB"
            ),
            Self::NonPositiveEpsilon { value } => {
                write!(f, "stability epsilon must be positive, got {value}")
            }
            Self::ZeroCount { field } => write!(f, "{field} must be at least 1"),
            Self::NonPositiveGain { field, value } => {
                write!(f, "{field} must be positive, got {value}")
            }
            Self::RouteWithoutTarget => {
                write!(f, "route escalation configured without a target route")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Tunable detection parameters.
///
/// All thresholds are dBFS; see the module docs for the unit convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Channels louder than this are feedback candidates.
    pub detection_threshold_db: f32,
    /// Channels at or below this level are never considered, however stable.
    pub noise_floor_db: f32,
    /// Maximum window-to-window peak drift for a channel to count as stable.
    pub stability_epsilon_db: f32,
    /// Consecutive suspect windows required before an event fires.
    pub sustained_trigger_count: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detection_threshold_db: -6.0,
            noise_floor_db: -60.0,
            stability_epsilon_db: 0.1,
            sustained_trigger_count: 3,
        }
    }
}

impl DetectorConfig {
    /// Check threshold relationships.
    ///
    /// Rejected configurations leave any detector using the previous
    /// configuration untouched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("detection_threshold_db", self.detection_threshold_db),
            ("noise_floor_db", self.noise_floor_db),
            ("stability_epsilon_db", self.stability_epsilon_db),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if self.noise_floor_db >= self.detection_threshold_db {
            return Err(ConfigError::NoiseFloorTooHigh {
                noise_floor_db: self.noise_floor_db,
                detection_threshold_db: self.detection_threshold_db,
            });
        }
        if self.stability_epsilon_db <= 0.0 {
            return Err(ConfigError::NonPositiveEpsilon {
                value: self.stability_epsilon_db,
            });
        }
        if self.sustained_trigger_count == 0 {
            return Err(ConfigError::ZeroCount {
                field: "sustained_trigger_count",
            });
        }
        Ok(())
    }
}

/// One confirmed feedback occurrence.
///
/// Immutable value handed to the prevention layer and to observers;
/// `channels` holds the suspect channel indices in ascending order and
/// `magnitude` is the RMS of the linear peak vector that tripped the
/// detector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackEvent {
    /// Suspect channel indices, ascending.
    pub channels: Vec<usize>,
    /// RMS of the triggering peak vector, linear scale.
    pub magnitude: f32,
}

/// Hysteresis state machine over successive peak vectors.
///
/// Holds the only persistent state in the pipeline: the previous window's
/// peaks and the sustain counter. Exactly one detector exists per monitored
/// signal path, owned and updated by a single analysis context.
#[derive(Debug, Clone)]
pub struct FeedbackDetector {
    config: DetectorConfig,
    /// Previous window's peaks, dBFS. `None` until the first window lands.
    previous_peaks: Option<Vec<f32>>,
    sustained_count: u32,
}

impl FeedbackDetector {
    /// Create a detector with a validated configuration.
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            previous_peaks: None,
            sustained_count: 0,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// An invalid configuration is rejected and the previous one stays
    /// active. Detection state carries over — retuning thresholds mid-path
    /// does not forget the previous window.
    pub fn set_config(&mut self, config: DetectorConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Consecutive suspect windows seen so far.
    pub fn sustained_count(&self) -> u32 {
        self.sustained_count
    }

    /// Forget all tick-to-tick state.
    ///
    /// Must be called whenever the channel topology changes; a length
    /// change between consecutive updates triggers the same reset
    /// internally.
    pub fn reset(&mut self) {
        self.previous_peaks = None;
        self.sustained_count = 0;
    }

    /// Feed one window's peak vector (linear magnitudes) to the detector.
    ///
    /// Returns an event when the suspect condition has held for
    /// `sustained_trigger_count` consecutive windows. The first window after
    /// construction or reset compares against itself (zero drift), so a
    /// loud stable signal starts accumulating immediately. A window
    /// containing a non-finite peak is ignored outright, leaving all state
    /// untouched.
    pub fn update(&mut self, peaks: &[f32]) -> Option<FeedbackEvent> {
        if peaks.is_empty() {
            self.reset();
            return None;
        }
        if peaks.iter().any(|p| !p.is_finite()) {
            return None;
        }

        let peaks_db: Vec<f32> = peaks.iter().map(|&p| linear_to_db(p)).collect();

        if let Some(previous) = &self.previous_peaks {
            if previous.len() != peaks_db.len() {
                // Topology changed; comparison against the old window is
                // meaningless.
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    previous = previous.len(),
                    current = peaks_db.len(),
                    "channel count changed, detector state reset"
                );
                self.previous_peaks = Some(peaks_db);
                self.sustained_count = 0;
                return None;
            }
        }

        let mut suspects: Vec<usize> = Vec::new();
        {
            let previous = self.previous_peaks.as_deref().unwrap_or(&peaks_db);
            for (channel, &peak_db) in peaks_db.iter().enumerate() {
                if peak_db > self.config.detection_threshold_db
                    && fabsf(peak_db - previous[channel]) < self.config.stability_epsilon_db
                    && peak_db > self.config.noise_floor_db
                {
                    suspects.push(channel);
                }
            }
        }

        let event = if suspects.is_empty() {
            self.sustained_count = 0;
            None
        } else {
            self.sustained_count += 1;
            if self.sustained_count >= self.config.sustained_trigger_count {
                self.sustained_count = 0;
                let mut sum_sq = 0.0_f32;
                for &p in peaks {
                    sum_sq += p * p;
                }
                let magnitude = sqrtf(sum_sq / peaks.len() as f32);
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    channels = ?suspects,
                    magnitude,
                    "sustained feedback trigger"
                );
                Some(FeedbackEvent {
                    channels: suspects,
                    magnitude,
                })
            } else {
                None
            }
        };

        // The comparison above read the old window; only now does the new
        // one become "previous".
        self.previous_peaks = Some(peaks_db);
        event
    }
}
