//! Stateless per-tick signal statistics.
//!
//! Reduces one tick's worth of validated samples to per-channel peak
//! magnitudes and an RMS severity figure. Every function re-validates its
//! input even though [`SecureSampleBuffer`](crate::SecureSampleBuffer)
//! already did — the analyzer must be safe to call standalone, without the
//! buffer wrapper in front of it.

use crate::buffer::ChannelFrames;
use crate::math::linear_to_db;
use alloc::vec::Vec;
use libm::{fabsf, sqrtf};

/// Errors from peak and RMS analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisError {
    /// The input holds no samples.
    EmptyInput,
    /// A sample is NaN or infinite.
    ///
    /// Single-slice entry points report the channel as 0.
    NonFinite {
        /// Channel holding the offending sample.
        channel: usize,
        /// Frame index of the offending sample.
        frame: usize,
    },
}

#[cfg(feature = "std")]
impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "cannot analyze an empty sample slice"),
            Self::NonFinite { channel, frame } => {
                write!(f, "non-finite sample at channel {channel}, frame {frame}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AnalysisError {}

fn scan_peak(channel: usize, samples: &[f32]) -> Result<f32, AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    let mut peak = 0.0_f32;
    for (frame, &sample) in samples.iter().enumerate() {
        if !sample.is_finite() {
            return Err(AnalysisError::NonFinite { channel, frame });
        }
        let magnitude = fabsf(sample);
        if magnitude > peak {
            peak = magnitude;
        }
    }
    Ok(peak)
}

/// Maximum absolute sample magnitude, linear scale.
pub fn peak(samples: &[f32]) -> Result<f32, AnalysisError> {
    scan_peak(0, samples)
}

/// Peak magnitude in dBFS.
pub fn peak_db(samples: &[f32]) -> Result<f32, AnalysisError> {
    peak(samples).map(linear_to_db)
}

/// Root-mean-square level, linear scale.
pub fn rms(samples: &[f32]) -> Result<f32, AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    let mut sum_sq = 0.0_f32;
    for (frame, &sample) in samples.iter().enumerate() {
        if !sample.is_finite() {
            return Err(AnalysisError::NonFinite { channel: 0, frame });
        }
        sum_sq += sample * sample;
    }
    Ok(sqrtf(sum_sq / samples.len() as f32))
}

/// RMS level in dBFS.
pub fn rms_db(samples: &[f32]) -> Result<f32, AnalysisError> {
    rms(samples).map(linear_to_db)
}

/// Per-channel peak magnitudes for one validated tick.
///
/// Produces one linear-scale entry per channel, in channel order. This is
/// the vector the [`FeedbackDetector`](crate::FeedbackDetector) consumes.
pub fn compute_peaks(frames: &ChannelFrames<'_>) -> Result<Vec<f32>, AnalysisError> {
    let mut peaks = Vec::with_capacity(frames.channel_count());
    for channel in 0..frames.channel_count() {
        peaks.push(scan_peak(channel, frames.channel(channel))?);
    }
    Ok(peaks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SecureSampleBuffer;
    use alloc::vec;

    #[test]
    fn peak_finds_max_magnitude() {
        assert_eq!(peak(&[0.1, -0.7, 0.3]).unwrap(), 0.7);
        assert_eq!(peak(&[0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn peak_rejects_empty_and_non_finite() {
        assert_eq!(peak(&[]), Err(AnalysisError::EmptyInput));
        assert_eq!(
            peak(&[0.1, f32::NAN]),
            Err(AnalysisError::NonFinite { channel: 0, frame: 1 })
        );
    }

    #[test]
    fn rms_of_constant_signal() {
        let value = rms(&[0.5; 128]).unwrap();
        assert!((value - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rms_of_unit_sine() {
        let sine: Vec<f32> = (0..4800)
            .map(|i| (2.0 * core::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin())
            .collect();
        let value = rms(&sine).unwrap();
        assert!((value - 1.0 / 2.0_f32.sqrt()).abs() < 0.01);
    }

    #[test]
    fn rms_rejects_infinity() {
        assert_eq!(
            rms(&[0.1, f32::INFINITY, 0.2]),
            Err(AnalysisError::NonFinite { channel: 0, frame: 1 })
        );
    }

    #[test]
    fn compute_peaks_all_zero_buffer() {
        let mut buffer = SecureSampleBuffer::new(3, 16).unwrap();
        buffer.write_interleaved(&[0.0; 48]).unwrap();
        let peaks: Vec<f32> = buffer
            .with_scoped_access(16, |view| compute_peaks(view).map_err(crate::Error::from))
            .unwrap();
        assert_eq!(peaks, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn compute_peaks_isolates_channels() {
        let mut buffer = SecureSampleBuffer::new(2, 4).unwrap();
        // Channel 0 quiet, channel 1 carries a single -0.8 spike.
        buffer
            .write_interleaved(&[0.0, 0.0, 0.0, -0.8, 0.0, 0.0, 0.0, 0.0])
            .unwrap();
        let peaks: Vec<f32> = buffer
            .with_scoped_access(4, |view| compute_peaks(view).map_err(crate::Error::from))
            .unwrap();
        assert_eq!(peaks, vec![0.0, 0.8]);
    }

    #[test]
    fn db_helpers_match_reference_levels() {
        assert!((peak_db(&[0.5]).unwrap() + 6.02).abs() < 0.01);
        assert!(rms_db(&[0.0; 8]).unwrap() < -100.0);
    }
}
