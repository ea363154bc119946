//! Level conversion math for the detection pipeline.
//!
//! All functions are allocation-free and suitable for `no_std`, using
//! `libm` for the underlying float operations.

use libm::{expf, logf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use larsen_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels full scale.
///
/// Magnitudes at or below the `1e-10` floor clamp to -200 dB, which keeps
/// silence well under any usable noise floor without producing -inf.
///
/// # Example
/// ```rust
/// use larsen_core::linear_to_db;
///
/// assert!((linear_to_db(1.0) - 0.0).abs() < 0.001);
/// assert!((linear_to_db(0.5) - (-6.02)).abs() < 0.01);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    // 20 * log10(x) = 20 * ln(x) / ln(10)
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_to_linear_reference_points() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-4);
        assert!((db_to_linear(-6.0) - 0.5012).abs() < 1e-3);
        assert!((db_to_linear(20.0) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn linear_to_db_reference_points() {
        assert!((linear_to_db(1.0)).abs() < 1e-4);
        assert!((linear_to_db(0.5) + 6.02).abs() < 1e-2);
        assert!((linear_to_db(10.0) - 20.0).abs() < 1e-3);
    }

    #[test]
    fn linear_to_db_floors_silence() {
        assert!((linear_to_db(0.0) + 200.0).abs() < 0.5);
        assert!(linear_to_db(0.0) < -100.0);
    }

    #[test]
    fn round_trip() {
        for db in [-60.0, -6.0, 0.0, 12.0] {
            let back = linear_to_db(db_to_linear(db));
            assert!((back - db).abs() < 1e-3, "{db} -> {back}");
        }
    }
}
