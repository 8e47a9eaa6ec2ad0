// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Azimuth reconstruction.
//!
//! The sensor reports one azimuth per data block but fires every beam twice
//! per block. The second firing's azimuth is the midpoint between the block's
//! azimuth and the next block's, assuming constant rotation speed over one
//! block.

use std::f64::consts::{PI, TAU};

/// Convert a raw azimuth (hundredths of a degree) to radians.
///
/// The device rotates clockwise seen from above so the angle is negated.
#[inline]
pub fn azimuth_from_raw(raw: u16) -> f64 {
    -(raw as f64 / 100.0).to_radians()
}

/// Signed shortest difference `a - b`, in `(-π, π]`.
#[inline]
pub fn angular_delta(a: f64, b: f64) -> f64 {
    let delta = (a - b).rem_euclid(TAU);
    if delta > PI { delta - TAU } else { delta }
}

/// Expand `samples` into one angle per firing.
///
/// Each consecutive pair `(a1, a2)` produces `a1` followed by the midpoint
/// `a1 + 0.5 * angular_delta(a2, a1)`, so `N + 1` samples give `2N` angles.
/// The final sample is only used as the upper end of the last pair.
pub fn interpolate(samples: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(2 * samples.len().saturating_sub(1));
    interpolate_into(samples, &mut out);
    out
}

/// Same as [`interpolate`] but appends into an existing buffer.
pub fn interpolate_into(samples: &[f64], out: &mut Vec<f64>) {
    for pair in samples.windows(2) {
        let (a1, a2) = (pair[0], pair[1]);
        out.push(a1);
        out.push(a1 + 0.5 * angular_delta(a2, a1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azimuth_from_raw() {
        assert_eq!(azimuth_from_raw(0), 0.0);
        assert!((azimuth_from_raw(9000) + PI / 2.0).abs() < 1e-12);
        assert!((azimuth_from_raw(18000) + PI).abs() < 1e-12);
    }

    #[test]
    fn test_angular_delta_identity() {
        for a in [-7.0, -PI, -1.0, 0.0, 0.5, PI, 4.0, 10.0] {
            assert_eq!(angular_delta(a, a), 0.0);
        }
    }

    #[test]
    fn test_angular_delta_range() {
        let mut a = -10.0;
        while a < 10.0 {
            let mut b = -10.0;
            while b < 10.0 {
                let d = angular_delta(a, b);
                assert!(d > -PI && d <= PI, "delta({}, {}) = {}", a, b, d);
                // Differs from the raw difference by whole turns only
                let turns = ((a - b) - d) / TAU;
                assert!((turns - turns.round()).abs() < 1e-9);
                b += 0.37;
            }
            a += 0.41;
        }
    }

    #[test]
    fn test_angular_delta_wraparound() {
        let a = 179.9f64.to_radians();
        let b = (-179.9f64).to_radians();
        let d = angular_delta(b, a);
        assert!((d - 0.2f64.to_radians()).abs() < 1e-9, "{}", d);

        // Negated device convention wraps between 0 and -2π
        let d = angular_delta(azimuth_from_raw(10), azimuth_from_raw(35990));
        assert!((d + 0.2f64.to_radians()).abs() < 1e-9, "{}", d);
    }

    #[test]
    fn test_interpolate_pairs() {
        let samples = [0.0, -0.2, -0.4];
        let out = interpolate(&samples);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 0.0);
        assert!((out[1] + 0.1).abs() < 1e-12);
        assert_eq!(out[2], -0.2);
        assert!((out[3] + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_wraparound_midpoint() {
        let a1 = 179.9f64.to_radians();
        let a2 = (-179.9f64).to_radians();
        let out = interpolate(&[a1, a2]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], a1);
        // Midpoint lies at 180°, not near 0°
        assert!((out[1] - PI).abs() < 1e-9, "{}", out[1]);
    }

    #[test]
    fn test_interpolate_empty() {
        assert!(interpolate(&[]).is_empty());
        assert!(interpolate(&[1.0]).is_empty());
    }
}
