//! Distance and similarity math shared by the matchers and clustering
//!
//! All functions assume equal-length slices; callers validate band counts
//! once at configuration time.

use serde::{Deserialize, Serialize};
use specmap_core::{Error, Result};
use std::str::FromStr;

/// Dot product
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm
pub fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Arithmetic mean; 0 for an empty slice
pub fn mean(a: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter().sum::<f64>() / a.len() as f64
}

pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

pub fn manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

pub fn chebyshev(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

/// Angle between two spectra in radians, in `[0, π]`.
///
/// Computed as `2·atan2(‖â − b̂‖, ‖â + b̂‖)` on the unit vectors, which stays
/// exact for identical and opposite spectra where `acos` of a rounded cosine
/// does not. Returns `None` when either spectrum has zero norm.
pub fn spectral_angle(a: &[f64], b: &[f64]) -> Option<f64> {
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 || nb == 0.0 || !na.is_finite() || !nb.is_finite() {
        return None;
    }

    let mut diff = 0.0;
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (ux, uy) = (x / na, y / nb);
        diff += (ux - uy) * (ux - uy);
        sum += (ux + uy) * (ux + uy);
    }
    let angle = 2.0 * diff.sqrt().atan2(sum.sqrt());
    Some(angle.clamp(0.0, std::f64::consts::PI))
}

/// Pearson correlation coefficient in `[-1, 1]`.
///
/// Returns `None` when either input is constant (zero variance).
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if is_constant(a) || is_constant(b) {
        return None;
    }
    let ma = mean(a);
    let mb = mean(b);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - ma;
        let dy = y - mb;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = sxx.sqrt() * syy.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

fn is_constant(a: &[f64]) -> bool {
    match a.first() {
        Some(&first) => a.iter().all(|&v| v == first),
        None => true,
    }
}

/// Distance metric for nearest-neighbour assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::Euclidean => euclidean(a, b),
            DistanceMetric::Manhattan => manhattan(a, b),
            DistanceMetric::Chebyshev => chebyshev(a, b),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "manhattan" => Ok(DistanceMetric::Manhattan),
            "chebyshev" => Ok(DistanceMetric::Chebyshev),
            other => Err(Error::invalid(
                "metric",
                other,
                "expected euclidean, manhattan or chebyshev",
            )),
        }
    }
}

/// Index and distance of the closest of `candidates` (rows of `bands` values).
///
/// Ties resolve to the lowest index. Returns `None` for an empty candidate set.
pub fn nearest(
    pixel: &[f64],
    candidates: &[f64],
    bands: usize,
    metric: DistanceMetric,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.chunks_exact(bands).enumerate() {
        let d = metric.distance(pixel, candidate);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_basic_distances() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 6.0, 3.0];
        assert_relative_eq!(euclidean(&a, &b), 5.0);
        assert_relative_eq!(manhattan(&a, &b), 7.0);
        assert_relative_eq!(chebyshev(&a, &b), 4.0);
        assert_relative_eq!(dot(&a, &b), 25.0);
    }

    #[test]
    fn test_spectral_angle_exact_cases() {
        let a = [0.3, 0.1, 0.7, 0.2];
        assert_eq!(spectral_angle(&a, &a), Some(0.0));
        let neg: Vec<f64> = a.iter().map(|v| -v).collect();
        assert_eq!(spectral_angle(&a, &neg), Some(PI));
        assert_relative_eq!(
            spectral_angle(&[1.0, 0.0], &[0.0, 1.0]).unwrap(),
            FRAC_PI_2,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            spectral_angle(&[1.0, 1.0], &[1.0, 0.0]).unwrap(),
            FRAC_PI_4,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_spectral_angle_zero_norm() {
        assert_eq!(spectral_angle(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(spectral_angle(&[1.0, 0.0], &[0.0, 0.0]), None);
    }

    #[test]
    fn test_pearson() {
        assert_relative_eq!(
            pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(),
            1.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(),
            -1.0,
            epsilon = 1e-12
        );
        assert_eq!(pearson(&[0.1, 0.1, 0.1], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), None);
    }

    #[test]
    fn test_nearest_tie_goes_to_first() {
        let candidates = [0.0, 0.0, 2.0, 2.0];
        assert_eq!(
            nearest(&[1.0, 1.0], &candidates, 2, DistanceMetric::Euclidean).map(|(i, _)| i),
            Some(0)
        );
        assert_eq!(
            nearest(&[1.9, 2.0], &candidates, 2, DistanceMetric::Manhattan).map(|(i, _)| i),
            Some(1)
        );
        assert!(nearest(&[1.0], &[], 1, DistanceMetric::Euclidean).is_none());
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("Manhattan".parse::<DistanceMetric>().unwrap(), DistanceMetric::Manhattan);
        assert!("cosine".parse::<DistanceMetric>().is_err());
    }
}
