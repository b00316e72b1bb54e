//! Initial centroid selection for clustering

use super::distance::squared_euclidean;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use specmap_core::{Error, Raster, Result};
use std::str::FromStr;

/// How the first set of centroids is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    /// Distinct pixel vectors drawn by a seeded shuffle
    Random,
    /// D²-weighted seeding (Arthur & Vassilvitskii, 2007)
    #[default]
    KMeansPlusPlus,
}

impl FromStr for InitMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "random" => Ok(InitMethod::Random),
            "kmeans++" | "kmeans_plus_plus" | "kmeanspp" => Ok(InitMethod::KMeansPlusPlus),
            other => Err(Error::invalid("init", other, "expected random or kmeans++")),
        }
    }
}

/// Spectra of every pixel with data in all bands, in raster order
pub(crate) fn valid_pixels(input: &Raster) -> Vec<&[f64]> {
    input.pixels().filter(|p| input.is_valid_pixel(p)).collect()
}

fn too_few(k: usize, found: usize) -> Error {
    Error::invalid(
        "num_clusters",
        k,
        format!("only {found} distinct valid pixel vectors available"),
    )
}

/// Pick `k` distinct starting centroids from the valid pixels.
///
/// Deterministic for a fixed `seed`.
pub fn initial_centroids(
    pixels: &[&[f64]],
    k: usize,
    method: InitMethod,
    seed: u64,
) -> Result<Vec<Vec<f64>>> {
    if k == 0 {
        return Err(Error::invalid("num_clusters", 0, "must be at least 1"));
    }
    if pixels.len() < k {
        return Err(too_few(k, pixels.len()));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    match method {
        InitMethod::Random => random_distinct(pixels, k, &mut rng),
        InitMethod::KMeansPlusPlus => kmeans_plus_plus(pixels, k, &mut rng),
    }
}

fn random_distinct(pixels: &[&[f64]], k: usize, rng: &mut StdRng) -> Result<Vec<Vec<f64>>> {
    let mut order: Vec<usize> = (0..pixels.len()).collect();
    order.shuffle(rng);

    let mut chosen: Vec<Vec<f64>> = Vec::with_capacity(k);
    for i in order {
        let candidate = pixels[i];
        if chosen.iter().all(|c| c.as_slice() != candidate) {
            chosen.push(candidate.to_vec());
            if chosen.len() == k {
                return Ok(chosen);
            }
        }
    }
    Err(too_few(k, chosen.len()))
}

fn kmeans_plus_plus(pixels: &[&[f64]], k: usize, rng: &mut StdRng) -> Result<Vec<Vec<f64>>> {
    let first = pixels[rng.gen_range(0..pixels.len())];
    let mut chosen = vec![first.to_vec()];
    let mut d2: Vec<f64> = pixels.iter().map(|p| squared_euclidean(p, first)).collect();

    while chosen.len() < k {
        let total: f64 = d2.iter().sum();
        // Every remaining pixel coincides with a chosen centroid
        if total <= 0.0 || !total.is_finite() {
            return Err(too_few(k, chosen.len()));
        }

        let target = rng.gen_range(0.0..total);
        let mut acc = 0.0;
        let mut pick = None;
        for (i, &w) in d2.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            acc += w;
            pick = Some(i);
            if acc > target {
                break;
            }
        }
        let Some(i) = pick else {
            return Err(too_few(k, chosen.len()));
        };

        let next = pixels[i];
        for (d, p) in d2.iter_mut().zip(pixels) {
            *d = d.min(squared_euclidean(p, next));
        }
        chosen.push(next.to_vec());
    }
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![10.0, 10.0],
            vec![10.0, 10.0],
            vec![11.0, 10.0],
        ]
    }

    fn is_distinct(centroids: &[Vec<f64>]) -> bool {
        centroids
            .iter()
            .enumerate()
            .all(|(i, a)| centroids[i + 1..].iter().all(|b| a != b))
    }

    #[test]
    fn test_random_picks_distinct_vectors() {
        let owned = data();
        let pixels: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let c = initial_centroids(&pixels, 4, InitMethod::Random, 7).unwrap();
        assert_eq!(c.len(), 4);
        assert!(is_distinct(&c));
        assert!(initial_centroids(&pixels, 5, InitMethod::Random, 7).is_err());
    }

    #[test]
    fn test_kmeans_plus_plus_distinct_and_seeded() {
        let owned = data();
        let pixels: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let a = initial_centroids(&pixels, 4, InitMethod::KMeansPlusPlus, 3).unwrap();
        let b = initial_centroids(&pixels, 4, InitMethod::KMeansPlusPlus, 3).unwrap();
        assert_eq!(a, b);
        assert!(is_distinct(&a));
        assert!(matches!(
            initial_centroids(&pixels, 5, InitMethod::KMeansPlusPlus, 3),
            Err(Error::InvalidParameter { name: "num_clusters", .. })
        ));
    }

    #[test]
    fn test_valid_pixels_skip_nodata() {
        let mut r = Raster::from_vec(vec![1.0, 2.0, f64::NAN, 4.0, -1.0, 5.0], 1, 3, 2).unwrap();
        r.set_nodata(Some(-1.0));
        let pixels = valid_pixels(&r);
        assert_eq!(pixels, vec![&[1.0, 2.0][..]]);
    }

    #[test]
    fn test_init_method_from_str() {
        assert_eq!("kmeans++".parse::<InitMethod>().unwrap(), InitMethod::KMeansPlusPlus);
        assert_eq!("Random".parse::<InitMethod>().unwrap(), InitMethod::Random);
        assert!("forgy".parse::<InitMethod>().is_err());
    }
}
