//! ISODATA clustering
//!
//! Iterative Self-Organizing Data Analysis Technique. Extends K-means
//! with a split/merge phase between passes: spread-out clusters are split
//! along their widest band and clusters with nearby centres are merged.

use super::centroids::CentroidTable;
use super::clustering::{Cluster, Clusterer, ClusteringConfig, ClusteringOutcome};
use super::distance::euclidean;
use super::init::InitMethod;
use serde::{Deserialize, Serialize};
use specmap_core::{Error, Raster, Result};
use specmap_parallel::TraversalEngine;

/// Parameters for ISODATA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsodataParams {
    /// Initial number of clusters (default: 5)
    pub num_clusters: usize,
    /// Upper bound on clusters created by splitting (default: 10)
    pub max_num_clusters: usize,
    /// Maximum assignment passes (default: 50)
    pub max_num_iterations: usize,
    /// Converged once no centroid moves this far in a pass and no split or
    /// merge applies (default: 0.001)
    pub cluster_move_threshold: f64,
    /// Clusters with fewer pixels are discarded (default: 10)
    pub min_num_vals: usize,
    /// Centres closer than this are merged (default: 5.0)
    pub min_distance_between_centres: f64,
    /// Clusters whose widest band exceeds this std dev may split (default: 10.0)
    pub stddev_thres: f64,
    /// Only clusters at least this multiple of the average
    /// intra-cluster distance may split (default: 1.0)
    pub prop_over_avg_dist: f64,
    /// Split offset in standard deviations (default: 0.5)
    pub split_fraction: f64,
    /// Initial centroid selection (default: k-means++)
    pub init: InitMethod,
    /// Random seed for initialisation (default: 42)
    pub seed: u64,
}

impl Default for IsodataParams {
    fn default() -> Self {
        Self {
            num_clusters: 5,
            max_num_clusters: 10,
            max_num_iterations: 50,
            cluster_move_threshold: 0.001,
            min_num_vals: 10,
            min_distance_between_centres: 5.0,
            stddev_thres: 10.0,
            prop_over_avg_dist: 1.0,
            split_fraction: 0.5,
            init: InitMethod::default(),
            seed: 42,
        }
    }
}

impl IsodataParams {
    pub fn to_config(&self) -> ClusteringConfig {
        ClusteringConfig {
            num_clusters: self.num_clusters,
            max_num_iterations: self.max_num_iterations,
            cluster_move_threshold: self.cluster_move_threshold,
            min_num_vals: self.min_num_vals,
            init: self.init,
            seed: self.seed,
            split_merge: Some(SplitMergeParams {
                max_num_clusters: self.max_num_clusters,
                min_distance_between_centres: self.min_distance_between_centres,
                stddev_thres: self.stddev_thres,
                prop_over_avg_dist: self.prop_over_avg_dist,
                split_fraction: self.split_fraction,
            }),
        }
    }
}

/// Thresholds for the split/merge phase
#[derive(Debug, Clone, PartialEq)]
pub struct SplitMergeParams {
    pub max_num_clusters: usize,
    pub min_distance_between_centres: f64,
    pub stddev_thres: f64,
    pub prop_over_avg_dist: f64,
    pub split_fraction: f64,
}

impl SplitMergeParams {
    pub(crate) fn validate(&self, num_clusters: usize) -> Result<()> {
        if self.max_num_clusters < num_clusters {
            return Err(Error::invalid(
                "max_num_clusters",
                self.max_num_clusters,
                format!("must be at least num_clusters ({num_clusters})"),
            ));
        }
        let non_negative = [
            ("min_distance_between_centres", self.min_distance_between_centres),
            ("stddev_thres", self.stddev_thres),
            ("prop_over_avg_dist", self.prop_over_avg_dist),
        ];
        for (name, value) in non_negative {
            if value.is_nan() || value < 0.0 {
                return Err(Error::invalid(name, value, "must be non-negative"));
            }
        }
        if !(self.split_fraction.is_finite() && self.split_fraction > 0.0) {
            return Err(Error::invalid(
                "split_fraction",
                self.split_fraction,
                "must be a positive number",
            ));
        }
        Ok(())
    }
}

/// Centroids for the next pass after one split/merge phase
#[derive(Debug, Clone)]
pub struct SplitMergeStep {
    pub centroids: Vec<Vec<f64>>,
    pub splits: usize,
    pub merges: usize,
}

struct Candidate {
    centroid: Vec<f64>,
    count: usize,
    /// Created by a split in this phase
    fresh: bool,
}

/// Split then merge the clusters of the pass that just finished
pub fn split_merge(clusters: Vec<Cluster>, params: &SplitMergeParams, min_num_vals: usize) -> SplitMergeStep {
    let total: usize = clusters.iter().map(|c| c.count).sum();
    let overall_mean_distance = if total > 0 {
        clusters
            .iter()
            .map(|c| c.mean_distance * c.count as f64)
            .sum::<f64>()
            / total as f64
    } else {
        0.0
    };

    let mut candidates = Vec::with_capacity(clusters.len() * 2);
    let mut num_clusters = clusters.len();
    let mut splits = 0;

    for cluster in clusters {
        let (band, sd) = cluster.max_std_dev();
        let should_split = num_clusters < params.max_num_clusters
            && sd > params.stddev_thres
            && cluster.count > 2 * min_num_vals + 1
            && cluster.mean_distance >= params.prop_over_avg_dist * overall_mean_distance;

        if should_split {
            let offset = params.split_fraction * sd;
            let mut low = cluster.centroid.clone();
            let mut high = cluster.centroid;
            low[band] -= offset;
            high[band] += offset;
            let half = cluster.count / 2;
            candidates.push(Candidate {
                centroid: low,
                count: half,
                fresh: true,
            });
            candidates.push(Candidate {
                centroid: high,
                count: cluster.count - half,
                fresh: true,
            });
            num_clusters += 1;
            splits += 1;
        } else {
            candidates.push(Candidate {
                centroid: cluster.centroid,
                count: cluster.count,
                fresh: false,
            });
        }
    }

    let (centroids, merges) = merge_close(candidates, params.min_distance_between_centres);
    SplitMergeStep {
        centroids,
        splits,
        merges,
    }
}

/// Merge pairs closer than `min_distance`, closest pairs first.
///
/// Each cluster takes part in at most one merge; fresh clusters never do.
fn merge_close(candidates: Vec<Candidate>, min_distance: f64) -> (Vec<Vec<f64>>, usize) {
    let mut pairs = Vec::new();
    for i in 0..candidates.len() {
        for j in i + 1..candidates.len() {
            if candidates[i].fresh || candidates[j].fresh {
                continue;
            }
            let d = euclidean(&candidates[i].centroid, &candidates[j].centroid);
            if d < min_distance {
                pairs.push((d, i, j));
            }
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut partner: Vec<Option<usize>> = vec![None; candidates.len()];
    let mut used = vec![false; candidates.len()];
    let mut merges = 0;
    for (_, i, j) in pairs {
        if used[i] || used[j] {
            continue;
        }
        used[i] = true;
        used[j] = true;
        partner[i] = Some(j);
        merges += 1;
    }

    let mut centroids = Vec::with_capacity(candidates.len() - merges);
    for (i, candidate) in candidates.iter().enumerate() {
        match partner[i] {
            Some(j) => {
                let other = &candidates[j];
                let (wa, wb) = (candidate.count as f64, other.count as f64);
                let weight = wa + wb;
                let merged = candidate
                    .centroid
                    .iter()
                    .zip(&other.centroid)
                    .map(|(a, b)| {
                        if weight > 0.0 {
                            (a * wa + b * wb) / weight
                        } else {
                            (a + b) / 2.0
                        }
                    })
                    .collect();
                centroids.push(merged);
            }
            // Absorbed into an earlier partner
            None if used[i] => {}
            None => centroids.push(candidate.centroid.clone()),
        }
    }
    (centroids, merges)
}

/// ISODATA over a multi-band raster with the default traversal engine
pub fn isodata(input: &Raster, params: &IsodataParams) -> Result<ClusteringOutcome> {
    Clusterer::default().run(input, &params.to_config())
}

/// ISODATA followed by the labeling pass.
///
/// Returns the label raster (1..k, NaN for no-data) and the centroid table.
pub fn isodata_raster(
    engine: &TraversalEngine,
    input: &Raster,
    params: &IsodataParams,
) -> Result<(Raster, CentroidTable)> {
    let outcome = Clusterer::new(engine.clone()).run(input, &params.to_config())?;
    outcome.label(engine, input)
}
