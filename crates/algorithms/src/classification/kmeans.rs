//! K-means clustering for multi-band rasters
//!
//! Unsupervised classification by iteratively partitioning pixels
//! into k clusters based on spectral distance.

use super::centroids::CentroidTable;
use super::clustering::{Clusterer, ClusteringConfig, ClusteringOutcome};
use super::init::InitMethod;
use serde::{Deserialize, Serialize};
use specmap_core::{Raster, Result};
use specmap_parallel::TraversalEngine;

/// Parameters for K-means clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmeansParams {
    /// Number of clusters (default: 5)
    pub num_clusters: usize,
    /// Maximum assignment passes (default: 100)
    pub max_num_iterations: usize,
    /// Stop when no centroid moves this far in a pass (default: 0.001)
    pub cluster_move_threshold: f64,
    /// Clusters with fewer pixels are discarded (default: 1)
    pub min_num_vals: usize,
    /// Initial centroid selection (default: k-means++)
    pub init: InitMethod,
    /// Random seed for initial centroid selection (default: 42)
    pub seed: u64,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            num_clusters: 5,
            max_num_iterations: 100,
            cluster_move_threshold: 0.001,
            min_num_vals: 1,
            init: InitMethod::default(),
            seed: 42,
        }
    }
}

impl KmeansParams {
    pub fn to_config(&self) -> ClusteringConfig {
        ClusteringConfig {
            num_clusters: self.num_clusters,
            max_num_iterations: self.max_num_iterations,
            cluster_move_threshold: self.cluster_move_threshold,
            min_num_vals: self.min_num_vals,
            init: self.init,
            seed: self.seed,
            split_merge: None,
        }
    }
}

/// K-means over every band of a raster.
///
/// Pixels with no-data in any band take no part. Returns the final
/// clusters and how the run terminated.
pub fn kmeans(input: &Raster, params: &KmeansParams) -> Result<ClusteringOutcome> {
    Clusterer::default().run(input, &params.to_config())
}

/// K-means followed by the labeling pass.
///
/// # Returns
/// Raster with cluster labels (1..k, NaN for no-data) and the centroid table.
pub fn kmeans_raster(
    engine: &TraversalEngine,
    input: &Raster,
    params: &KmeansParams,
) -> Result<(Raster, CentroidTable)> {
    let outcome = Clusterer::new(engine.clone()).run(input, &params.to_config())?;
    outcome.label(engine, input)
}
