//! Iterative clustering engine shared by K-Means and ISODATA
//!
//! Each iteration is one traversal pass over the image. Blocks accumulate
//! per-cluster sums into block-local [`Accumulators`], which are reduced in
//! block order after the join, so a pass is deterministic for a given set of
//! centroids regardless of thread count.
//!
//! ```text
//! Initializing -> Assigning -> Updating -> Converged
//!                     ^            |    -> Terminated (max iterations)
//!                     |            v
//!                     +------ SplitMerge (ISODATA)
//! ```

use super::centroids::CentroidTable;
use super::distance::{euclidean, nearest, DistanceMetric};
use super::init::{initial_centroids, valid_pixels, InitMethod};
use super::isodata::{split_merge, SplitMergeParams};
use super::nearest_neighbour::NearestNeighbour;
use serde::{Deserialize, Serialize};
use specmap_core::{Error, Raster, Result, Traversal};
use specmap_parallel::TraversalEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared flag for stopping a clustering run between passes
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Assigning,
    Updating,
    SplitMerge,
    Converged,
    Terminated,
}

/// How a clustering run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Termination {
    /// Centroids stopped moving; `iterations` counts the Updating passes
    /// needed to reach their final positions
    Converged { iterations: usize },
    /// `max_num_iterations` passes ran without converging
    MaxIterations { iterations: usize },
}

impl Termination {
    pub fn iterations(&self) -> usize {
        match self {
            Termination::Converged { iterations } | Termination::MaxIterations { iterations } => {
                *iterations
            }
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::Converged { .. })
    }
}

/// A cluster as of the last Updating phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// Index in the current centroid list; the 1-based label once reported
    pub id: usize,
    pub centroid: Vec<f64>,
    pub count: usize,
    /// Per-band population standard deviation
    pub std_dev: Vec<f64>,
    /// Mean distance of members to the centroid they were assigned to
    pub mean_distance: f64,
}

impl Cluster {
    /// Largest band standard deviation and its band index
    pub fn max_std_dev(&self) -> (usize, f64) {
        self.std_dev
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |best, (b, s)| if s > best.1 { (b, s) } else { best })
    }
}

/// Per-cluster running sums for one pass
#[derive(Debug, Clone)]
pub(crate) struct Accumulators {
    bands: usize,
    sums: Vec<f64>,
    sq_sums: Vec<f64>,
    counts: Vec<usize>,
    dist_sums: Vec<f64>,
}

impl Accumulators {
    pub(crate) fn new(clusters: usize, bands: usize) -> Self {
        Self {
            bands,
            sums: vec![0.0; clusters * bands],
            sq_sums: vec![0.0; clusters * bands],
            counts: vec![0; clusters],
            dist_sums: vec![0.0; clusters],
        }
    }

    pub(crate) fn add(&mut self, cluster: usize, pixel: &[f64], distance: f64) {
        let start = cluster * self.bands;
        let sums = &mut self.sums[start..start + self.bands];
        let sq_sums = &mut self.sq_sums[start..start + self.bands];
        for ((s, q), v) in sums.iter_mut().zip(sq_sums.iter_mut()).zip(pixel) {
            *s += v;
            *q += v * v;
        }
        self.counts[cluster] += 1;
        self.dist_sums[cluster] += distance;
    }

    pub(crate) fn merge(&mut self, other: &Accumulators) {
        self.sums.iter_mut().zip(&other.sums).for_each(|(a, b)| *a += b);
        self.sq_sums.iter_mut().zip(&other.sq_sums).for_each(|(a, b)| *a += b);
        self.counts.iter_mut().zip(&other.counts).for_each(|(a, b)| *a += b);
        self.dist_sums.iter_mut().zip(&other.dist_sums).for_each(|(a, b)| *a += b);
    }

    pub(crate) fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub(crate) fn count(&self, cluster: usize) -> usize {
        self.counts[cluster]
    }

    /// Mean, per-band std dev and mean distance; `None` for an empty cluster
    fn statistics(&self, cluster: usize) -> Option<(Vec<f64>, Vec<f64>, f64)> {
        let n = self.counts[cluster];
        if n == 0 {
            return None;
        }
        let n = n as f64;
        let start = cluster * self.bands;
        let range = start..start + self.bands;
        let mean: Vec<f64> = self.sums[range.clone()].iter().map(|s| s / n).collect();
        let std_dev = self.sq_sums[range]
            .iter()
            .zip(&mean)
            .map(|(q, m)| (q / n - m * m).max(0.0).sqrt())
            .collect();
        Some((mean, std_dev, self.dist_sums[cluster] / n))
    }
}

/// Settings for one clustering run
#[derive(Debug, Clone)]
pub struct ClusteringConfig {
    pub num_clusters: usize,
    pub max_num_iterations: usize,
    pub cluster_move_threshold: f64,
    pub min_num_vals: usize,
    pub init: InitMethod,
    pub seed: u64,
    /// Enables the ISODATA split/merge phase
    pub split_merge: Option<SplitMergeParams>,
}

impl ClusteringConfig {
    fn validate(&self) -> Result<()> {
        if self.num_clusters == 0 {
            return Err(Error::invalid("num_clusters", 0, "must be at least 1"));
        }
        if self.max_num_iterations == 0 {
            return Err(Error::invalid("max_num_iterations", 0, "must be at least 1"));
        }
        if self.cluster_move_threshold.is_nan() || self.cluster_move_threshold < 0.0 {
            return Err(Error::invalid(
                "cluster_move_threshold",
                self.cluster_move_threshold,
                "must be a non-negative distance",
            ));
        }
        if let Some(sm) = &self.split_merge {
            sm.validate(self.num_clusters)?;
        }
        Ok(())
    }
}

/// Result of a clustering run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringOutcome {
    pub clusters: Vec<Cluster>,
    pub termination: Termination,
    /// Assigning passes run
    pub passes: usize,
    pub splits: usize,
    pub merges: usize,
}

impl ClusteringOutcome {
    pub fn centroids(&self) -> Vec<&[f64]> {
        self.clusters.iter().map(|c| c.centroid.as_slice()).collect()
    }

    /// Terminal labeling pass: nearest-centroid labels (1-based) for every
    /// valid pixel, plus a centroid table with counts from this pass
    pub fn label(&self, engine: &TraversalEngine, input: &Raster) -> Result<(Raster, CentroidTable)> {
        let classifier = NearestNeighbour::from_centroids(&self.centroids())?;
        let pointwise = engine.clone().with_traversal(Traversal::Pointwise);
        let labels = pointwise.run(&classifier, input)?;

        let mut counts = vec![0usize; self.clusters.len()];
        for &v in labels.values() {
            if v.is_finite() && v >= 1.0 {
                if let Some(c) = counts.get_mut(v as usize - 1) {
                    *c += 1;
                }
            }
        }
        let table = CentroidTable::new(self.termination, &self.clusters, &counts);
        Ok((labels, table))
    }
}

/// Drives the clustering state machine over a traversal engine
#[derive(Debug, Clone, Default)]
pub struct Clusterer {
    engine: TraversalEngine,
    cancel: CancelToken,
}

struct Update {
    clusters: Vec<Cluster>,
    discarded: usize,
    movement: f64,
}

impl Clusterer {
    pub fn new(engine: TraversalEngine) -> Self {
        Self {
            engine,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn engine(&self) -> &TraversalEngine {
        &self.engine
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run(&self, input: &Raster, config: &ClusteringConfig) -> Result<ClusteringOutcome> {
        config.validate()?;
        let bands = input.bands();

        debug!(phase = ?Phase::Initializing, k = config.num_clusters, init = ?config.init);
        let pixels = valid_pixels(input);
        let valid = pixels.len();
        let mut centroids = initial_centroids(&pixels, config.num_clusters, config.init, config.seed)?;
        drop(pixels);

        let mut passes: usize = 0;
        let mut splits: usize = 0;
        let mut merges: usize = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            debug!(phase = ?Phase::Assigning, pass = passes + 1, clusters = centroids.len());
            let flat: Vec<f64> = centroids.iter().flatten().copied().collect();
            let acc = self.assign(input, &flat, bands)?;
            passes += 1;
            if acc.total() != valid {
                return Err(Error::IterationFault(format!(
                    "pass {passes} assigned {} of {valid} valid pixels",
                    acc.total()
                )));
            }

            let update = Self::update(&acc, &centroids, config.min_num_vals);
            if update.clusters.is_empty() {
                return Err(Error::IterationFault(format!(
                    "no cluster kept at least {} pixels after pass {passes}",
                    config.min_num_vals
                )));
            }
            debug!(
                phase = ?Phase::Updating,
                pass = passes,
                clusters = update.clusters.len(),
                discarded = update.discarded,
                movement = update.movement,
            );

            let step = config.split_merge.as_ref().map(|params| {
                let step = split_merge(update.clusters.clone(), params, config.min_num_vals);
                debug!(
                    phase = ?Phase::SplitMerge,
                    pass = passes,
                    splits = step.splits,
                    merges = step.merges,
                );
                step
            });
            let reshaped = step.as_ref().is_some_and(|s| s.splits + s.merges > 0);

            let termination =
                if update.discarded == 0 && !reshaped && update.movement < config.cluster_move_threshold {
                    Some(Termination::Converged {
                        iterations: passes.saturating_sub(1).max(1),
                    })
                } else if passes >= config.max_num_iterations {
                    Some(Termination::MaxIterations { iterations: passes })
                } else {
                    None
                };

            if let Some(termination) = termination {
                let mut clusters = update.clusters;
                for (i, cluster) in clusters.iter_mut().enumerate() {
                    cluster.id = i + 1;
                }
                let phase = if termination.is_converged() { Phase::Converged } else { Phase::Terminated };
                info!(
                    phase = ?phase,
                    iterations = termination.iterations(),
                    clusters = clusters.len(),
                    splits,
                    merges,
                    "clustering finished"
                );
                return Ok(ClusteringOutcome {
                    clusters,
                    termination,
                    passes,
                    splits,
                    merges,
                });
            }

            match step {
                Some(step) => {
                    splits += step.splits;
                    merges += step.merges;
                    centroids = step.centroids;
                }
                None => {
                    centroids = update.clusters.into_iter().map(|c| c.centroid).collect();
                }
            }
        }
    }

    /// Assigning phase: one pass of block-local accumulation, reduced in block order
    fn assign(&self, input: &Raster, centroids: &[f64], bands: usize) -> Result<Accumulators> {
        let k = centroids.len() / bands;
        let partials = self.engine.map_blocks(input.rows(), input.cols(), |block| {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let mut acc = Accumulators::new(k, bands);
            for (row, col) in block.positions() {
                let pixel = input.pixel_at(row, col);
                if !input.is_valid_pixel(pixel) {
                    continue;
                }
                if let Some((cluster, d)) = nearest(pixel, centroids, bands, DistanceMetric::Euclidean) {
                    acc.add(cluster, pixel, d);
                }
            }
            Ok(acc)
        })?;

        let mut total = Accumulators::new(k, bands);
        for partial in &partials {
            total.merge(partial);
        }
        Ok(total)
    }

    /// Updating phase: new means, discarding under-populated clusters
    fn update(acc: &Accumulators, old: &[Vec<f64>], min_num_vals: usize) -> Update {
        let mut clusters = Vec::with_capacity(old.len());
        let mut discarded = 0;
        let mut movement = 0.0_f64;

        for (id, previous) in old.iter().enumerate() {
            if acc.count(id) < min_num_vals {
                discarded += 1;
                continue;
            }
            let Some((centroid, std_dev, mean_distance)) = acc.statistics(id) else {
                discarded += 1;
                continue;
            };
            movement = movement.max(euclidean(previous, &centroid));
            clusters.push(Cluster {
                id,
                centroid,
                count: acc.count(id),
                std_dev,
                mean_distance,
            });
        }

        Update {
            clusters,
            discarded,
            movement,
        }
    }
}
