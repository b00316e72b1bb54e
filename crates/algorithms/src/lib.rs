//! # SpecMap Algorithms
//!
//! Spectral classification for multi-band rasters.
//!
//! ## Available Algorithm Categories
//!
//! - **classification**: SAM, SCM, cumulative area, nearest neighbour,
//!   rule thresholds, K-means and ISODATA clustering

pub mod classification;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        isodata, isodata_raster, kmeans, kmeans_raster, spectral_library_from_training,
        CancelToken, CentroidTable, Chained, Clusterer, ClusteringOutcome, CumulativeArea,
        DistanceMetric, InitMethod, IsodataParams, KmeansParams, NearestNeighbour,
        RuleClassifier, SpectralAngleMapper, SpectralCorrelationMapper, Termination,
        TrainingClass,
    };
    pub use specmap_core::prelude::*;
    pub use specmap_parallel::{ProcessingMode, TraversalEngine};
}
