//! Spectral classification algorithms
//!
//! Supervised matchers, each a [`ClassificationStrategy`](specmap_core::ClassificationStrategy)
//! driven by the traversal engine:
//! - **SAM**: Spectral Angle Mapper (rule image of angles)
//! - **SCM**: Spectral Correlation Mapper (rule image of normalised correlations)
//! - **Cumulative area**: area between normalised cumulative spectra
//! - **Nearest neighbour**: minimum distance to class means or 1-NN over samples
//! - **Rule classifier**: thresholded winner-takes-all over a rule image
//!
//! Unsupervised clustering on the same engine:
//! - **K-means**: fixed number of clusters
//! - **ISODATA**: K-means with split/merge between passes

mod centroids;
mod clustering;
mod cumulative_area;
pub mod distance;
mod init;
mod isodata;
mod kmeans;
mod nearest_neighbour;
mod rule;
mod spectral_angle;
mod spectral_correlation;
mod training;

pub use centroids::{CentroidRow, CentroidTable};
pub use clustering::{
    CancelToken, Cluster, Clusterer, ClusteringConfig, ClusteringOutcome, Phase, Termination,
};
pub use cumulative_area::CumulativeArea;
pub use distance::DistanceMetric;
pub use init::{initial_centroids, InitMethod};
pub use isodata::{isodata, isodata_raster, split_merge, IsodataParams, SplitMergeParams, SplitMergeStep};
pub use kmeans::{kmeans, kmeans_raster, KmeansParams};
pub use nearest_neighbour::{NearestNeighbour, TrainingClass};
pub use rule::{Chained, RuleClassifier, RuleSelection, UNCLASSIFIED};
pub use spectral_angle::{SpectralAngleMapper, DEGENERATE_ANGLE};
pub use spectral_correlation::{normalise_correlation, SpectralCorrelationMapper, DEGENERATE_CORRELATION};
pub use training::{spectral_library_from_training, training_classes};
