//! Centroid table export

use super::clustering::{Cluster, Termination};
use serde::{Deserialize, Serialize};
use specmap_core::Result;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// One row per output label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidRow {
    /// Label written to the classified raster
    pub label: usize,
    /// Pixels given this label by the labeling pass
    pub count: usize,
    pub centroid: Vec<f64>,
}

/// Final centroids of a clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidTable {
    pub termination: Termination,
    pub clusters: Vec<CentroidRow>,
}

impl CentroidTable {
    /// Pair clusters with the per-label counts of a labeling pass
    pub fn new(termination: Termination, clusters: &[Cluster], counts: &[usize]) -> Self {
        let clusters = clusters
            .iter()
            .enumerate()
            .map(|(i, c)| CentroidRow {
                label: i + 1,
                count: counts.get(i).copied().unwrap_or(0),
                centroid: c.centroid.clone(),
            })
            .collect();
        Self {
            termination,
            clusters,
        }
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}
