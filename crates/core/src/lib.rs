//! # SpecMap Core
//!
//! Core types for the SpecMap spectral classification engine.
//!
//! This crate provides:
//! - `Raster`: pixel-interleaved multi-band raster
//! - `SpectralVector` / `ReferenceSpectra`: spectral value objects
//! - `ClassificationStrategy`: the per-pixel strategy capability trait
//! - I/O for GeoTIFF band stacks and JSON spectral libraries

pub mod error;
pub mod io;
pub mod raster;
pub mod spectral;
pub mod strategy;

pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster};
pub use spectral::{ReferenceSpectra, SpectralLibrary, SpectralVector};
pub use strategy::{Capabilities, ClassificationStrategy, PixelInput, Traversal};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster};
    pub use crate::spectral::{ReferenceSpectra, SpectralVector};
    pub use crate::strategy::{Capabilities, ClassificationStrategy, PixelInput, Traversal};
}
