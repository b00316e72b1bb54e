//! Raster I/O adapter
//!
//! Minimal GeoTIFF reading/writing so band stacks can be fed to the
//! classification engine. Only the pixel grid and a north-up transform are
//! carried; no CRS, compression or tiling support.

#[cfg(feature = "native")]
mod native;

#[cfg(feature = "native")]
pub use native::{
    read_band_stack, read_band_stack_from_buffer, read_raster_bands, write_band_stack,
    write_band_stack_to_buffer,
};
