//! North-up georeferencing carried alongside a band stack

use serde::{Deserialize, Serialize};

/// Affine placement of a north-up raster.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `pixel_height` is negative for north-up images. Classification never
/// reads these values; they are only carried from input to output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y, usually negative
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Build from GeoTIFF `ModelPixelScale` and `ModelTiepoint` tag values.
    ///
    /// Returns `None` when either tag is too short to describe a transform.
    pub fn from_geotiff_tags(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return None;
        }
        // tiepoint: [I, J, K, X, Y, Z]
        Some(Self::new(
            tiepoint[3] - tiepoint[0] * scale[0],
            tiepoint[4] + tiepoint[1] * scale[1],
            scale[0],
            -scale[1],
        ))
    }

    /// `ModelPixelScale` tag values
    pub fn pixel_scale(&self) -> [f64; 3] {
        [self.pixel_width, self.pixel_height.abs(), 0.0]
    }

    /// `ModelTiepoint` tag values anchoring pixel (0, 0)
    pub fn tiepoint(&self) -> [f64; 6] {
        [0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0]
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` for a raster of `cols × rows`
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let x_end = self.origin_x + cols as f64 * self.pixel_width;
        let y_end = self.origin_y + rows as f64 * self.pixel_height;
        (
            self.origin_x.min(x_end),
            self.origin_y.min(y_end),
            self.origin_x.max(x_end),
            self.origin_y.max(y_end),
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
