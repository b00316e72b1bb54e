//! Multi-band raster type

use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use ndarray::{s, Array2, ArrayView3};

/// A georeferenced multi-band raster.
///
/// Values are stored pixel-interleaved in one contiguous buffer of
/// `rows × cols × bands` `f64`s, so the spectral vector of a pixel is a
/// plain slice. The buffer is sized once at construction and never resized.
///
/// # Example
///
/// ```ignore
/// use specmap_core::Raster;
///
/// let mut raster = Raster::new(100, 100, 4)?;
/// raster.set(10, 20, 2, 0.35)?;
/// let spectrum: &[f64] = raster.pixel(10, 20)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
    bands: usize,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl Raster {
    /// Create a raster filled with zeros
    pub fn new(rows: usize, cols: usize, bands: usize) -> Result<Self> {
        Self::filled(rows, cols, bands, 0.0)
    }

    /// Create a raster filled with a specific value.
    ///
    /// At least one band is required.
    pub fn filled(rows: usize, cols: usize, bands: usize, value: f64) -> Result<Self> {
        Self::from_vec(vec![value; rows * cols * bands], rows, cols, bands)
    }

    /// Create a raster from pixel-interleaved values
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize, bands: usize) -> Result<Self> {
        if bands == 0 || data.len() != rows * cols * bands {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self {
            data,
            rows,
            cols,
            bands,
            transform: GeoTransform::default(),
            nodata: None,
        })
    }

    /// Interleave a set of equally-shaped single bands into one raster
    pub fn from_bands(bands: &[Array2<f64>]) -> Result<Self> {
        let first = bands.first().ok_or(Error::InvalidDimensions {
            width: 0,
            height: 0,
        })?;
        let (rows, cols) = first.dim();
        for band in &bands[1..] {
            let (ar, ac) = band.dim();
            if (ar, ac) != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar,
                    ac,
                });
            }
        }

        let mut data = Vec::with_capacity(rows * cols * bands.len());
        for r in 0..rows {
            for c in 0..cols {
                data.extend(bands.iter().map(|band| band[(r, c)]));
            }
        }
        Self::from_vec(data, rows, cols, bands.len())
    }

    /// Zero-filled raster with the same extent and transform but a new band count
    pub fn with_same_meta(&self, bands: usize) -> Result<Raster> {
        let mut out = Raster::new(self.rows, self.cols, bands)?;
        out.transform = self.transform;
        Ok(out)
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of pixels
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Data access

    fn offset(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.rows || col >= self.cols {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok((row * self.cols + col) * self.bands)
    }

    /// Spectral vector of the pixel at (row, col)
    pub fn pixel(&self, row: usize, col: usize) -> Result<&[f64]> {
        let start = self.offset(row, col)?;
        Ok(&self.data[start..start + self.bands])
    }

    /// Mutable spectral vector of the pixel at (row, col)
    pub fn pixel_mut(&mut self, row: usize, col: usize) -> Result<&mut [f64]> {
        let start = self.offset(row, col)?;
        let bands = self.bands;
        Ok(&mut self.data[start..start + bands])
    }

    /// Spectral vector at (row, col) for callers that already iterate in bounds.
    ///
    /// # Panics
    /// If the position lies outside the raster.
    pub fn pixel_at(&self, row: usize, col: usize) -> &[f64] {
        let start = (row * self.cols + col) * self.bands;
        &self.data[start..start + self.bands]
    }

    /// Value of one band at (row, col)
    pub fn get(&self, row: usize, col: usize, band: usize) -> Result<f64> {
        self.pixel(row, col)?
            .get(band)
            .copied()
            .ok_or(Error::BandCountMismatch {
                expected: band + 1,
                actual: self.bands,
            })
    }

    /// Set one band at (row, col)
    pub fn set(&mut self, row: usize, col: usize, band: usize, value: f64) -> Result<()> {
        let bands = self.bands;
        let slot = self
            .pixel_mut(row, col)?
            .get_mut(band)
            .ok_or(Error::BandCountMismatch {
                expected: band + 1,
                actual: bands,
            })?;
        *slot = value;
        Ok(())
    }

    /// Copy a single band out as a 2D array
    pub fn band(&self, band: usize) -> Result<Array2<f64>> {
        if band >= self.bands {
            return Err(Error::BandCountMismatch {
                expected: band + 1,
                actual: self.bands,
            });
        }
        Ok(Array2::from_shape_fn((self.rows, self.cols), |(r, c)| {
            self.data[(r * self.cols + c) * self.bands + band]
        }))
    }

    /// Iterate pixel spectra in row-major order
    pub fn pixels(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.bands)
    }

    /// Pixel-interleaved values
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Mutable pixel-interleaved values
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Square `size × size × bands` window centred on (row, col).
    ///
    /// Returns `None` when the window would extend past the raster edge.
    pub fn window(&self, row: usize, col: usize, size: usize) -> Option<ArrayView3<'_, f64>> {
        let radius = size / 2;
        if row < radius
            || col < radius
            || row + radius >= self.rows
            || col + radius >= self.cols
        {
            return None;
        }
        let full = ArrayView3::from_shape((self.rows, self.cols, self.bands), &self.data).ok()?;
        Some(full.slice_move(s![
            row - radius..=row + radius,
            col - radius..=col + radius,
            ..
        ]))
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Whether a single value is NaN or equal to the no-data value
    pub fn is_nodata(&self, value: f64) -> bool {
        if value.is_nan() {
            return true;
        }
        match self.nodata {
            Some(nd) => (value - nd).abs() < f64::EPSILON * 100.0,
            None => false,
        }
    }

    /// A pixel is valid only if every band holds data
    pub fn is_valid_pixel(&self, spectrum: &[f64]) -> bool {
        !spectrum.iter().any(|&v| self.is_nodata(v))
    }

    /// Number of pixels with data in every band
    pub fn valid_count(&self) -> usize {
        self.pixels().filter(|p| self.is_valid_pixel(p)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_raster_creation() {
        let raster = Raster::new(100, 200, 3).unwrap();
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.bands(), 3);
        assert_eq!(raster.values().len(), 60_000);
    }

    #[test]
    fn test_zero_bands_rejected() {
        assert!(matches!(Raster::new(3, 3, 0), Err(Error::InvalidDimensions { .. })));
        assert!(Raster::filled(3, 3, 0, 1.0).is_err());
        let raster = Raster::new(3, 3, 2).unwrap();
        assert!(raster.with_same_meta(0).is_err());
    }

    #[test]
    fn test_raster_access() {
        let mut raster = Raster::new(10, 10, 4).unwrap();
        raster.set(5, 5, 2, 42.0).unwrap();
        assert_eq!(raster.get(5, 5, 2).unwrap(), 42.0);
        assert_eq!(raster.pixel(5, 5).unwrap(), &[0.0, 0.0, 42.0, 0.0]);
        assert!(raster.get(10, 0, 0).is_err());
        assert!(raster.get(0, 0, 4).is_err());
    }

    #[test]
    fn test_from_bands_interleaves() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[10.0, 20.0], [30.0, 40.0]];
        let raster = Raster::from_bands(&[a.clone(), b]).unwrap();
        assert_eq!(raster.pixel(1, 0).unwrap(), &[3.0, 30.0]);
        assert_eq!(raster.band(0).unwrap(), a);
    }

    #[test]
    fn test_from_bands_shape_mismatch() {
        let a = Array2::<f64>::zeros((2, 2));
        let b = Array2::<f64>::zeros((3, 2));
        assert!(matches!(
            Raster::from_bands(&[a, b]),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_window() {
        let data: Vec<f64> = (0..25).map(|v| v as f64).collect();
        let raster = Raster::from_vec(data, 5, 5, 1).unwrap();
        let w = raster.window(2, 2, 3).unwrap();
        assert_eq!(w.dim(), (3, 3, 1));
        assert_eq!(w[(0, 0, 0)], 6.0);
        assert_eq!(w[(1, 1, 0)], 12.0);
        assert!(raster.window(0, 2, 3).is_none());
        assert!(raster.window(2, 4, 3).is_none());
    }

    #[test]
    fn test_nodata_pixels() {
        let mut raster = Raster::from_vec(vec![1.0, 2.0, -9999.0, 4.0, f64::NAN, 6.0], 1, 3, 2).unwrap();
        raster.set_nodata(Some(-9999.0));
        assert_eq!(raster.valid_count(), 1);
    }
}
