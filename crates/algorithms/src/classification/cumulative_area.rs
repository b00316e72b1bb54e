//! Cumulative-area spectral matching
//!
//! Integrates each spectrum over a band sub-range into a cumulative area
//! curve, normalises the curve by its total area and scores the area between
//! the pixel's curve and each reference curve. Overall brightness cancels out
//! in the normalisation, so the score compares how area is distributed
//! across the range rather than raw reflectance.

use super::rule::{Chained, RuleClassifier};
use specmap_core::{ClassificationStrategy, Error, PixelInput, ReferenceSpectra, Result};
use std::ops::Range;

/// Curves up to this many bands are built without a heap allocation
const INLINE_BANDS: usize = 64;

/// Cumulative-area rule strategy: one area difference per reference class
#[derive(Debug, Clone)]
pub struct CumulativeArea {
    reference: ReferenceSpectra,
    band_range: Range<usize>,
    widths: Vec<f64>,
    /// Normalised curve per reference; `None` for zero-area references
    curves: Vec<Option<Vec<f64>>>,
}

impl CumulativeArea {
    /// Integrate over `band_range` with unit band widths
    pub fn new(reference: ReferenceSpectra, band_range: Range<usize>) -> Result<Self> {
        if band_range.is_empty() || band_range.end > reference.num_bands() {
            return Err(Error::invalid(
                "band_range",
                format!("{}..{}", band_range.start, band_range.end),
                format!("must be a non-empty range within 0..{}", reference.num_bands()),
            ));
        }
        let widths = vec![1.0; band_range.len()];
        let mut area = Self {
            reference,
            band_range,
            widths,
            curves: Vec::new(),
        };
        area.rebuild_curves();
        Ok(area)
    }

    /// Integrate over every band
    pub fn full_range(reference: ReferenceSpectra) -> Result<Self> {
        let bands = reference.num_bands();
        Self::new(reference, 0..bands)
    }

    /// Use per-band widths (e.g. wavelength spacing) as integration weights
    pub fn with_band_widths(mut self, widths: Vec<f64>) -> Result<Self> {
        if widths.len() != self.band_range.len() {
            return Err(Error::BandCountMismatch {
                expected: self.band_range.len(),
                actual: widths.len(),
            });
        }
        if widths.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(Error::invalid("band_widths", format!("{widths:?}"), "widths must be positive"));
        }
        self.widths = widths;
        self.rebuild_curves();
        Ok(self)
    }

    /// Minimum-area-difference classifier chained behind the rule
    pub fn classifier(self, threshold: f64) -> Result<Chained<Self, RuleClassifier>> {
        let rule = RuleClassifier::minimum(self.reference.len(), threshold)?;
        Chained::new(self, rule)
    }

    pub fn band_range(&self) -> Range<usize> {
        self.band_range.clone()
    }

    /// Score emitted when either curve is undefined: the largest possible
    /// difference between two normalised non-negative curves
    pub fn degenerate_score(&self) -> f64 {
        self.widths.iter().sum()
    }

    fn rebuild_curves(&mut self) {
        let range = self.band_range.clone();
        let widths = &self.widths;
        self.curves = self
            .reference
            .spectra()
            .map(|spectrum| {
                let mut curve = vec![0.0; range.len()];
                normalised_curve(&spectrum[range.clone()], widths, &mut curve).then_some(curve)
            })
            .collect();
    }
}

/// Fill `curve` with the cumulative area of `values`, divided by the total.
///
/// Returns `false` when the total area is zero or not finite.
fn normalised_curve(values: &[f64], widths: &[f64], curve: &mut [f64]) -> bool {
    let mut acc = 0.0;
    for ((slot, v), w) in curve.iter_mut().zip(values).zip(widths) {
        acc += v * w;
        *slot = acc;
    }
    if acc == 0.0 || !acc.is_finite() {
        return false;
    }
    curve.iter_mut().for_each(|c| *c /= acc);
    true
}

impl ClassificationStrategy for CumulativeArea {
    fn name(&self) -> &'static str {
        "cumulative-area"
    }

    fn num_in_bands(&self) -> usize {
        self.reference.num_bands()
    }

    fn num_out_bands(&self) -> usize {
        self.reference.len()
    }

    fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
        let pixel = input.pixel(self.name())?;
        if pixel.len() != self.reference.num_bands() {
            return Err(Error::BandCountMismatch {
                expected: self.reference.num_bands(),
                actual: pixel.len(),
            });
        }

        let n = self.band_range.len();
        let mut inline = [0.0; INLINE_BANDS];
        let mut heap = Vec::new();
        let curve: &mut [f64] = if n <= INLINE_BANDS {
            &mut inline[..n]
        } else {
            heap.resize(n, 0.0);
            heap.as_mut_slice()
        };

        let defined = normalised_curve(&pixel[self.band_range.clone()], &self.widths, curve);
        for (out, reference) in output.iter_mut().zip(&self.curves) {
            *out = match (defined, reference) {
                (true, Some(reference)) => curve
                    .iter()
                    .zip(reference)
                    .zip(&self.widths)
                    .map(|((p, r), w)| (p - r).abs() * w)
                    .sum(),
                _ => self.degenerate_score(),
            };
        }
        Ok(())
    }
}
