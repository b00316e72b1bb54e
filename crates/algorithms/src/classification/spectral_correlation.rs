//! Spectral Correlation Mapper (SCM)
//!
//! Pearson correlation between the pixel spectrum and each reference,
//! rescaled from `[-1, 1]` to `[0, 1]` with `(r + 1) / 2`. Perfect
//! correlation maps to 1, perfect anti-correlation to 0.
//!
//! De Carvalho & Meneses, "Spectral correlation mapper (SCM): an improvement
//! on the spectral angle mapper (SAM)", AVIRIS Workshop 2000.

use super::distance::pearson;
use super::rule::{Chained, RuleClassifier};
use specmap_core::{ClassificationStrategy, Error, PixelInput, ReferenceSpectra, Result};

/// Normalised correlation emitted when the pixel or reference is constant
pub const DEGENERATE_CORRELATION: f64 = 0.5;

/// SCM rule strategy: one normalised correlation per reference class
#[derive(Debug, Clone)]
pub struct SpectralCorrelationMapper {
    reference: ReferenceSpectra,
}

impl SpectralCorrelationMapper {
    pub fn new(reference: ReferenceSpectra) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &ReferenceSpectra {
        &self.reference
    }

    /// SCM followed by a maximum-correlation classifier in one pass
    pub fn classifier(self, threshold: f64) -> Result<Chained<Self, RuleClassifier>> {
        let rule = RuleClassifier::maximum(self.reference.len(), threshold)?;
        Chained::new(self, rule)
    }
}

/// Map a Pearson coefficient onto `[0, 1]`
pub fn normalise_correlation(r: f64) -> f64 {
    (r + 1.0) / 2.0
}

impl ClassificationStrategy for SpectralCorrelationMapper {
    fn name(&self) -> &'static str {
        "spectral-correlation-mapper"
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
        for (out, reference) in output.iter_mut().zip(self.reference.spectra()) {
            *out = pearson(pixel, reference)
                .map_or(DEGENERATE_CORRELATION, normalise_correlation);
        }
        Ok(())
    }
}
