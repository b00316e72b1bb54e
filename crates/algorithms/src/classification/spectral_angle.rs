//! Spectral Angle Mapper (SAM)
//!
//! Scores each pixel by the angle between its spectrum and every reference
//! spectrum. Small angles mean similar spectral shape regardless of overall
//! brightness.

use super::distance::spectral_angle;
use super::rule::{Chained, RuleClassifier};
use specmap_core::{ClassificationStrategy, Error, PixelInput, ReferenceSpectra, Result};
use std::f64::consts::FRAC_PI_2;

/// Angle emitted when the pixel or a reference spectrum has zero norm
pub const DEGENERATE_ANGLE: f64 = FRAC_PI_2;

/// SAM rule strategy: one angle (radians, `[0, π]`) per reference class
#[derive(Debug, Clone)]
pub struct SpectralAngleMapper {
    reference: ReferenceSpectra,
}

impl SpectralAngleMapper {
    pub fn new(reference: ReferenceSpectra) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &ReferenceSpectra {
        &self.reference
    }

    /// SAM followed by a minimum-angle classifier in one pass.
    ///
    /// Emits the 1-based class of the smallest angle below `threshold`
    /// (radians), or 0.
    pub fn classifier(self, threshold: f64) -> Result<Chained<Self, RuleClassifier>> {
        let rule = RuleClassifier::minimum(self.reference.len(), threshold)?;
        Chained::new(self, rule)
    }
}

impl ClassificationStrategy for SpectralAngleMapper {
    fn name(&self) -> &'static str {
        "spectral-angle-mapper"
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
            *out = spectral_angle(pixel, reference).unwrap_or(DEGENERATE_ANGLE);
        }
        Ok(())
    }
}
