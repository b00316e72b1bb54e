//! Rule-image classifiers and strategy chaining
//!
//! Rule strategies (SAM, SCM, cumulative area) emit one score per reference
//! class. A [`RuleClassifier`] turns such a score vector into a single class
//! label, either as a second pass over a rule image or chained directly
//! behind the rule strategy with [`Chained`].

use specmap_core::{Capabilities, ClassificationStrategy, Error, PixelInput, Result};

/// Output value for pixels that match no class
pub const UNCLASSIFIED: f64 = 0.0;

/// Which end of the rule scale indicates a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSelection {
    /// Smallest score wins; it must be strictly below the threshold
    Minimum,
    /// Largest score wins; it must be strictly above the threshold
    Maximum,
}

/// Thresholded winner-takes-all over a rule vector.
///
/// Emits the 1-based index of the winning rule, or [`UNCLASSIFIED`].
/// Ties go to the lowest index; NaN scores never win.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    num_rules: usize,
    selection: RuleSelection,
    threshold: f64,
}

impl RuleClassifier {
    pub fn new(num_rules: usize, selection: RuleSelection, threshold: f64) -> Result<Self> {
        if num_rules == 0 {
            return Err(Error::invalid("num_rules", 0, "at least one rule band is required"));
        }
        if threshold.is_nan() {
            return Err(Error::invalid("threshold", threshold, "threshold must be a number"));
        }
        Ok(Self {
            num_rules,
            selection,
            threshold,
        })
    }

    /// Minimum score below `threshold` (angles, areas, distances)
    pub fn minimum(num_rules: usize, threshold: f64) -> Result<Self> {
        Self::new(num_rules, RuleSelection::Minimum, threshold)
    }

    /// Maximum score above `threshold` (correlations)
    pub fn maximum(num_rules: usize, threshold: f64) -> Result<Self> {
        Self::new(num_rules, RuleSelection::Maximum, threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn selection(&self) -> RuleSelection {
        self.selection
    }

    /// 0-based index of the winning rule, if any passes the threshold
    pub fn select(&self, rules: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &score) in rules.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            let better = match (best, self.selection) {
                (None, _) => true,
                (Some((_, b)), RuleSelection::Minimum) => score < b,
                (Some((_, b)), RuleSelection::Maximum) => score > b,
            };
            if better {
                best = Some((i, score));
            }
        }

        best.filter(|&(_, score)| match self.selection {
            RuleSelection::Minimum => score < self.threshold,
            RuleSelection::Maximum => score > self.threshold,
        })
        .map(|(i, _)| i)
    }
}

impl ClassificationStrategy for RuleClassifier {
    fn name(&self) -> &'static str {
        "rule-classifier"
    }

    fn num_in_bands(&self) -> usize {
        self.num_rules
    }

    fn num_out_bands(&self) -> usize {
        1
    }

    fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
        let rules = input.pixel(self.name())?;
        output[0] = self
            .select(rules)
            .map_or(UNCLASSIFIED, |i| (i + 1) as f64);
        Ok(())
    }
}

/// Two strategies evaluated back to back on the same pixel.
///
/// The first strategy's output becomes the second strategy's pointwise input.
#[derive(Debug, Clone)]
pub struct Chained<A, B> {
    first: A,
    second: B,
}

/// Rule vectors up to this length are chained without a heap allocation
const INLINE_RULES: usize = 32;

impl<A, B> Chained<A, B>
where
    A: ClassificationStrategy,
    B: ClassificationStrategy,
{
    pub fn new(first: A, second: B) -> Result<Self> {
        if first.num_out_bands() != second.num_in_bands() {
            return Err(Error::BandCountMismatch {
                expected: second.num_in_bands(),
                actual: first.num_out_bands(),
            });
        }
        if !second.capabilities().pointwise {
            return Err(Error::UnsupportedTraversal {
                strategy: second.name(),
                traversal: "pointwise".to_string(),
            });
        }
        Ok(Self { first, second })
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }
}

impl<A, B> ClassificationStrategy for Chained<A, B>
where
    A: ClassificationStrategy,
    B: ClassificationStrategy,
{
    fn name(&self) -> &'static str {
        self.second.name()
    }

    fn num_in_bands(&self) -> usize {
        self.first.num_in_bands()
    }

    fn num_out_bands(&self) -> usize {
        self.second.num_out_bands()
    }

    fn capabilities(&self) -> Capabilities {
        self.first.capabilities()
    }

    fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
        let n = self.first.num_out_bands();
        let mut inline = [0.0; INLINE_RULES];
        let mut heap = Vec::new();
        let scratch: &mut [f64] = if n <= INLINE_RULES {
            &mut inline[..n]
        } else {
            heap.resize(n, 0.0);
            heap.as_mut_slice()
        };

        self.first.evaluate(input, scratch)?;
        self.second.evaluate(PixelInput::Pixel(scratch), output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_selection() {
        let c = RuleClassifier::minimum(3, 0.5).unwrap();
        assert_eq!(c.select(&[0.4, 0.1, 0.3]), Some(1));
        assert_eq!(c.select(&[0.6, 0.5, 0.9]), None);
        assert_eq!(c.select(&[0.2, 0.2, 0.9]), Some(0));
        assert_eq!(c.select(&[f64::NAN, 0.3, 0.9]), Some(1));
    }

    #[test]
    fn test_maximum_selection() {
        let c = RuleClassifier::maximum(3, 0.8).unwrap();
        assert_eq!(c.select(&[0.85, 0.95, 0.1]), Some(1));
        assert_eq!(c.select(&[0.8, 0.7, 0.1]), None);
    }

    #[test]
    fn test_rule_classifier_output_is_one_based() {
        let c = RuleClassifier::minimum(2, 1.0).unwrap();
        let mut out = [f64::NAN];
        c.evaluate(PixelInput::Pixel(&[0.7, 0.2]), &mut out).unwrap();
        assert_eq!(out[0], 2.0);
        c.evaluate(PixelInput::Pixel(&[1.7, 1.2]), &mut out).unwrap();
        assert_eq!(out[0], UNCLASSIFIED);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(RuleClassifier::minimum(0, 0.5).is_err());
        assert!(RuleClassifier::maximum(2, f64::NAN).is_err());
    }

    #[test]
    fn test_chain_band_mismatch() {
        let first = RuleClassifier::minimum(4, 0.5).unwrap();
        let second = RuleClassifier::minimum(2, 0.5).unwrap();
        assert!(matches!(
            Chained::new(first, second),
            Err(Error::BandCountMismatch { expected: 2, actual: 1 })
        ));
    }
}
