//! Nearest-neighbour classification
//!
//! Assigns each pixel to the training class with the closest sample under a
//! [`DistanceMetric`]. Samples are either grouped into one mean per class
//! (minimum distance to means) or kept individually (1-NN).

use super::distance::{nearest, DistanceMetric};
use super::rule::UNCLASSIFIED;
use specmap_core::{
    ClassificationStrategy, Error, PixelInput, ReferenceSpectra, Result, SpectralVector,
};

/// Training samples for one class
#[derive(Debug, Clone)]
pub struct TrainingClass {
    pub name: String,
    pub samples: Vec<SpectralVector>,
}

impl TrainingClass {
    pub fn new(name: impl Into<String>, samples: Vec<SpectralVector>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }

    /// Per-band mean of the samples; `None` for an empty class
    pub fn mean(&self) -> Option<SpectralVector> {
        let first = self.samples.first()?;
        let mut sum = vec![0.0; first.len()];
        for sample in &self.samples {
            sum.iter_mut().zip(sample.iter()).for_each(|(s, v)| *s += v);
        }
        let n = self.samples.len() as f64;
        Some(sum.into_iter().map(|s| s / n).collect::<Vec<_>>().into())
    }
}

/// Minimum-distance / 1-NN strategy.
///
/// Emits the 1-based class index of the nearest candidate, or
/// [`UNCLASSIFIED`] when that distance exceeds the optional ceiling.
#[derive(Debug, Clone)]
pub struct NearestNeighbour {
    names: Vec<String>,
    bands: usize,
    /// Candidate vectors, `bands` values each
    candidates: Vec<f64>,
    /// Class index (0-based) of each candidate
    candidate_class: Vec<usize>,
    metric: DistanceMetric,
    ceiling: Option<f64>,
}

impl NearestNeighbour {
    /// Build from training classes.
    ///
    /// With `group_samples` every class is represented by its mean;
    /// otherwise every sample is a candidate.
    pub fn new(classes: Vec<TrainingClass>, group_samples: bool) -> Result<Self> {
        if classes.is_empty() {
            return Err(Error::invalid("classes", 0, "at least one training class is required"));
        }
        let bands = classes
            .iter()
            .flat_map(|c| c.samples.first())
            .map(|s| s.len())
            .next()
            .unwrap_or(0);
        if bands == 0 {
            return Err(Error::invalid("samples", 0, "training samples must have at least one band"));
        }

        let mut names = Vec::with_capacity(classes.len());
        let mut candidates = Vec::new();
        let mut candidate_class = Vec::new();

        for (index, class) in classes.into_iter().enumerate() {
            if class.samples.is_empty() {
                return Err(Error::invalid(
                    "samples",
                    &class.name,
                    "every training class needs at least one sample",
                ));
            }
            for sample in &class.samples {
                if sample.len() != bands {
                    return Err(Error::BandCountMismatch {
                        expected: bands,
                        actual: sample.len(),
                    });
                }
            }

            if group_samples {
                if let Some(mean) = class.mean() {
                    candidates.extend_from_slice(&mean);
                    candidate_class.push(index);
                }
            } else {
                for sample in &class.samples {
                    candidates.extend_from_slice(sample);
                    candidate_class.push(index);
                }
            }
            names.push(class.name);
        }

        Ok(Self {
            names,
            bands,
            candidates,
            candidate_class,
            metric: DistanceMetric::default(),
            ceiling: None,
        })
    }

    /// One candidate per reference spectrum
    pub fn from_reference(reference: &ReferenceSpectra) -> Self {
        Self {
            names: reference.names().to_vec(),
            bands: reference.num_bands(),
            candidates: reference.spectra().flatten().copied().collect(),
            candidate_class: (0..reference.len()).collect(),
            metric: DistanceMetric::default(),
            ceiling: None,
        }
    }

    /// One candidate per centroid; class names are `cluster_{n}`
    pub fn from_centroids<C>(centroids: &[C]) -> Result<Self>
    where
        C: AsRef<[f64]>,
    {
        let reference = ReferenceSpectra::new(
            centroids
                .iter()
                .enumerate()
                .map(|(i, c)| (format!("cluster_{}", i + 1), c.as_ref().to_vec())),
        )?;
        Ok(Self::from_reference(&reference))
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Pixels farther than `ceiling` from every candidate stay unclassified
    pub fn with_ceiling(mut self, ceiling: Option<f64>) -> Result<Self> {
        if let Some(c) = ceiling {
            if c.is_nan() || c < 0.0 {
                return Err(Error::invalid("ceiling", c, "must be a non-negative distance"));
            }
        }
        self.ceiling = ceiling;
        Ok(self)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// 0-based class index and distance of the nearest candidate
    pub fn nearest(&self, pixel: &[f64]) -> Option<(usize, f64)> {
        nearest(pixel, &self.candidates, self.bands, self.metric)
            .map(|(i, d)| (self.candidate_class[i], d))
    }
}

impl ClassificationStrategy for NearestNeighbour {
    fn name(&self) -> &'static str {
        "nearest-neighbour"
    }

    fn num_in_bands(&self) -> usize {
        self.bands
    }

    fn num_out_bands(&self) -> usize {
        1
    }

    fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
        let pixel = input.pixel(self.name())?;
        if pixel.len() != self.bands {
            return Err(Error::BandCountMismatch {
                expected: self.bands,
                actual: pixel.len(),
            });
        }
        output[0] = match self.nearest(pixel) {
            Some((_, d)) if self.ceiling.is_some_and(|c| d > c) => UNCLASSIFIED,
            Some((class, _)) => (class + 1) as f64,
            None => UNCLASSIFIED,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<TrainingClass> {
        vec![
            TrainingClass::new(
                "water",
                vec![vec![0.0, 0.0].into(), vec![0.0, 10.0].into()],
            ),
            TrainingClass::new("soil", vec![vec![6.0, 5.0].into()]),
        ]
    }

    fn label(nn: &NearestNeighbour, pixel: &[f64]) -> f64 {
        let mut out = [f64::NAN];
        nn.evaluate(PixelInput::Pixel(pixel), &mut out).unwrap();
        out[0]
    }

    #[test]
    fn test_grouped_uses_class_means() {
        // water mean is (0, 5), closer to (2, 5) than soil
        let nn = NearestNeighbour::new(classes(), true).unwrap();
        assert_eq!(label(&nn, &[2.0, 5.0]), 1.0);
        assert_eq!(label(&nn, &[5.0, 5.0]), 2.0);
    }

    #[test]
    fn test_ungrouped_is_one_nn() {
        // (0, 9) sits next to a water sample but far from the water mean
        let grouped = NearestNeighbour::new(classes(), true).unwrap();
        let ungrouped = NearestNeighbour::new(classes(), false).unwrap();
        assert_eq!(label(&ungrouped, &[3.5, 9.0]), 1.0);
        assert_eq!(label(&grouped, &[3.5, 9.0]), 2.0);
    }

    #[test]
    fn test_ceiling() {
        let nn = NearestNeighbour::new(classes(), true)
            .unwrap()
            .with_ceiling(Some(1.0))
            .unwrap();
        assert_eq!(label(&nn, &[6.5, 5.0]), 2.0);
        assert_eq!(label(&nn, &[20.0, 20.0]), UNCLASSIFIED);
        assert!(nn.clone().with_ceiling(Some(-1.0)).is_err());
    }

    #[test]
    fn test_metric_changes_winner() {
        let reference =
            ReferenceSpectra::from_spectra([vec![3.0, 3.0], vec![0.0, 4.5]]).unwrap();
        let euclid = NearestNeighbour::from_reference(&reference);
        let cheb = NearestNeighbour::from_reference(&reference).with_metric(DistanceMetric::Chebyshev);
        // Euclidean: 4.24 vs 4.5; Chebyshev: 3.0 vs 4.5 both pick 1
        assert_eq!(label(&euclid, &[0.0, 0.0]), 1.0);
        assert_eq!(label(&cheb, &[0.0, 0.0]), 1.0);
        let manhattan = NearestNeighbour::from_reference(&reference).with_metric(DistanceMetric::Manhattan);
        // Manhattan: 6.0 vs 4.5
        assert_eq!(label(&manhattan, &[0.0, 0.0]), 2.0);
    }

    #[test]
    fn test_from_centroids() {
        let nn = NearestNeighbour::from_centroids(&[vec![0.0], vec![10.0]]).unwrap();
        assert_eq!(nn.names(), &["cluster_1".to_string(), "cluster_2".to_string()]);
        assert_eq!(label(&nn, &[4.0]), 1.0);
        assert_eq!(label(&nn, &[6.0]), 2.0);
        // Equidistant: lowest index wins
        assert_eq!(label(&nn, &[5.0]), 1.0);
    }

    #[test]
    fn test_invalid_training() {
        assert!(NearestNeighbour::new(vec![], true).is_err());
        let ragged = vec![
            TrainingClass::new("a", vec![vec![1.0, 2.0].into()]),
            TrainingClass::new("b", vec![vec![1.0].into()]),
        ];
        assert!(matches!(
            NearestNeighbour::new(ragged, false),
            Err(Error::BandCountMismatch { expected: 2, actual: 1 })
        ));
        let empty = vec![
            TrainingClass::new("a", vec![vec![1.0].into()]),
            TrainingClass::new("b", vec![]),
        ];
        assert!(NearestNeighbour::new(empty, true).is_err());
    }
}
