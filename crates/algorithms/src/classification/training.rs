//! Training signatures from labelled rasters
//!
//! Collects the spectra of an image under each integer label of a
//! single-band class raster. Label 0 and no-data are treated as unlabelled.

use super::nearest_neighbour::TrainingClass;
use specmap_core::{Error, Raster, ReferenceSpectra, Result, SpectralVector};
use std::collections::BTreeMap;

/// Group the valid pixels of `image` by the label in `classes`, ordered by label
fn collect_samples(image: &Raster, classes: &Raster) -> Result<BTreeMap<i64, Vec<SpectralVector>>> {
    if classes.bands() != 1 {
        return Err(Error::BandCountMismatch {
            expected: 1,
            actual: classes.bands(),
        });
    }
    if image.shape() != classes.shape() {
        return Err(Error::SizeMismatch {
            er: image.rows(),
            ec: image.cols(),
            ar: classes.rows(),
            ac: classes.cols(),
        });
    }

    let mut samples: BTreeMap<i64, Vec<SpectralVector>> = BTreeMap::new();
    for (spectrum, label) in image.pixels().zip(classes.values()) {
        if classes.is_nodata(*label) || !label.is_finite() || !image.is_valid_pixel(spectrum) {
            continue;
        }
        let label = label.round() as i64;
        if label == 0 {
            continue;
        }
        samples.entry(label).or_default().push(spectrum.into());
    }

    if samples.is_empty() {
        return Err(Error::invalid("classes", 0, "class raster contains no labelled pixels"));
    }
    Ok(samples)
}

/// Training classes named `class_{label}`, one per distinct label
pub fn training_classes(image: &Raster, classes: &Raster) -> Result<Vec<TrainingClass>> {
    Ok(collect_samples(image, classes)?
        .into_iter()
        .map(|(label, samples)| TrainingClass::new(format!("class_{label}"), samples))
        .collect())
}

/// Mean spectrum per label, as reference spectra for the rule strategies
pub fn spectral_library_from_training(image: &Raster, classes: &Raster) -> Result<ReferenceSpectra> {
    let means = training_classes(image, classes)?
        .into_iter()
        .filter_map(|class| Some((class.name.clone(), class.mean()?)));
    ReferenceSpectra::new(means)
}
