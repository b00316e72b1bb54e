//! Spectral value objects: pixel spectra, reference spectra and libraries

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::ops::Deref;
use std::path::Path;

/// Ordered per-band values of one pixel or one reference signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpectralVector(Vec<f64>);

impl SpectralVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl Deref for SpectralVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for SpectralVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<&[f64]> for SpectralVector {
    fn from(values: &[f64]) -> Self {
        Self(values.to_vec())
    }
}

/// Named reference spectra, one per target class.
///
/// Spectra live in a single `classes × bands` buffer sized at construction
/// and are immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSpectra {
    names: Vec<String>,
    values: Vec<f64>,
    bands: usize,
}

impl ReferenceSpectra {
    /// Build from `(name, spectrum)` pairs.
    ///
    /// All spectra must be non-empty, finite and share one band count.
    pub fn new<N, V>(entries: impl IntoIterator<Item = (N, V)>) -> Result<Self>
    where
        N: Into<String>,
        V: Into<SpectralVector>,
    {
        let mut names = Vec::new();
        let mut values = Vec::new();
        let mut bands = None;

        for (name, spectrum) in entries {
            let spectrum: SpectralVector = spectrum.into();
            let name = name.into();
            let expected = *bands.get_or_insert(spectrum.len());
            if spectrum.is_empty() {
                return Err(Error::invalid("spectrum", &name, "reference spectrum has no bands"));
            }
            if spectrum.len() != expected {
                return Err(Error::BandCountMismatch {
                    expected,
                    actual: spectrum.len(),
                });
            }
            if spectrum.iter().any(|v| !v.is_finite()) {
                return Err(Error::invalid("spectrum", &name, "reference spectrum must be finite"));
            }
            values.extend_from_slice(&spectrum);
            names.push(name);
        }

        let bands = bands.ok_or_else(|| {
            Error::invalid("reference_spectra", 0, "at least one reference spectrum is required")
        })?;

        Ok(Self {
            names,
            values,
            bands,
        })
    }

    /// Unnamed spectra labelled `class_1`, `class_2`, ...
    pub fn from_spectra(spectra: impl IntoIterator<Item = Vec<f64>>) -> Result<Self> {
        Self::new(
            spectra
                .into_iter()
                .enumerate()
                .map(|(i, s)| (format!("class_{}", i + 1), s)),
        )
    }

    /// Number of reference classes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Band count shared by every spectrum
    pub fn num_bands(&self) -> usize {
        self.bands
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Spectrum of class `index`, or `None` past the last class
    pub fn get(&self, index: usize) -> Option<&[f64]> {
        let start = index.checked_mul(self.bands)?;
        self.values.get(start..start + self.bands)
    }

    /// Iterate spectra in class order
    pub fn spectra(&self) -> std::slice::ChunksExact<'_, f64> {
        self.values.chunks_exact(self.bands)
    }

    /// Iterate `(name, spectrum)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names.iter().map(String::as_str).zip(self.spectra())
    }
}

/// One entry of a spectral library file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    pub spectrum: SpectralVector,
}

/// On-disk spectral library.
///
/// ```json
/// { "classes": [ { "name": "water", "spectrum": [0.05, 0.04, 0.02, 0.01] } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectralLibrary {
    pub classes: Vec<LibraryEntry>,
}

impl SpectralLibrary {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.to_writer(std::io::BufWriter::new(file))
    }

    /// Validate and convert into an immutable [`ReferenceSpectra`]
    pub fn into_reference(self) -> Result<ReferenceSpectra> {
        ReferenceSpectra::new(self.classes.into_iter().map(|e| (e.name, e.spectrum)))
    }
}

impl From<&ReferenceSpectra> for SpectralLibrary {
    fn from(reference: &ReferenceSpectra) -> Self {
        Self {
            classes: reference
                .iter()
                .map(|(name, spectrum)| LibraryEntry {
                    name: name.to_string(),
                    spectrum: spectrum.into(),
                })
                .collect(),
        }
    }
}
