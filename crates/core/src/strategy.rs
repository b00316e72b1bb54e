//! Classification strategy capability interface
//!
//! A strategy turns one pixel's spectral input into a fixed-length output
//! vector (rule scores or a class label). Strategies are configured once and
//! hold no per-invocation state, so one instance is shared by every worker.

use crate::error::{Error, Result};
use ndarray::{s, ArrayView3};
use std::fmt;

/// Shape of the input the traversal engine hands to a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// A single pixel's band vector
    Pointwise,
    /// A square `size × size` neighbourhood centred on the pixel.
    ///
    /// Only the centre pixel is checked against no-data; neighbours are
    /// passed through unchanged and may hold NaN or the no-data value.
    Windowed { size: usize },
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Traversal::Pointwise => write!(f, "pointwise"),
            Traversal::Windowed { size } => write!(f, "windowed ({size}x{size})"),
        }
    }
}

/// Traversal shapes a strategy accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub pointwise: bool,
    pub windowed: bool,
}

impl Capabilities {
    pub const POINTWISE: Self = Self {
        pointwise: true,
        windowed: false,
    };
    pub const WINDOWED: Self = Self {
        pointwise: false,
        windowed: true,
    };
    pub const ALL: Self = Self {
        pointwise: true,
        windowed: true,
    };

    pub fn supports(&self, traversal: Traversal) -> bool {
        match traversal {
            Traversal::Pointwise => self.pointwise,
            Traversal::Windowed { .. } => self.windowed,
        }
    }
}

/// Input for one strategy invocation
#[derive(Debug, Clone, Copy)]
pub enum PixelInput<'a> {
    /// Band vector of one pixel
    Pixel(&'a [f64]),
    /// `(size, size, bands)` view centred on the pixel, neighbours unmasked
    Window(ArrayView3<'a, f64>),
}

impl<'a> PixelInput<'a> {
    /// The pixel's own band vector, whatever the traversal shape
    pub fn centre(&self) -> Option<&'a [f64]> {
        match *self {
            PixelInput::Pixel(values) => Some(values),
            PixelInput::Window(window) => {
                let (rows, cols, _) = window.dim();
                window.slice_move(s![rows / 2, cols / 2, ..]).to_slice()
            }
        }
    }

    /// Band vector of a pointwise input.
    ///
    /// Pointwise-only strategies call this; a window reaching them means the
    /// engine's up-front capability check was bypassed.
    pub fn pixel(&self, strategy: &'static str) -> Result<&'a [f64]> {
        match *self {
            PixelInput::Pixel(values) => Ok(values),
            PixelInput::Window(window) => Err(Error::UnsupportedTraversal {
                strategy,
                traversal: Traversal::Windowed {
                    size: window.dim().0,
                }
                .to_string(),
            }),
        }
    }

    /// Number of bands carried by the input
    pub fn num_bands(&self) -> usize {
        match self {
            PixelInput::Pixel(values) => values.len(),
            PixelInput::Window(window) => window.dim().2,
        }
    }
}

/// A pluggable per-pixel classification rule.
///
/// `evaluate` receives an output slice of exactly [`num_out_bands`] values
/// and must fill all of them.
///
/// [`num_out_bands`]: ClassificationStrategy::num_out_bands
pub trait ClassificationStrategy: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Band count every input must carry
    fn num_in_bands(&self) -> usize;

    /// Length of the output vector
    fn num_out_bands(&self) -> usize;

    /// Traversal shapes this strategy accepts
    fn capabilities(&self) -> Capabilities {
        Capabilities::POINTWISE
    }

    fn supports(&self, traversal: Traversal) -> bool {
        self.capabilities().supports(traversal)
    }

    /// Classify one input, writing `num_out_bands` values into `output`
    fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()>;
}

impl<S: ClassificationStrategy + ?Sized> ClassificationStrategy for &S {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn num_in_bands(&self) -> usize {
        (**self).num_in_bands()
    }

    fn num_out_bands(&self) -> usize {
        (**self).num_out_bands()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
        (**self).evaluate(input, output)
    }
}

impl<S: ClassificationStrategy + ?Sized> ClassificationStrategy for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn num_in_bands(&self) -> usize {
        (**self).num_in_bands()
    }

    fn num_out_bands(&self) -> usize {
        (**self).num_out_bands()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
        (**self).evaluate(input, output)
    }
}
