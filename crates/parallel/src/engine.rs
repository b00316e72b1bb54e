//! Raster traversal engine
//!
//! Visits every pixel of a band stack exactly once per pass, block by block
//! in row-major order, and routes its spectral input to a
//! [`ClassificationStrategy`]. The engine owns no classification semantics.

use crate::blocks::{Block, BlockIterator};
use crate::mode::{ParallelStrategy, ProcessingMode};
use specmap_core::{ClassificationStrategy, Error, PixelInput, Raster, Result, Traversal};
use tracing::debug;

/// Block-parallel driver for classification strategies
#[derive(Debug, Clone)]
pub struct TraversalEngine {
    block_size: usize,
    mode: ProcessingMode,
    traversal: Traversal,
}

impl Default for TraversalEngine {
    /// 256×256 blocks, parallel, pointwise
    fn default() -> Self {
        Self::new(256)
    }
}

impl TraversalEngine {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            mode: ProcessingMode::default(),
            traversal: Traversal::Pointwise,
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    /// Blocks covering a raster of the given shape, row-major
    pub fn blocks(&self, rows: usize, cols: usize) -> Vec<Block> {
        BlockIterator::new(rows, cols, self.block_size).collect()
    }

    /// Check a strategy against an input before any data is touched
    pub fn validate<S>(&self, strategy: &S, input: &Raster) -> Result<()>
    where
        S: ClassificationStrategy + ?Sized,
    {
        if self.block_size == 0 {
            return Err(Error::invalid("block_size", 0, "must be at least 1"));
        }
        if let Traversal::Windowed { size } = self.traversal {
            if size < 3 || size % 2 == 0 {
                return Err(Error::invalid("window_size", size, "must be odd and at least 3"));
            }
        }
        if !strategy.supports(self.traversal) {
            return Err(Error::UnsupportedTraversal {
                strategy: strategy.name(),
                traversal: self.traversal.to_string(),
            });
        }
        if strategy.num_in_bands() != input.bands() {
            return Err(Error::BandCountMismatch {
                expected: strategy.num_in_bands(),
                actual: input.bands(),
            });
        }
        if strategy.num_out_bands() == 0 {
            return Err(Error::invalid(
                "num_out_bands",
                0,
                format!("strategy '{}' declares no output bands", strategy.name()),
            ));
        }
        Ok(())
    }

    /// Run a strategy over every pixel, allocating the output raster.
    ///
    /// The output carries the input's transform and has the strategy's
    /// output band count. No-data pixels become NaN in every band.
    pub fn run<S>(&self, strategy: &S, input: &Raster) -> Result<Raster>
    where
        S: ClassificationStrategy + ?Sized,
    {
        self.validate(strategy, input)?;
        let mut output = input.with_same_meta(strategy.num_out_bands())?;
        self.run_into(strategy, input, &mut output)?;
        Ok(output)
    }

    /// Run a strategy, writing into a caller-provided output raster.
    ///
    /// The first strategy error aborts the pass; `output` is then left
    /// untouched.
    pub fn run_into<S>(&self, strategy: &S, input: &Raster, output: &mut Raster) -> Result<()>
    where
        S: ClassificationStrategy + ?Sized,
    {
        self.validate(strategy, input)?;
        if output.bands() != strategy.num_out_bands() {
            return Err(Error::BandCountMismatch {
                expected: strategy.num_out_bands(),
                actual: output.bands(),
            });
        }
        if output.shape() != input.shape() {
            return Err(Error::SizeMismatch {
                er: input.rows(),
                ec: input.cols(),
                ar: output.rows(),
                ac: output.cols(),
            });
        }

        let (rows, cols) = input.shape();
        let blocks = self.blocks(rows, cols);
        debug!(
            strategy = strategy.name(),
            traversal = %self.traversal,
            blocks = blocks.len(),
            "traversal pass"
        );

        let results = self
            .mode
            .try_par_map(0..blocks.len(), |i| self.evaluate_block(strategy, input, &blocks[i]))?;

        let out_bands = strategy.num_out_bands();
        let values = output.values_mut();
        for (block, buf) in blocks.iter().zip(results) {
            let run = block.cols * out_bands;
            for local_row in 0..block.rows {
                let (r, c) = block.to_source_coords(local_row, 0);
                let dst = (r * cols + c) * out_bands;
                values[dst..dst + run].copy_from_slice(&buf[local_row * run..(local_row + 1) * run]);
            }
        }
        output.set_nodata(None);
        Ok(())
    }

    fn evaluate_block<S>(&self, strategy: &S, input: &Raster, block: &Block) -> Result<Vec<f64>>
    where
        S: ClassificationStrategy + ?Sized,
    {
        let out_bands = strategy.num_out_bands();
        let mut buf = vec![f64::NAN; block.len() * out_bands];

        for ((row, col), out) in block.positions().zip(buf.chunks_exact_mut(out_bands)) {
            let pixel = input.pixel_at(row, col);
            if !input.is_valid_pixel(pixel) {
                continue;
            }
            let pixel_input = match self.traversal {
                Traversal::Pointwise => PixelInput::Pixel(pixel),
                Traversal::Windowed { size } => match input.window(row, col, size) {
                    Some(window) => PixelInput::Window(window),
                    None => continue,
                },
            };
            strategy.evaluate(pixel_input, out)?;
        }

        Ok(buf)
    }

    /// Apply `f` to every block and collect the results in block order.
    ///
    /// Used by multi-pass algorithms that reduce per-block partial results
    /// after the join.
    pub fn map_blocks<T, F>(&self, rows: usize, cols: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&Block) -> Result<T> + Sync + Send,
    {
        if self.block_size == 0 {
            return Err(Error::invalid("block_size", 0, "must be at least 1"));
        }
        let blocks = self.blocks(rows, cols);
        self.mode.try_par_map(0..blocks.len(), |i| f(&blocks[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specmap_core::Capabilities;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sums the bands of a pixel and counts invocations
    struct BandSum {
        bands: usize,
        calls: AtomicUsize,
    }

    impl ClassificationStrategy for BandSum {
        fn name(&self) -> &'static str {
            "band-sum"
        }
        fn num_in_bands(&self) -> usize {
            self.bands
        }
        fn num_out_bands(&self) -> usize {
            2
        }
        fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let pixel = input.pixel(self.name())?;
            output[0] = pixel.iter().sum();
            output[1] = pixel[0];
            Ok(())
        }
    }

    /// Mean of the first band over a window
    struct WindowMean;

    impl ClassificationStrategy for WindowMean {
        fn name(&self) -> &'static str {
            "window-mean"
        }
        fn num_in_bands(&self) -> usize {
            1
        }
        fn num_out_bands(&self) -> usize {
            1
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::WINDOWED
        }
        fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
            match input {
                PixelInput::Window(w) => output[0] = w.mean().unwrap_or(f64::NAN),
                PixelInput::Pixel(_) => return Err(Error::Other("pixel input".into())),
            }
            Ok(())
        }
    }

    struct FailAt(f64);

    impl ClassificationStrategy for FailAt {
        fn name(&self) -> &'static str {
            "fail-at"
        }
        fn num_in_bands(&self) -> usize {
            1
        }
        fn num_out_bands(&self) -> usize {
            1
        }
        fn evaluate(&self, input: PixelInput<'_>, output: &mut [f64]) -> Result<()> {
            let v = input.pixel(self.name())?[0];
            if v == self.0 {
                return Err(Error::Other("numeric fault".into()));
            }
            output[0] = v;
            Ok(())
        }
    }

    fn ramp(rows: usize, cols: usize, bands: usize) -> Raster {
        let data = (0..rows * cols * bands).map(|v| v as f64).collect();
        Raster::from_vec(data, rows, cols, bands).unwrap()
    }

    #[test]
    fn test_visits_every_pixel_once() {
        let input = ramp(37, 23, 3);
        let strategy = BandSum {
            bands: 3,
            calls: AtomicUsize::new(0),
        };
        for mode in [ProcessingMode::Sequential, ProcessingMode::Parallel] {
            strategy.calls.store(0, Ordering::Relaxed);
            let out = TraversalEngine::new(8).with_mode(mode).run(&strategy, &input).unwrap();
            assert_eq!(strategy.calls.load(Ordering::Relaxed), 37 * 23);
            assert_eq!(out.bands(), 2);
            let px = input.pixel(36, 22).unwrap();
            assert_eq!(out.pixel(36, 22).unwrap(), &[px.iter().sum::<f64>(), px[0]]);
        }
    }

    #[test]
    fn test_block_size_does_not_change_output() {
        let input = ramp(19, 31, 2);
        let strategy = BandSum {
            bands: 2,
            calls: AtomicUsize::new(0),
        };
        let a = TraversalEngine::new(4).run(&strategy, &input).unwrap();
        let b = TraversalEngine::new(1000).run(&strategy, &input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_band_mismatch_fails_before_processing() {
        let input = ramp(4, 4, 3);
        let strategy = BandSum {
            bands: 4,
            calls: AtomicUsize::new(0),
        };
        let err = TraversalEngine::default().run(&strategy, &input).unwrap_err();
        assert!(matches!(err, Error::BandCountMismatch { expected: 4, actual: 3 }));
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_output_band_mismatch() {
        let input = ramp(4, 4, 1);
        let strategy = BandSum {
            bands: 1,
            calls: AtomicUsize::new(0),
        };
        let mut output = input.with_same_meta(3).unwrap();
        let err = TraversalEngine::default()
            .run_into(&strategy, &input, &mut output)
            .unwrap_err();
        assert!(matches!(err, Error::BandCountMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_pointwise_strategy_rejected_in_windowed_mode() {
        let input = ramp(6, 6, 1);
        let strategy = BandSum {
            bands: 1,
            calls: AtomicUsize::new(0),
        };
        let err = TraversalEngine::default()
            .with_traversal(Traversal::Windowed { size: 3 })
            .run(&strategy, &input)
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_windowed_strategy_rejected_in_pointwise_mode() {
        let input = ramp(6, 6, 1);
        let err = TraversalEngine::default().run(&WindowMean, &input).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTraversal { .. }));
    }

    #[test]
    fn test_even_window_rejected() {
        let input = ramp(6, 6, 1);
        let err = TraversalEngine::default()
            .with_traversal(Traversal::Windowed { size: 4 })
            .run(&WindowMean, &input)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_windowed_traversal_crosses_blocks() {
        let input = ramp(6, 6, 1);
        let out = TraversalEngine::new(2)
            .with_traversal(Traversal::Windowed { size: 3 })
            .run(&WindowMean, &input)
            .unwrap();
        // Linear ramp: window mean equals the centre value
        assert_eq!(out.get(1, 1, 0).unwrap(), 7.0);
        assert_eq!(out.get(3, 2, 0).unwrap(), 20.0);
        // Edge pixels have no full window
        assert!(out.get(0, 3, 0).unwrap().is_nan());
        assert!(out.get(5, 5, 0).unwrap().is_nan());
    }

    #[test]
    fn test_windowed_neighbours_are_not_masked() {
        let mut input = ramp(5, 5, 1);
        input.set(1, 1, 0, f64::NAN).unwrap();
        let out = TraversalEngine::new(2)
            .with_traversal(Traversal::Windowed { size: 3 })
            .run(&WindowMean, &input)
            .unwrap();
        // Invalid centre is skipped, a NaN neighbour reaches the strategy
        assert!(out.get(1, 1, 0).unwrap().is_nan());
        assert!(out.get(2, 2, 0).unwrap().is_nan());
        assert_eq!(out.get(3, 3, 0).unwrap(), 18.0);
    }

    #[test]
    fn test_nodata_pixels_skip_strategy() {
        let mut input = Raster::from_vec(vec![1.0, 2.0, -1.0, 4.0], 2, 2, 1).unwrap();
        input.set_nodata(Some(-1.0));
        let strategy = BandSum {
            bands: 1,
            calls: AtomicUsize::new(0),
        };
        let out = TraversalEngine::default().run(&strategy, &input).unwrap();
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 3);
        assert!(out.get(1, 0, 0).unwrap().is_nan());
        assert!(out.get(1, 0, 1).unwrap().is_nan());
    }

    #[test]
    fn test_strategy_error_aborts_pass() {
        let input = ramp(10, 10, 1);
        let mut output = input.with_same_meta(1).unwrap();
        let err = TraversalEngine::new(3)
            .run_into(&FailAt(55.0), &input, &mut output)
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
        assert!(output.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_map_blocks_in_order() {
        let engine = TraversalEngine::new(4).with_mode(ProcessingMode::Parallel);
        let sizes = engine.map_blocks(10, 10, |b| Ok(b.len())).unwrap();
        assert_eq!(sizes, vec![16, 16, 8, 16, 16, 8, 8, 8, 4]);
    }
}
