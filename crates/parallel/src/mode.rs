//! Execution modes for block-parallel work

use rayon::prelude::*;
use specmap_core::{Error, Result};

/// How independent units of work (blocks) are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing on the global rayon pool
    #[default]
    Parallel,
    /// Parallel on a dedicated pool with the given number of threads
    ParallelWith(usize),
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a fallible function over indices, collecting in index order.
    ///
    /// The first error aborts the map.
    fn try_par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send;
}

impl ProcessingMode {
    fn dedicated_pool(threads: usize) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::Other(format!("Failed to build thread pool: {e}")))
    }
}

impl ParallelStrategy for ProcessingMode {
    fn try_par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            ProcessingMode::Parallel => range.into_par_iter().map(f).collect(),
            ProcessingMode::ParallelWith(threads) => {
                let pool = Self::dedicated_pool(*threads)?;
                pool.install(|| range.into_par_iter().map(f).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_par_map_preserves_order() {
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(2),
        ] {
            let out = mode.try_par_map(0..100, |i| Ok(i * 2)).unwrap();
            assert_eq!(out, (0..100).map(|i| i * 2).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_try_par_map_propagates_error() {
        for mode in [ProcessingMode::Sequential, ProcessingMode::Parallel] {
            let result = mode.try_par_map(0..50, |i| {
                if i == 17 {
                    Err(Error::IterationFault("boom".into()))
                } else {
                    Ok(i)
                }
            });
            assert!(matches!(result, Err(Error::IterationFault(_))));
        }
    }
}
