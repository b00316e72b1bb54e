//! # SpecMap Parallel
//!
//! Block-parallel traversal for classification strategies.
//!
//! This crate provides:
//! - Block decomposition of large rasters
//! - Sequential / rayon-parallel execution modes
//! - The traversal engine that feeds pixels or windows to a strategy

pub mod blocks;
pub mod engine;
pub mod mode;

pub use blocks::{Block, BlockIterator};
pub use engine::TraversalEngine;
pub use mode::{ParallelStrategy, ProcessingMode};
