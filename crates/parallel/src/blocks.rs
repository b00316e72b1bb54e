//! Block decomposition of large rasters

/// A rectangular, non-overlapping sub-region of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Row offset in the source raster
    pub row_offset: usize,
    /// Column offset in the source raster
    pub col_offset: usize,
    /// Number of rows in this block
    pub rows: usize,
    /// Number of columns in this block
    pub cols: usize,
}

impl Block {
    pub fn new(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
        }
    }

    /// Number of pixels in the block
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert block-local coordinates to source raster coordinates
    pub fn to_source_coords(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row_offset + local_row, self.col_offset + local_col)
    }

    /// Source coordinates of every pixel, row-major
    pub fn positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.rows).flat_map(move |r| (0..self.cols).map(move |c| self.to_source_coords(r, c)))
    }
}

/// Row-major iterator over the blocks covering a raster
pub struct BlockIterator {
    total_rows: usize,
    total_cols: usize,
    block_size: usize,
    current_row: usize,
    current_col: usize,
}

impl BlockIterator {
    /// `block_size` is clamped to at least one pixel
    pub fn new(total_rows: usize, total_cols: usize, block_size: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            block_size: block_size.max(1),
            current_row: 0,
            current_col: 0,
        }
    }
}

impl Iterator for BlockIterator {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let rows = self.block_size.min(self.total_rows - self.current_row);
        let cols = self.block_size.min(self.total_cols - self.current_col);
        let block = Block::new(self.current_row, self.current_col, rows, cols);

        self.current_col += self.block_size;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.block_size;
        }

        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_iterator_order() {
        let blocks: Vec<_> = BlockIterator::new(5, 7, 4).collect();
        assert_eq!(
            blocks,
            vec![
                Block::new(0, 0, 4, 4),
                Block::new(0, 4, 4, 3),
                Block::new(4, 0, 1, 4),
                Block::new(4, 4, 1, 3),
            ]
        );
    }

    #[test]
    fn test_block_coverage_exactly_once() {
        let rows = 100;
        let cols = 37;
        let mut covered = vec![vec![0u8; cols]; rows];

        for block in BlockIterator::new(rows, cols, 32) {
            for (r, c) in block.positions() {
                covered[r][c] += 1;
            }
        }

        for r in 0..rows {
            for c in 0..cols {
                assert_eq!(covered[r][c], 1, "Cell ({}, {}) visited {} times", r, c, covered[r][c]);
            }
        }
    }

    #[test]
    fn test_empty_raster_has_no_blocks() {
        assert_eq!(BlockIterator::new(0, 10, 8).count(), 0);
        assert_eq!(BlockIterator::new(10, 0, 8).count(), 0);
    }
}
