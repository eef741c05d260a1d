//! Sparse, unbounded grid of height cells stored in fixed-size blocks.

use rustc_hash::FxHashMap;

/// One `size × size` block of cells plus a written flag per cell.
struct HeightBlock {
    cells: Vec<f32>,
    filled: Vec<bool>,
}

impl HeightBlock {
    fn new(size: usize) -> Self {
        Self {
            cells: vec![0.0; size * size],
            filled: vec![false; size * size],
        }
    }
}

/// Infinite 2D grid of height cells addressed by global integer coordinates.
///
/// Cells live in square blocks of `block_size × block_size` allocated on first
/// write. A cell that has never been written reads as `0.0` and reports
/// [`is_filled`](Self::is_filled) as `false`, so a legitimately zero height
/// is never mistaken for a missing one.
pub struct ChunkedHeightCache {
    block_size: usize,
    blocks: FxHashMap<(i64, i64), HeightBlock>,
}

impl ChunkedHeightCache {
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "cache block size must be positive");
        Self {
            block_size,
            blocks: FxHashMap::default(),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of allocated blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Map a global cell to its block and the offset inside that block.
    ///
    /// Uses floor division, so `(-1, -1)` lands in block `(-1, -1)` at the
    /// block's last cell rather than in block `(0, 0)`.
    pub fn locate(&self, x: i64, y: i64) -> ((i64, i64), (usize, usize)) {
        let size = self.block_size as i64;
        (
            (x.div_euclid(size), y.div_euclid(size)),
            (x.rem_euclid(size) as usize, y.rem_euclid(size) as usize),
        )
    }

    fn slot(&self, x: i64, y: i64) -> ((i64, i64), usize) {
        let (block, (lx, ly)) = self.locate(x, y);
        (block, lx + ly * self.block_size)
    }

    /// Height at a global cell; `0.0` if never written.
    pub fn get(&self, x: i64, y: i64) -> f32 {
        let (block, idx) = self.slot(x, y);
        self.blocks.get(&block).map_or(0.0, |b| b.cells[idx])
    }

    /// Whether the cell has been written since its block was allocated.
    pub fn is_filled(&self, x: i64, y: i64) -> bool {
        let (block, idx) = self.slot(x, y);
        self.blocks.get(&block).is_some_and(|b| b.filled[idx])
    }

    /// Mutable slot for a global cell, allocating its block if needed.
    ///
    /// The cell counts as filled from this point on.
    pub fn height_mut(&mut self, x: i64, y: i64) -> &mut f32 {
        let (block, idx) = self.slot(x, y);
        let size = self.block_size;
        let block = self
            .blocks
            .entry(block)
            .or_insert_with(|| HeightBlock::new(size));
        block.filled[idx] = true;
        &mut block.cells[idx]
    }

    pub fn set(&mut self, x: i64, y: i64, height: f32) {
        *self.height_mut(x, y) = height;
    }

    /// Copy the `side × side` square starting at `(x0, y0)` into `out`
    /// (row-major, replacing its contents).
    pub fn read_square(&self, x0: i64, y0: i64, side: usize, out: &mut Vec<f32>) {
        out.clear();
        out.reserve(side * side);
        for y in 0..side as i64 {
            for x in 0..side as i64 {
                out.push(self.get(x0 + x, y0 + y));
            }
        }
    }

    /// Write a row-major `side × side` square back starting at `(x0, y0)`.
    ///
    /// # Panics
    ///
    /// Panics if `heights` does not hold `side * side` values.
    pub fn write_square(&mut self, x0: i64, y0: i64, side: usize, heights: &[f32]) {
        assert_eq!(heights.len(), side * side, "square buffer has the wrong length");
        for (i, &height) in heights.iter().enumerate() {
            let x = (i % side) as i64;
            let y = (i / side) as i64;
            self.set(x0 + x, y0 + y, height);
        }
    }

    /// Fill every unwritten cell of a rectangle with `sample(x, y)`.
    /// Returns the number of cells filled.
    pub fn fill_missing<F>(&mut self, x0: i64, y0: i64, width: usize, height: usize, mut sample: F) -> usize
    where
        F: FnMut(i64, i64) -> f32,
    {
        let mut filled = 0;
        for y in y0..y0 + height as i64 {
            for x in x0..x0 + width as i64 {
                if !self.is_filled(x, y) {
                    self.set(x, y, sample(x, y));
                    filled += 1;
                }
            }
        }
        filled
    }

    /// Drop every block whose Chebyshev distance from the block containing
    /// `(x, y)` exceeds `radius`. Returns the number of blocks dropped.
    pub fn evict_beyond(&mut self, x: i64, y: i64, radius: u32) -> usize {
        let ((cx, cy), _) = self.locate(x, y);
        let radius = radius as i64;
        let before = self.blocks.len();
        self.blocks
            .retain(|&(bx, by), _| (bx - cx).abs() <= radius && (by - cy).abs() <= radius);
        before - self.blocks.len()
    }

    /// Drop all blocks.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}
