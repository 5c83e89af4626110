//! Process-grid layout: tiling ranks into a 2-D arrangement of blocks.
//!
//! One block per rank. With P ranks the tiling chooses
//! `blocks_y = ⌊√P⌋` decremented until it divides P, and
//! `blocks_x = P / blocks_y`, so `blocks_x ≥ blocks_y` and the tiling is as
//! square as P's factorization allows. Ranks are placed column-major:
//! rank r sits at `(r / blocks_y, r mod blocks_y)`.

use crate::types::{DomainBounds, Side, Sides};

/// 2-D tiling of ranks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessGrid {
    /// Total participating ranks.
    pub ranks: usize,
    /// Block columns.
    pub blocks_x: usize,
    /// Block rows.
    pub blocks_y: usize,
}

impl ProcessGrid {
    /// Tile `ranks` processes.
    pub fn new(ranks: usize) -> Self {
        assert!(ranks > 0, "process grid requires at least one rank");
        let mut blocks_y = (ranks as f64).sqrt() as usize;
        while ranks % blocks_y != 0 {
            blocks_y -= 1;
        }
        Self {
            ranks,
            blocks_x: ranks / blocks_y,
            blocks_y,
        }
    }

    /// Block position `(bx, by)` of a rank.
    #[inline]
    pub fn position(&self, rank: usize) -> (usize, usize) {
        (rank / self.blocks_y, rank % self.blocks_y)
    }

    /// Rank sitting at block position `(bx, by)`.
    #[inline]
    pub fn rank_at(&self, bx: usize, by: usize) -> usize {
        bx * self.blocks_y + by
    }

    /// The neighbouring rank across `side`, or `None` at the domain edge.
    pub fn neighbour(&self, rank: usize, side: Side) -> Option<usize> {
        let (bx, by) = self.position(rank);
        match side {
            Side::Left if bx > 0 => Some(rank - self.blocks_y),
            Side::Right if bx < self.blocks_x - 1 => Some(rank + self.blocks_y),
            Side::Bottom if by > 0 => Some(rank - 1),
            Side::Top if by < self.blocks_y - 1 => Some(rank + 1),
            _ => None,
        }
    }

    /// All four neighbours of a rank.
    pub fn neighbours(&self, rank: usize) -> Sides<Option<usize>> {
        Sides::new(
            self.neighbour(rank, Side::Left),
            self.neighbour(rank, Side::Right),
            self.neighbour(rank, Side::Bottom),
            self.neighbour(rank, Side::Top),
        )
    }
}

/// Interior extent and physical origin of one rank's block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockExtent {
    /// Block position in the tiling.
    pub position: (usize, usize),
    /// Interior cells in x.
    pub nx: usize,
    /// Interior cells in y.
    pub ny: usize,
    /// Physical x of the block's lower-left interior corner.
    pub origin_x: f64,
    /// Physical y of the block's lower-left interior corner.
    pub origin_y: f64,
}

/// Split a `nx_total × ny_total` simulation grid over the process grid.
///
/// Every block in a column (resp. row) gets the base cell count
/// `nx_total / blocks_x`; the rightmost block column and topmost block row
/// absorb the remainder, matching the domain decomposition of the
/// checkpointed output files.
pub fn block_extent(
    grid: &ProcessGrid,
    rank: usize,
    nx_total: usize,
    ny_total: usize,
    bounds: &DomainBounds,
) -> BlockExtent {
    let (bx, by) = grid.position(rank);
    let dx = bounds.width() / nx_total as f64;
    let dy = bounds.height() / ny_total as f64;

    let nx_base = nx_total / grid.blocks_x;
    let ny_base = ny_total / grid.blocks_y;
    let nx = if bx < grid.blocks_x - 1 {
        nx_base
    } else {
        nx_total - (grid.blocks_x - 1) * nx_base
    };
    let ny = if by < grid.blocks_y - 1 {
        ny_base
    } else {
        ny_total - (grid.blocks_y - 1) * ny_base
    };

    BlockExtent {
        position: (bx, by),
        nx,
        ny,
        origin_x: bounds.left + (bx * nx_base) as f64 * dx,
        origin_y: bounds.bottom + (by * ny_base) as f64 * dy,
    }
}
