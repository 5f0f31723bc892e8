//! The board engine. Owns the 9×9 grid, checks and applies placements and clears
//! completed rows, columns and 3×3 blocks.
//!
//! Clearing is done in two passes: first every complete unit is detected on the untouched
//! board, then all of them are emptied together. A row and a block that share cells are
//! therefore both scored.

use crate::catalog::PieceShape;
use crate::error::{EngineError, Result};
use protocol::{BLOCK_DIM, BOARD_DIM, Cell, EMPTY_GRID, Grid};

/// Points for every placed piece, independent of its size.
pub const PLACEMENT_POINTS: u32 = 2;
/// Points for every cleared row or column.
pub const LINE_POINTS: u32 = 10;
/// Points for every cleared 3×3 block.
pub const BLOCK_POINTS: u32 = 20;

/// What a single scan of the board cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearResult {
    pub rows_cleared: u32,
    pub cols_cleared: u32,
    pub blocks_cleared: u32,
}

impl ClearResult {
    /// The points the clears are worth.
    pub fn score_delta(&self) -> u32 {
        LINE_POINTS * (self.rows_cleared + self.cols_cleared) + BLOCK_POINTS * self.blocks_cleared
    }

    /// Did the scan clear anything at all?
    pub fn is_empty(&self) -> bool {
        self.rows_cleared == 0 && self.cols_cleared == 0 && self.blocks_cleared == 0
    }
}

/// The outcome of a successful placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementResult {
    /// The clears the placement triggered.
    pub clears: ClearResult,
    /// Placement bonus plus the points of the clears.
    pub score_delta: u32,
}

/// The grid of one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: Grid,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Creates a board with empty fields.
    pub fn new() -> Self {
        Board { cells: EMPTY_GRID }
    }

    /// Takes over a snapshot, e.g. the one from a `start` message.
    pub fn from_grid(cells: Grid) -> Self {
        Board { cells }
    }

    /// The snapshot that goes over the wire.
    pub fn grid(&self) -> &Grid {
        &self.cells
    }

    /// Checks a single field. Positions outside of the board count as empty.
    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|cells| cells.get(col))
            .is_some_and(|cell| *cell == Cell::Filled)
    }

    /// The amount of filled fields.
    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell == Cell::Filled)
            .count()
    }

    /// Checks if the shape with its top left corner at the origin lies completely on the board
    /// and does not overlap a filled field.
    pub fn can_place(&self, shape: &PieceShape, origin_row: usize, origin_col: usize) -> bool {
        let fits_on_board = |origin: usize, extent: usize| {
            origin.checked_add(extent).is_some_and(|end| end <= BOARD_DIM)
        };
        if !fits_on_board(origin_row, shape.height()) || !fits_on_board(origin_col, shape.width()) {
            return false;
        }
        shape
            .filled_cells()
            .all(|(row, col)| !self.is_filled(origin_row + row, origin_col + col))
    }

    /// Is there any origin where the shape fits?
    pub fn fits_anywhere(&self, shape: &PieceShape) -> bool {
        (0..BOARD_DIM)
            .flat_map(|row| (0..BOARD_DIM).map(move |col| (row, col)))
            .any(|(row, col)| self.can_place(shape, row, col))
    }

    /// Places the shape and clears whatever got completed. The legality is checked here again,
    /// on failure the board stays untouched.
    pub fn place(
        &mut self,
        shape: &PieceShape,
        origin_row: usize,
        origin_col: usize,
    ) -> Result<PlacementResult> {
        if !self.can_place(shape, origin_row, origin_col) {
            return Err(EngineError::InvalidPlacement {
                row: origin_row,
                col: origin_col,
            });
        }
        for (row, col) in shape.filled_cells() {
            self.cells[origin_row + row][origin_col + col] = Cell::Filled;
        }
        let clears = self.clear_completed();
        Ok(PlacementResult {
            clears,
            score_delta: PLACEMENT_POINTS + clears.score_delta(),
        })
    }

    /// Empties all complete rows, columns and blocks found in one scan.
    pub fn clear_completed(&mut self) -> ClearResult {
        let full_rows: Vec<usize> = (0..BOARD_DIM)
            .filter(|row| (0..BOARD_DIM).all(|col| self.is_filled(*row, col)))
            .collect();
        let full_cols: Vec<usize> = (0..BOARD_DIM)
            .filter(|col| (0..BOARD_DIM).all(|row| self.is_filled(row, *col)))
            .collect();
        let full_blocks: Vec<(usize, usize)> = block_origins()
            .filter(|(top, left)| block_cells(*top, *left).all(|(r, c)| self.is_filled(r, c)))
            .collect();

        for row in &full_rows {
            self.cells[*row] = [Cell::Empty; BOARD_DIM];
        }
        for col in &full_cols {
            for row in self.cells.iter_mut() {
                row[*col] = Cell::Empty;
            }
        }
        for (top, left) in &full_blocks {
            for (row, col) in block_cells(*top, *left) {
                self.cells[row][col] = Cell::Empty;
            }
        }

        ClearResult {
            rows_cleared: full_rows.len() as u32,
            cols_cleared: full_cols.len() as u32,
            blocks_cleared: full_blocks.len() as u32,
        }
    }
}

/// The top left corners of the nine blocks.
fn block_origins() -> impl Iterator<Item = (usize, usize)> {
    (0..BOARD_DIM)
        .step_by(BLOCK_DIM)
        .flat_map(|top| (0..BOARD_DIM).step_by(BLOCK_DIM).map(move |left| (top, left)))
}

/// The fields of the block with the indicated corner.
fn block_cells(top: usize, left: usize) -> impl Iterator<Item = (usize, usize)> {
    (top..top + BLOCK_DIM).flat_map(move |row| (left..left + BLOCK_DIM).map(move |col| (row, col)))
}
