//! The fixed table of placeable pieces. It is loaded once as static data and only ever
//! handed out by reference.

/// Index of a piece in [`CATALOG`].
pub type PieceId = usize;

/// The filled cells of one piece inside its bounding box, row by row.
/// 1 marks a filled cell, 0 an empty one. All rows have the same length.
#[derive(Debug, PartialEq, Eq)]
pub struct PieceShape {
    name: &'static str,
    rows: &'static [&'static [u8]],
}

impl PieceShape {
    const fn new(name: &'static str, rows: &'static [&'static [u8]]) -> Self {
        PieceShape { name, rows }
    }

    /// The display name of the piece.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rows of the bounding box.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Columns of the bounding box.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    /// Is the indicated cell of the bounding box part of the piece?
    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .is_some_and(|cell| *cell != 0)
    }

    /// All filled cells as (row, col) offsets from the top left corner.
    pub fn filled_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| **cell != 0)
                .map(move |(col, _)| (row, col))
        })
    }

    /// The amount of board cells the piece covers.
    pub fn cell_count(&self) -> usize {
        self.filled_cells().count()
    }
}

use PieceShape as P;
/// Every piece the supply may offer. The first three entries form the starting hand.
#[rustfmt::skip]
pub static CATALOG: [PieceShape; 31] = [
    P::new("T", &[&[1, 1, 1], &[0, 1, 0]]),
    P::new("Square", &[&[1, 1], &[1, 1]]),
    P::new("Bar", &[&[1, 1, 1, 1]]),
    P::new("L", &[&[1, 0], &[1, 0], &[1, 1]]),
    P::new("T Up", &[&[0, 1, 0], &[1, 1, 1]]),
    P::new("T Right", &[&[1, 0], &[1, 1], &[1, 0]]),
    P::new("J Flat", &[&[1, 1, 1], &[0, 0, 1]]),
    P::new("L Flat", &[&[0, 0, 1], &[1, 1, 1]]),
    P::new("J Hook", &[&[1, 1], &[0, 1], &[0, 1]]),
    P::new("L Hook", &[&[1, 1], &[1, 0], &[1, 0]]),
    P::new("Long Bar", &[&[1, 1, 1, 1, 1]]),
    P::new("Long T", &[&[1, 1, 1], &[0, 1, 0], &[0, 1, 0]]),
    P::new("Short L", &[&[1, 1, 1], &[1, 0, 0]]),
    P::new("Chunk", &[&[1, 1], &[1, 1], &[1, 0]]),
    P::new("Corner", &[&[1, 1, 1], &[1, 0, 0], &[1, 0, 0]]),
    P::new("Long L", &[&[1, 1, 1, 1], &[1, 0, 0, 0]]),
    P::new("Crate", &[&[1, 1, 1], &[1, 1, 0]]),
    P::new("Tall Chunk", &[&[1, 1], &[1, 1], &[1, 0], &[1, 0]]),
    P::new("Worm", &[&[1, 1, 1], &[0, 1, 1]]),
    P::new("Dot", &[&[1]]),
    P::new("Domino", &[&[1, 1]]),
    P::new("Tromino", &[&[1, 1, 1]]),
    P::new("Tetromino", &[&[1, 1, 1, 1]]),
    P::new("Pentomino", &[&[1, 1, 1, 1, 1]]),
    P::new("C", &[&[1, 1], &[1, 0], &[1, 1]]),
    P::new("Reverse Corner", &[&[1, 1, 1], &[0, 0, 1], &[0, 0, 1]]),
    P::new("Evil Worm", &[&[1, 1, 1], &[0, 1, 1]]),
    P::new("Stair", &[&[1, 1], &[0, 1]]),
    P::new("Big Stair", &[&[1, 1, 1], &[0, 0, 1], &[0, 0, 1]]),
    P::new("Huge Stair", &[&[1, 1, 1, 1], &[0, 0, 0, 1], &[0, 0, 0, 1]]),
    P::new("Helmet", &[&[1, 1, 1], &[1, 1, 1]]),
];

/// Looks up a piece by id.
pub fn shape(piece: PieceId) -> Option<&'static PieceShape> {
    CATALOG.get(piece)
}

/// Looks up the id of a piece by its display name.
pub fn find_by_name(name: &str) -> Option<PieceId> {
    CATALOG.iter().position(|shape| shape.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shape_is_a_filled_rectangle() {
        for shape in CATALOG.iter() {
            assert!(shape.height() >= 1, "{} has no rows", shape.name());
            assert!(shape.width() >= 1, "{} has no columns", shape.name());
            assert!(shape.height() <= 5 && shape.width() <= 5);
            assert!(
                shape.rows.iter().all(|row| row.len() == shape.width()),
                "{} is ragged",
                shape.name()
            );
            assert!(shape.cell_count() >= 1);
        }
    }

    #[test]
    fn dot_is_a_single_cell() {
        let dot = shape(find_by_name("Dot").unwrap()).unwrap();
        assert_eq!((dot.height(), dot.width()), (1, 1));
        assert_eq!(dot.filled_cells().collect::<Vec<_>>(), vec![(0, 0)]);
    }

    #[test]
    fn filled_cells_skip_holes() {
        let t = shape(0).unwrap();
        assert_eq!(
            t.filled_cells().collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (0, 2), (1, 1)]
        );
        assert!(!t.is_filled(1, 0));
        assert!(!t.is_filled(5, 5));
    }

    #[test]
    fn lookup_outside_the_table_fails() {
        assert!(shape(CATALOG.len()).is_none());
        assert!(find_by_name("Hexomino").is_none());
    }
}
