//! The pieces a player can currently choose from.

use crate::catalog::{CATALOG, PieceId};
use crate::error::{EngineError, Result};
use rand::Rng;

/// The amount of pieces offered at the same time.
pub const SUPPLY_CAPACITY: usize = 3;

/// Ordered list of offered piece ids. Between a consumption and its replenishment the list
/// is one shorter than the capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceSupply {
    slots: Vec<PieceId>,
}

impl Default for PieceSupply {
    fn default() -> Self {
        Self::initialize()
    }
}

impl PieceSupply {
    /// The starting hand, always the first entries of the catalog.
    pub fn initialize() -> Self {
        PieceSupply {
            slots: (0..SUPPLY_CAPACITY).collect(),
        }
    }

    /// The offered pieces in display order.
    pub fn offered(&self) -> &[PieceId] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Is the piece currently offered?
    pub fn contains(&self, piece: PieceId) -> bool {
        self.slots.contains(&piece)
    }

    /// Takes the piece out of the supply. With duplicates only the first one goes.
    pub fn consume(&mut self, piece: PieceId) -> Result<()> {
        let position = self
            .slots
            .iter()
            .position(|slot| *slot == piece)
            .ok_or(EngineError::UnknownPiece(piece))?;
        self.slots.remove(position);
        Ok(())
    }

    /// Appends a uniformly drawn piece to the end, as long as a slot is free.
    /// Returns the new piece.
    pub fn replenish<R: Rng>(&mut self, rng: &mut R) -> Option<PieceId> {
        if self.slots.len() >= SUPPLY_CAPACITY {
            return None;
        }
        let piece = rng.gen_range(0..CATALOG.len());
        self.slots.push(piece);
        Some(piece)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn starts_with_the_first_three_pieces() {
        let supply = PieceSupply::initialize();
        assert_eq!(supply.offered(), &[0, 1, 2]);
        assert_eq!(supply.len(), SUPPLY_CAPACITY);
    }

    #[test]
    fn consume_then_replenish_restores_capacity() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut supply = PieceSupply::initialize();
        supply.consume(1).unwrap();
        assert_eq!(supply.offered(), &[0, 2]);
        let fresh = supply.replenish(&mut rng).unwrap();
        assert!(fresh < CATALOG.len());
        assert_eq!(supply.len(), SUPPLY_CAPACITY);
        assert_eq!(supply.offered()[2], fresh);
    }

    #[test]
    fn consuming_an_absent_piece_fails() {
        let mut supply = PieceSupply::initialize();
        assert_eq!(supply.consume(19), Err(EngineError::UnknownPiece(19)));
        assert_eq!(supply, PieceSupply::initialize());
    }

    #[test]
    fn replenish_never_overfills() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut supply = PieceSupply::initialize();
        assert_eq!(supply.replenish(&mut rng), None);
        assert_eq!(supply.len(), SUPPLY_CAPACITY);
    }

    #[test]
    fn duplicates_are_consumed_one_at_a_time() {
        let mut supply = PieceSupply {
            slots: vec![4, 4, 9],
        };
        supply.consume(4).unwrap();
        assert_eq!(supply.offered(), &[4, 9]);
        supply.consume(4).unwrap();
        assert_eq!(supply.offered(), &[9]);
    }
}
