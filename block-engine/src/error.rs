//! Error types for the block engine.

use crate::catalog::PieceId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Everything that can go wrong when a player tries to act on the local match.
/// None of these are fatal, the state is left as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Piece does not fit at row {row}, column {col}")]
    InvalidPlacement { row: usize, col: usize },

    #[error("Piece {0} is not offered")]
    UnknownPiece(PieceId),

    #[error("No match is running")]
    NotPlaying,
}
