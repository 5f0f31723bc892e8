//! Game logic and client networking for two-player block duels.
//!
//! * [`board`] – the 9×9 grid, placement rules, clearing and scoring.
//! * [`catalog`] – the static table of piece shapes.
//! * [`piece_supply`] – the three pieces currently on offer.
//! * [`match_session`] – the client side state of one match, driven by server messages,
//!   placements and time.
//! * [`middle_layer`] – connects a match session to the relay server (feature `client`).

pub mod board;
pub mod catalog;
pub mod error;
pub mod match_session;
#[cfg(feature = "client")]
pub mod middle_layer;
pub mod piece_supply;
pub mod timer;
#[cfg(feature = "client")]
pub mod web_socket_interface;

pub use error::EngineError;
