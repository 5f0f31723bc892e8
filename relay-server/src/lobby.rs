//! This module handles the rooms where two players meet for a match.
//! It provides:
//! - [`RoomRegistry`]: all active rooms and which connection sits where
//! - [`Delivery`]: a message addressed to one connection
//!
//! The registry is a plain state machine, every operation returns the messages it wants to
//! have sent and the caller does the I/O. Scores and boards either come in as client
//! snapshots (`update`) or are computed here from placements (`place`). Per room:
//!
//! ```text
//! [Waiting] --second join--> [Active] --one member disconnects--> [Abandoned]
//!     |                         |                                     |
//!     +-- last member leaves ---+----------- end / last leaves -------+--> removed
//! ```

use block_engine::board::Board;
use block_engine::catalog::{self, PieceId};
use protocol::{EMPTY_GRID, Grid, PlayerIndex, ROOM_CAPACITY, ROOM_FULL_MESSAGE, ServerMessage};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Server side identity of one web socket connection.
pub type ConnectionId = u64;

/// A message that has to go out to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub connection: ConnectionId,
    pub message: ServerMessage,
}

impl Delivery {
    fn new(connection: ConnectionId, message: ServerMessage) -> Self {
        Delivery {
            connection,
            message,
        }
    }
}

/// The life cycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// One player waits for the second.
    Waiting,
    /// Both players are present, updates get relayed.
    Active,
    /// The opponent left mid match. Kept until the remaining player ends or leaves.
    Abandoned,
}

/// A row for the room listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSummary {
    pub room_id: String,
    pub phase: RoomPhase,
    pub players: usize,
    pub scores: [u32; ROOM_CAPACITY],
}

struct Member {
    connection: ConnectionId,
    player_index: PlayerIndex,
}

/// The description of the room, the players play in.
struct Room {
    members: Vec<Member>,
    /// The board of whoever reported last.
    board: Grid,
    /// Each player's own board, indexed by [`PlayerIndex::slot`]. Placements are checked
    /// against these.
    boards: [Board; ROOM_CAPACITY],
    /// Indexed by [`PlayerIndex::slot`].
    scores: [u32; ROOM_CAPACITY],
    phase: RoomPhase,
}

impl Room {
    fn new() -> Self {
        Room {
            members: Vec::with_capacity(ROOM_CAPACITY),
            board: EMPTY_GRID,
            boards: [Board::new(), Board::new()],
            scores: [0; ROOM_CAPACITY],
            phase: RoomPhase::Waiting,
        }
    }

    /// The current state for every member, scores seen from the receiver.
    fn broadcast_update(&self) -> Vec<Delivery> {
        self.members
            .iter()
            .map(|member| {
                Delivery::new(
                    member.connection,
                    ServerMessage::Update {
                        board: self.board,
                        my_score: self.scores[member.player_index.slot()],
                        opponent_score: self.scores[member.player_index.opponent().slot()],
                    },
                )
            })
            .collect()
    }

    /// The player with more points, `None` on a tie.
    fn leader(&self) -> Option<PlayerIndex> {
        match self.scores[0].cmp(&self.scores[1]) {
            Ordering::Greater => Some(PlayerIndex::First),
            Ordering::Less => Some(PlayerIndex::Second),
            Ordering::Equal => None,
        }
    }
}

/// Where a connection sits.
struct Membership {
    room_id: String,
    player_index: PlayerIndex,
}

/// All rooms, keyed by the id the first player chose.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    memberships: HashMap<ConnectionId, Membership>,
}

fn error(connection: ConnectionId, message: impl Into<String>) -> Vec<Delivery> {
    vec![Delivery::new(
        connection,
        ServerMessage::Error {
            message: message.into(),
        },
    )]
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seats the connection in the room, creating the room if needed. The second player
    /// starts the match for both.
    pub fn join(&mut self, connection: ConnectionId, room_id: String) -> Vec<Delivery> {
        if let Some(membership) = self.memberships.get(&connection) {
            return error(
                connection,
                format!("Already joined room {}", membership.room_id),
            );
        }

        let room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!(room_id, "Room created.");
            Room::new()
        });
        if room.phase == RoomPhase::Abandoned {
            return error(connection, "Match is over");
        }
        let Some(player_index) = PlayerIndex::from_join_order(room.members.len()) else {
            tracing::debug!(room_id, connection, "Rejected join to full room.");
            return error(connection, ROOM_FULL_MESSAGE);
        };

        room.members.push(Member {
            connection,
            player_index,
        });
        self.memberships.insert(
            connection,
            Membership {
                room_id: room_id.clone(),
                player_index,
            },
        );
        let mut deliveries = vec![Delivery::new(
            connection,
            ServerMessage::Joined {
                room_id: room_id.clone(),
                player_index,
            },
        )];

        if room.members.len() == ROOM_CAPACITY {
            room.phase = RoomPhase::Active;
            tracing::info!(room_id, "Match started.");
            deliveries.extend(room.members.iter().map(|member| {
                Delivery::new(
                    member.connection,
                    ServerMessage::Start {
                        player_index: member.player_index,
                        board: room.board,
                        scores: room.scores,
                    },
                )
            }));
        }
        deliveries
    }

    /// Stores the reported state and relays it to both players, each from their own view.
    /// Dropped unless the sender sits in an active room.
    pub fn update(
        &mut self,
        connection: ConnectionId,
        board: Option<Grid>,
        my_score: u32,
        opponent_score: Option<u32>,
    ) -> Vec<Delivery> {
        let Some(membership) = self.memberships.get(&connection) else {
            tracing::debug!(connection, "Dropped update from connection without room.");
            return Vec::new();
        };
        let Some(room) = self.rooms.get_mut(&membership.room_id) else {
            return Vec::new();
        };
        if room.phase != RoomPhase::Active {
            tracing::debug!(room_id = membership.room_id, "Dropped update to inactive room.");
            return Vec::new();
        }

        let slot = membership.player_index.slot();
        if let Some(board) = board {
            room.board = board;
            room.boards[slot] = Board::from_grid(board);
        }
        room.scores[slot] = my_score;
        if let Some(opponent_score) = opponent_score {
            room.scores[membership.player_index.opponent().slot()] = opponent_score;
        }
        tracing::debug!(room_id = membership.room_id, scores = ?room.scores, "Relaying update.");
        room.broadcast_update()
    }

    /// Applies a placement to the sender's board and scores it here. A placement that does
    /// not fit is answered to the sender only and changes nothing.
    pub fn place(
        &mut self,
        connection: ConnectionId,
        piece: PieceId,
        row: usize,
        col: usize,
    ) -> Vec<Delivery> {
        let Some(membership) = self.memberships.get(&connection) else {
            tracing::debug!(connection, "Dropped placement from connection without room.");
            return Vec::new();
        };
        let Some(room) = self.rooms.get_mut(&membership.room_id) else {
            return Vec::new();
        };
        if room.phase != RoomPhase::Active {
            tracing::debug!(room_id = membership.room_id, "Dropped placement to inactive room.");
            return Vec::new();
        }
        let Some(shape) = catalog::shape(piece) else {
            return error(connection, format!("Unknown piece {piece}"));
        };

        let slot = membership.player_index.slot();
        let result = match room.boards[slot].place(shape, row, col) {
            Ok(result) => result,
            Err(rejection) => {
                tracing::debug!(room_id = membership.room_id, %rejection, "Rejected placement.");
                return error(connection, rejection.to_string());
            }
        };
        room.scores[slot] = room.scores[slot].saturating_add(result.score_delta);
        room.board = *room.boards[slot].grid();
        tracing::debug!(
            room_id = membership.room_id,
            piece = shape.name(),
            row,
            col,
            scores = ?room.scores,
            "Applied placement."
        );
        room.broadcast_update()
    }

    /// Ends the match of the connection's room for everybody in it and removes the room.
    /// Without a room this does nothing, so both clocks running out is fine.
    pub fn end(&mut self, connection: ConnectionId) -> Vec<Delivery> {
        let Some(membership) = self.memberships.get(&connection) else {
            return Vec::new();
        };
        let room_id = membership.room_id.clone();
        let Some(room) = self.rooms.remove(&room_id) else {
            self.memberships.remove(&connection);
            return Vec::new();
        };

        let winner = room.leader();
        tracing::info!(room_id, scores = ?room.scores, ?winner, "Match ended.");
        room.members
            .iter()
            .map(|member| {
                self.memberships.remove(&member.connection);
                Delivery::new(member.connection, ServerMessage::End { winner })
            })
            .collect()
    }

    /// Removes the connection from its room. The remaining player is told, an empty room
    /// is removed.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<Delivery> {
        let Some(membership) = self.memberships.remove(&connection) else {
            return Vec::new();
        };
        let Some(room) = self.rooms.get_mut(&membership.room_id) else {
            return Vec::new();
        };

        room.members.retain(|member| member.connection != connection);
        if room.members.is_empty() {
            self.rooms.remove(&membership.room_id);
            tracing::info!(room_id = membership.room_id, "Room closed, last player left.");
            return Vec::new();
        }

        room.phase = RoomPhase::Abandoned;
        tracing::info!(room_id = membership.room_id, "Player left a running match.");
        room.members
            .iter()
            .map(|member| Delivery::new(member.connection, ServerMessage::OpponentDisconnected))
            .collect()
    }

    /// All rooms ordered by id.
    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|(room_id, room)| RoomSummary {
                room_id: room_id.clone(),
                phase: room.phase,
                players: room.members.len(),
                scores: room.scores,
            })
            .collect();
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[cfg(test)]
    fn phase_of(&self, room_id: &str) -> Option<RoomPhase> {
        self.rooms.get(room_id).map(|room| room.phase)
    }

    #[cfg(test)]
    fn players_in(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.members.len())
    }
}
