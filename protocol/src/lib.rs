//! The message vocabulary that is spoken between the clients and the relay server.
//! Also contains the grid representation that travels inside the messages and the constants
//! both sides have to agree on.
//!
//! Every frame is a UTF-8 JSON object with a `type` discriminator and camelCase fields:
//!
//! ```text
//! {"type":"join","roomId":"r1"}
//! {"type":"joined","roomId":"r1","playerIndex":0}
//! {"type":"update","board":[[null,1,...],...],"myScore":12,"opponentScore":4}
//! ```

use serde::{Deserialize, Serialize};

/// The buffer sizes for the channels for intra server communication.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// The extension of the board in every dimension.
pub const BOARD_DIM: usize = 9;

/// The extension of one of the nine clearable blocks.
pub const BLOCK_DIM: usize = 3;

/// The amount of players that make up a match.
pub const ROOM_CAPACITY: usize = 2;

/// The error text a client gets, when it tries to enter a room with two players.
pub const ROOM_FULL_MESSAGE: &str = "Room is full";

/// A single field of the board. Cleared cells can not be told apart from never filled ones.
///
/// On the wire an empty cell is `null` (or `0`) and a filled cell is `1`, which is what
/// browser clients put into their board arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<u8>", into = "Option<u8>")]
pub enum Cell {
    #[default]
    Empty,
    Filled,
}

impl From<Option<u8>> for Cell {
    fn from(value: Option<u8>) -> Self {
        match value {
            None | Some(0) => Cell::Empty,
            Some(_) => Cell::Filled,
        }
    }
}

impl From<Cell> for Option<u8> {
    fn from(value: Cell) -> Self {
        match value {
            Cell::Empty => None,
            Cell::Filled => Some(1),
        }
    }
}

/// The row major board snapshot as it is exchanged in `start` and `update` messages.
pub type Grid = [[Cell; BOARD_DIM]; BOARD_DIM];

/// A board where no cell is filled.
pub const EMPTY_GRID: Grid = [[Cell::Empty; BOARD_DIM]; BOARD_DIM];

/// The seat of a player in a match, assigned in join order. Travels as the number 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlayerIndex {
    First,
    Second,
}

impl PlayerIndex {
    /// Maps the position in the join order to the player index, `None` beyond the capacity.
    pub fn from_join_order(position: usize) -> Option<Self> {
        match position {
            0 => Some(PlayerIndex::First),
            1 => Some(PlayerIndex::Second),
            _ => None,
        }
    }

    /// The seat of the other player.
    pub fn opponent(self) -> Self {
        match self {
            PlayerIndex::First => PlayerIndex::Second,
            PlayerIndex::Second => PlayerIndex::First,
        }
    }

    /// The position in the score pair.
    pub fn slot(self) -> usize {
        match self {
            PlayerIndex::First => 0,
            PlayerIndex::Second => 1,
        }
    }
}

impl From<PlayerIndex> for u8 {
    fn from(value: PlayerIndex) -> Self {
        value.slot() as u8
    }
}

impl TryFrom<u8> for PlayerIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PlayerIndex::from_join_order(value as usize)
            .ok_or_else(|| format!("Player index {value} out of range."))
    }
}

/// Messages a client sends to the relay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Enter the room, creating it if nobody is waiting there yet.
    Join { room_id: String },
    /// The state after a placement. Older clients only report `myScore`, so the board and the
    /// opponent score are optional and leave the stored values untouched when missing.
    Update {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        board: Option<Grid>,
        my_score: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opponent_score: Option<u32>,
    },
    /// Asks the server to place the catalog piece with its top left corner at the field and
    /// to score it. The server answers with an `update` or, if it does not fit, an `error`.
    Place { piece_id: usize, row: usize, col: usize },
    /// The local match clock ran out.
    End,
}

/// Messages the relay server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Confirms the membership and tells the client its seat.
    Joined {
        room_id: String,
        player_index: PlayerIndex,
    },
    /// The second player arrived, the match begins.
    Start {
        player_index: PlayerIndex,
        board: Grid,
        scores: [u32; ROOM_CAPACITY],
    },
    /// Relayed state, scores are seen from the receiving player.
    Update {
        board: Grid,
        my_score: u32,
        opponent_score: u32,
    },
    /// The match is over. No winner means a tie.
    End {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<PlayerIndex>,
    },
    /// The other member of the room left.
    OpponentDisconnected,
    /// A rejected join or placement, or a malformed request.
    Error { message: String },
}

impl ClientMessage {
    /// Parses one text frame.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Encodes the message into one text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    /// Parses one text frame.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Encodes the message into one text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_uses_camel_case_room_id() {
        let parsed = ClientMessage::from_json(r#"{"type":"join","roomId":"r1"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Join {
                room_id: "r1".to_string()
            }
        );
    }

    #[test]
    fn update_with_only_my_score_is_accepted() {
        let parsed = ClientMessage::from_json(r#"{"type":"update","myScore":14}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Update {
                board: None,
                my_score: 14,
                opponent_score: None
            }
        );
    }

    #[test]
    fn end_ignores_extra_fields() {
        let parsed = ClientMessage::from_json(r#"{"type":"end","reason":"timer"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::End);
        assert_eq!(ClientMessage::End.to_json().unwrap(), r#"{"type":"end"}"#);
    }

    #[test]
    fn place_names_piece_and_origin() {
        let parsed =
            ClientMessage::from_json(r#"{"type":"place","pieceId":19,"row":3,"col":8}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::Place {
                piece_id: 19,
                row: 3,
                col: 8
            }
        );
        assert!(ClientMessage::from_json(r#"{"type":"place","pieceId":19,"row":-1,"col":0}"#).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"cheat","score":1000}"#).is_err());
        assert!(ClientMessage::from_json("not json at all").is_err());
    }

    #[test]
    fn board_cells_travel_as_null_and_one() {
        let mut board = EMPTY_GRID;
        board[0][1] = Cell::Filled;
        let message = ServerMessage::Update {
            board,
            my_score: 2,
            opponent_score: 0,
        };
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "update");
        assert_eq!(value["myScore"], 2);
        assert_eq!(value["opponentScore"], 0);
        assert_eq!(value["board"][0][0], serde_json::Value::Null);
        assert_eq!(value["board"][0][1], 1);
        assert_eq!(value["board"].as_array().unwrap().len(), BOARD_DIM);
    }

    #[test]
    fn zero_cells_count_as_empty() {
        let mut rows = vec![vec![json!(null); BOARD_DIM]; BOARD_DIM];
        rows[4][4] = json!(0);
        rows[8][8] = json!(1);
        let text = json!({"type": "update", "board": rows, "myScore": 0}).to_string();
        let ClientMessage::Update {
            board: Some(board), ..
        } = ClientMessage::from_json(&text).unwrap()
        else {
            panic!("Expected an update with a board.");
        };
        assert_eq!(board[4][4], Cell::Empty);
        assert_eq!(board[8][8], Cell::Filled);
    }

    #[test]
    fn player_index_is_a_number_in_range() {
        let joined = ServerMessage::Joined {
            room_id: "r1".to_string(),
            player_index: PlayerIndex::Second,
        };
        assert_eq!(
            joined.to_json().unwrap(),
            r#"{"type":"joined","roomId":"r1","playerIndex":1}"#
        );
        assert!(
            ServerMessage::from_json(r#"{"type":"joined","roomId":"r1","playerIndex":2}"#).is_err()
        );
    }

    #[test]
    fn server_end_omits_missing_winner() {
        assert_eq!(
            ServerMessage::End { winner: None }.to_json().unwrap(),
            r#"{"type":"end"}"#
        );
        assert_eq!(
            ServerMessage::OpponentDisconnected.to_json().unwrap(),
            r#"{"type":"opponentDisconnected"}"#
        );
    }

    #[test]
    fn opponent_is_symmetric() {
        assert_eq!(PlayerIndex::First.opponent(), PlayerIndex::Second);
        assert_eq!(PlayerIndex::Second.opponent().opponent(), PlayerIndex::Second);
        assert_eq!(PlayerIndex::from_join_order(2), None);
    }
}
