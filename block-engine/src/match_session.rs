//! The client side of one match: the own board, the offered pieces, both scores and the
//! match clock. The session is purely event driven like the rest of the engine:
//!
//! * server messages come in through [`MatchSession::handle_server_message`],
//! * local placements through [`MatchSession::place`],
//! * time through [`MatchSession::update`].
//!
//! Messages for the relay server are collected and polled with
//! [`MatchSession::drain_outgoing`], notifications for the front end with
//! [`MatchSession::next_event`].
//!
//! ```text
//! [Lobby] --start--> [Playing] --clock expired--> [TimeUp] --end--> [Finished]
//!                        |                                             ^
//!                        +-----------end / opponentDisconnected--------+
//! ```

use crate::board::{Board, PlacementResult};
use crate::catalog::{self, PieceId};
use crate::error::{EngineError, Result};
use crate::piece_supply::PieceSupply;
use crate::timer::Timer;
use protocol::{ClientMessage, PlayerIndex, ServerMessage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// How a placement is reported to the relay server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reporting {
    /// Send the placement itself, the server applies and scores it on its copy of our board.
    #[default]
    Intent,
    /// Send the resulting board and both scores, the server stores them as they are.
    Snapshot,
}

/// Timing and reporting settings of a match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    /// Seconds until the local clock ends the match.
    pub match_duration: f32,
    /// Seconds between placing a piece and getting a new one offered.
    pub replenish_delay: f32,
    pub reporting: Reporting,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            match_duration: 300.0,
            replenish_delay: 0.3,
            reporting: Reporting::default(),
        }
    }
}

/// How the match ended for the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
    Draw,
}

/// Where in the life cycle of the match we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting for the room to fill up.
    Lobby,
    /// Pieces may be placed.
    Playing,
    /// The local clock ran out, we wait for the server to confirm the end.
    TimeUp,
    /// Terminal, all timers are cancelled.
    Finished(Outcome),
}

/// Notifications for the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    Joined {
        room_id: String,
        player_index: PlayerIndex,
    },
    Started,
    OpponentScore(u32),
    PieceOffered(PieceId),
    OpponentLeft,
    Finished(Outcome),
    ServerError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKey {
    MatchClock,
    Replenish(u32),
}

/// The local state of one player for one match.
pub struct MatchSession<R> {
    config: MatchConfig,
    board: Board,
    supply: PieceSupply,
    my_score: u32,
    opponent_score: u32,
    player_index: Option<PlayerIndex>,
    phase: MatchPhase,
    /// Owns the match clock and one replenishment per consumed piece.
    timer: Timer<TimerKey>,
    next_replenish: u32,
    outgoing: Vec<ClientMessage>,
    events: VecDeque<MatchEvent>,
    rng: R,
}

impl MatchSession<StdRng> {
    /// A session that draws new pieces from an OS seeded generator.
    pub fn with_entropy(config: MatchConfig) -> Self {
        Self::new(config, StdRng::from_entropy())
    }
}

impl<R: Rng> MatchSession<R> {
    pub fn new(config: MatchConfig, rng: R) -> Self {
        MatchSession {
            config,
            board: Board::new(),
            supply: PieceSupply::initialize(),
            my_score: 0,
            opponent_score: 0,
            player_index: None,
            phase: MatchPhase::Lobby,
            timer: Timer::new(),
            next_replenish: 0,
            outgoing: Vec::new(),
            events: VecDeque::new(),
            rng,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn offered_pieces(&self) -> &[PieceId] {
        self.supply.offered()
    }

    pub fn my_score(&self) -> u32 {
        self.my_score
    }

    pub fn opponent_score(&self) -> u32 {
        self.opponent_score
    }

    pub fn player_index(&self) -> Option<PlayerIndex> {
        self.player_index
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Seconds left on the match clock, `None` if it is not running.
    pub fn remaining_time(&self) -> Option<f32> {
        self.timer.remaining(TimerKey::MatchClock)
    }

    /// True if none of the offered pieces fits anywhere on the board.
    pub fn is_stuck(&self) -> bool {
        !self
            .supply
            .offered()
            .iter()
            .filter_map(|piece| catalog::shape(*piece))
            .any(|shape| self.board.fits_anywhere(shape))
    }

    /// Messages for the relay server, in the order they were produced.
    pub fn drain_outgoing(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outgoing)
    }

    /// The next notification for the front end.
    pub fn next_event(&mut self) -> Option<MatchEvent> {
        self.events.pop_front()
    }

    /// Processes one message of the relay server.
    pub fn handle_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Joined {
                room_id,
                player_index,
            } => {
                self.player_index = Some(player_index);
                self.events.push_back(MatchEvent::Joined {
                    room_id,
                    player_index,
                });
            }
            ServerMessage::Start {
                player_index,
                board,
                scores,
            } => self.start(player_index, Board::from_grid(board), scores),
            ServerMessage::Update { opponent_score, .. } => {
                // The relayed board is the board of whoever sent last, we keep our own.
                if matches!(self.phase, MatchPhase::Playing | MatchPhase::TimeUp) {
                    self.opponent_score = opponent_score;
                    self.events
                        .push_back(MatchEvent::OpponentScore(opponent_score));
                }
            }
            ServerMessage::End { winner } => {
                let outcome = match (winner, self.player_index) {
                    (Some(winner), Some(me)) if winner == me => Outcome::Won,
                    (Some(_), Some(_)) => Outcome::Lost,
                    _ => self.outcome_from_scores(),
                };
                self.finish(outcome);
            }
            ServerMessage::OpponentDisconnected => {
                if !matches!(self.phase, MatchPhase::Finished(_)) {
                    self.events.push_back(MatchEvent::OpponentLeft);
                }
                self.finish(Outcome::Won);
            }
            ServerMessage::Error { message } => {
                tracing::warn!(error = %message, "Server reported an error.");
                self.events.push_back(MatchEvent::ServerError(message));
            }
        }
    }

    /// Places an offered piece with its top left corner at the indicated field.
    /// Nothing changes and nothing is sent if the placement is rejected.
    pub fn place(&mut self, piece: PieceId, row: usize, col: usize) -> Result<PlacementResult> {
        if self.phase != MatchPhase::Playing {
            return Err(EngineError::NotPlaying);
        }
        if !self.supply.contains(piece) {
            return Err(EngineError::UnknownPiece(piece));
        }
        let shape = catalog::shape(piece).ok_or(EngineError::UnknownPiece(piece))?;
        let result = self.board.place(shape, row, col)?;
        self.supply.consume(piece)?;
        self.my_score = self.my_score.saturating_add(result.score_delta);

        let key = TimerKey::Replenish(self.next_replenish);
        self.next_replenish = self.next_replenish.wrapping_add(1);
        self.timer.start_timer(key, self.config.replenish_delay);

        tracing::debug!(
            piece = shape.name(),
            row,
            col,
            score = self.my_score,
            "Placed piece."
        );
        let message = match self.config.reporting {
            Reporting::Intent => ClientMessage::Place {
                piece_id: piece,
                row,
                col,
            },
            Reporting::Snapshot => ClientMessage::Update {
                board: Some(*self.board.grid()),
                my_score: self.my_score,
                opponent_score: Some(self.opponent_score),
            },
        };
        self.outgoing.push(message);
        Ok(result)
    }

    /// Advances the match clock and pending replenishments.
    pub fn update(&mut self, delta_time: f32) {
        for key in self.timer.update_and_get_list(delta_time) {
            match key {
                TimerKey::MatchClock => {
                    if self.phase == MatchPhase::Playing {
                        // Nothing can be placed anymore, so pending pieces are of no use.
                        self.timer.cancel_all();
                        self.phase = MatchPhase::TimeUp;
                        self.outgoing.push(ClientMessage::End);
                    }
                }
                TimerKey::Replenish(_) => {
                    if self.phase == MatchPhase::Playing
                        && let Some(piece) = self.supply.replenish(&mut self.rng)
                    {
                        self.events.push_back(MatchEvent::PieceOffered(piece));
                    }
                }
            }
        }
    }

    fn start(&mut self, player_index: PlayerIndex, board: Board, scores: [u32; 2]) {
        self.timer.cancel_all();
        self.player_index = Some(player_index);
        self.board = board;
        self.supply = PieceSupply::initialize();
        self.my_score = scores[player_index.slot()];
        self.opponent_score = scores[player_index.opponent().slot()];
        self.timer
            .start_timer(TimerKey::MatchClock, self.config.match_duration);
        self.phase = MatchPhase::Playing;
        self.events.push_back(MatchEvent::Started);
    }

    fn outcome_from_scores(&self) -> Outcome {
        match self.my_score.cmp(&self.opponent_score) {
            Ordering::Greater => Outcome::Won,
            Ordering::Less => Outcome::Lost,
            Ordering::Equal => Outcome::Draw,
        }
    }

    /// Ends the match once, later calls are ignored.
    fn finish(&mut self, outcome: Outcome) {
        if matches!(self.phase, MatchPhase::Finished(_)) {
            return;
        }
        self.timer.cancel_all();
        self.phase = MatchPhase::Finished(outcome);
        self.events.push_back(MatchEvent::Finished(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_by_name;
    use crate::piece_supply::SUPPLY_CAPACITY;
    use protocol::{Cell, EMPTY_GRID};

    fn session() -> MatchSession<StdRng> {
        MatchSession::new(MatchConfig::default(), StdRng::seed_from_u64(3))
    }

    fn snapshot_session() -> MatchSession<StdRng> {
        let config = MatchConfig {
            reporting: Reporting::Snapshot,
            ..MatchConfig::default()
        };
        MatchSession::new(config, StdRng::seed_from_u64(3))
    }

    fn started(player_index: PlayerIndex) -> MatchSession<StdRng> {
        let mut session = session();
        session.handle_server_message(ServerMessage::Start {
            player_index,
            board: EMPTY_GRID,
            scores: [0, 0],
        });
        session
    }

    #[test]
    fn placing_before_start_is_rejected() {
        let mut session = session();
        assert_eq!(session.place(0, 0, 0), Err(EngineError::NotPlaying));
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn start_resets_board_supply_and_scores() {
        let mut board = EMPTY_GRID;
        board[2][2] = Cell::Filled;
        let mut session = session();
        session.handle_server_message(ServerMessage::Start {
            player_index: PlayerIndex::Second,
            board,
            scores: [8, 6],
        });
        assert_eq!(session.phase(), MatchPhase::Playing);
        assert_eq!(session.my_score(), 6);
        assert_eq!(session.opponent_score(), 8);
        assert!(session.board().is_filled(2, 2));
        assert_eq!(session.offered_pieces(), &[0, 1, 2]);
        assert_eq!(session.remaining_time(), Some(300.0));
        assert_eq!(session.next_event(), Some(MatchEvent::Started));
    }

    #[test]
    fn placement_queues_the_intent() {
        let mut session = started(PlayerIndex::First);
        let dot = find_by_name("Dot").unwrap();
        assert_eq!(session.place(1, 0, 0).unwrap().score_delta, 2);
        assert_eq!(
            session.drain_outgoing(),
            vec![ClientMessage::Place {
                piece_id: 1,
                row: 0,
                col: 0
            }]
        );
        assert_eq!(session.my_score(), 2);
        assert!(session.place(dot, 0, 0).is_err());
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn snapshot_placement_scores_and_queues_an_update() {
        let mut session = snapshot_session();
        session.handle_server_message(ServerMessage::Start {
            player_index: PlayerIndex::First,
            board: EMPTY_GRID,
            scores: [0, 0],
        });
        let result = session.place(1, 0, 0).unwrap();
        assert_eq!(result.score_delta, 2);
        assert_eq!(session.my_score(), 2);
        assert_eq!(session.offered_pieces(), &[0, 2]);

        let outgoing = session.drain_outgoing();
        assert_eq!(outgoing.len(), 1);
        let ClientMessage::Update {
            board: Some(board),
            my_score,
            opponent_score,
        } = &outgoing[0]
        else {
            panic!("Expected an update.");
        };
        assert_eq!(*my_score, 2);
        assert_eq!(*opponent_score, Some(0));
        assert_eq!(board[1][1], Cell::Filled);
    }

    #[test]
    fn local_score_saturates() {
        let mut session = session();
        session.handle_server_message(ServerMessage::Start {
            player_index: PlayerIndex::First,
            board: EMPTY_GRID,
            scores: [u32::MAX, 0],
        });
        assert!(session.place(0, 0, 0).is_ok());
        assert_eq!(session.my_score(), u32::MAX);
    }

    #[test]
    fn rejected_placement_changes_nothing() {
        let mut session = started(PlayerIndex::First);
        session.place(1, 0, 0).unwrap();
        session.drain_outgoing();
        let board = session.board().clone();

        assert_eq!(
            session.place(0, 0, 0),
            Err(EngineError::InvalidPlacement { row: 0, col: 0 })
        );
        let dot = find_by_name("Dot").unwrap();
        assert_eq!(session.place(dot, 5, 5), Err(EngineError::UnknownPiece(dot)));

        assert_eq!(session.board(), &board);
        assert_eq!(session.my_score(), 2);
        assert_eq!(session.offered_pieces(), &[0, 2]);
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn consumed_piece_comes_back_after_the_delay() {
        let mut session = started(PlayerIndex::First);
        session.place(0, 0, 0).unwrap();
        session.update(0.1);
        assert_eq!(session.offered_pieces().len(), SUPPLY_CAPACITY - 1);
        session.update(0.25);
        assert_eq!(session.offered_pieces().len(), SUPPLY_CAPACITY);
        assert_eq!(session.offered_pieces()[..2], [1, 2]);
    }

    #[test]
    fn quick_placements_each_get_replenished() {
        let mut session = started(PlayerIndex::First);
        session.place(0, 0, 0).unwrap();
        session.place(1, 4, 4).unwrap();
        assert_eq!(session.offered_pieces(), &[2]);
        session.update(0.5);
        assert_eq!(session.offered_pieces().len(), SUPPLY_CAPACITY);
    }

    #[test]
    fn ended_match_never_replenishes() {
        let mut session = started(PlayerIndex::First);
        session.place(0, 0, 0).unwrap();
        session.handle_server_message(ServerMessage::End { winner: None });
        session.update(1.0);
        assert_eq!(session.offered_pieces(), &[1, 2]);
        assert_eq!(session.phase(), MatchPhase::Finished(Outcome::Won));
        assert_eq!(session.remaining_time(), None);
    }

    #[test]
    fn clock_expiry_sends_end_exactly_once() {
        let mut session = started(PlayerIndex::Second);
        session.update(299.0);
        assert!(session.drain_outgoing().is_empty());
        session.update(2.0);
        assert_eq!(session.drain_outgoing(), vec![ClientMessage::End]);
        assert_eq!(session.phase(), MatchPhase::TimeUp);
        session.update(10.0);
        assert!(session.drain_outgoing().is_empty());
        assert_eq!(session.place(2, 0, 0), Err(EngineError::NotPlaying));
    }

    #[test]
    fn time_up_drops_pending_replenishments() {
        let config = MatchConfig {
            match_duration: 1.0,
            replenish_delay: 0.3,
            ..MatchConfig::default()
        };
        let mut session = MatchSession::new(config, StdRng::seed_from_u64(3));
        session.handle_server_message(ServerMessage::Start {
            player_index: PlayerIndex::First,
            board: EMPTY_GRID,
            scores: [0, 0],
        });
        session.update(0.9);
        session.place(0, 0, 0).unwrap();
        session.update(0.2);
        assert_eq!(session.phase(), MatchPhase::TimeUp);
        session.update(1.0);
        assert_eq!(session.offered_pieces(), &[1, 2]);
        assert!(
            std::iter::from_fn(|| session.next_event())
                .all(|event| !matches!(event, MatchEvent::PieceOffered(_)))
        );
    }

    #[test]
    fn relayed_update_only_moves_the_opponent_score() {
        let mut session = started(PlayerIndex::Second);
        session.place(2, 0, 0).unwrap();
        let mut foreign = EMPTY_GRID;
        foreign[8][8] = Cell::Filled;
        session.handle_server_message(ServerMessage::Update {
            board: foreign,
            my_score: 0,
            opponent_score: 12,
        });
        assert_eq!(session.opponent_score(), 12);
        assert_eq!(session.my_score(), 2);
        assert!(!session.board().is_filled(8, 8));
    }

    #[test]
    fn winner_is_read_from_own_perspective() {
        let mut first = started(PlayerIndex::First);
        first.handle_server_message(ServerMessage::End {
            winner: Some(PlayerIndex::Second),
        });
        assert_eq!(first.phase(), MatchPhase::Finished(Outcome::Lost));

        let mut second = started(PlayerIndex::Second);
        second.handle_server_message(ServerMessage::End {
            winner: Some(PlayerIndex::Second),
        });
        assert_eq!(second.phase(), MatchPhase::Finished(Outcome::Won));
    }

    #[test]
    fn missing_winner_compares_local_scores() {
        let mut session = started(PlayerIndex::First);
        session.handle_server_message(ServerMessage::Update {
            board: EMPTY_GRID,
            my_score: 0,
            opponent_score: 4,
        });
        session.handle_server_message(ServerMessage::End { winner: None });
        assert_eq!(session.phase(), MatchPhase::Finished(Outcome::Lost));

        let mut tied = started(PlayerIndex::First);
        tied.handle_server_message(ServerMessage::End { winner: None });
        assert_eq!(tied.phase(), MatchPhase::Finished(Outcome::Draw));
    }

    #[test]
    fn opponent_leaving_wins_the_match() {
        let mut session = started(PlayerIndex::First);
        session.handle_server_message(ServerMessage::OpponentDisconnected);
        let events: Vec<MatchEvent> = std::iter::from_fn(|| session.next_event()).collect();
        assert_eq!(
            events,
            vec![
                MatchEvent::Started,
                MatchEvent::OpponentLeft,
                MatchEvent::Finished(Outcome::Won)
            ]
        );
        // A late end from the server does not change the result.
        session.handle_server_message(ServerMessage::End {
            winner: Some(PlayerIndex::Second),
        });
        assert_eq!(session.phase(), MatchPhase::Finished(Outcome::Won));
    }

    #[test]
    fn fresh_board_is_not_stuck() {
        let session = started(PlayerIndex::First);
        assert!(!session.is_stuck());
    }
}
