//! A headless player for block duels. It joins a room, waits for the opponent and then keeps
//! placing the piece that scores best until the clock runs out.

use block_engine::board::Board;
use block_engine::catalog::{self, PieceId};
use block_engine::match_session::{MatchConfig, MatchEvent, MatchPhase, Reporting};
use block_engine::middle_layer::{ConnectionState, MiddleLayer};
use clap::Parser;
use protocol::BOARD_DIM;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The pause between two heartbeats.
const FRAME_TIME: Duration = Duration::from_millis(50);

/// Block duel auto player
#[derive(Parser, Debug)]
#[command(name = "auto-player")]
#[command(about = "Joins a block duel room and plays it headless", long_about = None)]
struct Cli {
    /// The room to join
    room: String,

    /// Web socket endpoint of the relay server
    #[arg(long, env = "BLOCK_DUEL_URL", default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Seconds to wait between two placements
    #[arg(long, default_value = "0.5")]
    think_time: f32,

    /// Seconds until the local clock ends the match
    #[arg(long)]
    match_duration: Option<f32>,

    /// Report whole boards and scores instead of single placements
    #[arg(long)]
    snapshot: bool,
}

/// A placement the player decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Move {
    piece: PieceId,
    row: usize,
    col: usize,
    score: u32,
}

/// Tries every offered piece at every origin and picks the one with the highest score.
/// Ties go to the earliest offered piece and the topmost, leftmost origin.
fn pick_move(board: &Board, offered: &[PieceId]) -> Option<Move> {
    let mut best: Option<Move> = None;
    for &piece in offered {
        let Some(shape) = catalog::shape(piece) else {
            continue;
        };
        for row in 0..BOARD_DIM {
            for col in 0..BOARD_DIM {
                let mut trial = board.clone();
                let Ok(result) = trial.place(shape, row, col) else {
                    continue;
                };
                if best.is_none_or(|best| result.score_delta > best.score) {
                    best = Some(Move {
                        piece,
                        row,
                        col,
                        score: result.score_delta,
                    });
                }
            }
        }
    }
    best
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auto_player=info,block_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = MatchConfig::default();
    if let Some(match_duration) = cli.match_duration {
        config.match_duration = match_duration;
    }
    if cli.snapshot {
        config.reporting = Reporting::Snapshot;
    }

    let mut middle_layer = MiddleLayer::generate_middle_layer(cli.url.clone(), config);
    middle_layer.join_room(cli.room.clone());
    tracing::info!(url = cli.url, room = cli.room, "Joining.");

    let mut last_frame = Instant::now();
    let mut think_left = cli.think_time;
    loop {
        std::thread::sleep(FRAME_TIME);
        let delta_time = last_frame.elapsed().as_secs_f32();
        last_frame = Instant::now();
        middle_layer.update(delta_time);

        if let ConnectionState::Disconnected { error_string } = middle_layer.connection_state() {
            match error_string {
                Some(error) => tracing::error!(error, "Lost the connection."),
                None => tracing::info!("Disconnected."),
            }
            return;
        }

        while let Some(event) = middle_layer.next_event() {
            match event {
                MatchEvent::Joined {
                    room_id,
                    player_index,
                } => tracing::info!(room_id, ?player_index, "Seated, waiting for opponent."),
                MatchEvent::Started => tracing::info!("Match started."),
                MatchEvent::OpponentScore(score) => tracing::debug!(score, "Opponent scored."),
                MatchEvent::PieceOffered(piece) => tracing::debug!(piece, "New piece on offer."),
                MatchEvent::OpponentLeft => tracing::info!("Opponent left the match."),
                MatchEvent::ServerError(message) => tracing::warn!(message, "Server error."),
                MatchEvent::Finished(outcome) => {
                    let session = middle_layer.session();
                    tracing::info!(
                        ?outcome,
                        my_score = session.my_score(),
                        opponent_score = session.opponent_score(),
                        "Match finished."
                    );
                    middle_layer.disconnect();
                    return;
                }
            }
        }

        if middle_layer.session().phase() != MatchPhase::Playing {
            continue;
        }
        think_left -= delta_time;
        if think_left > 0.0 {
            continue;
        }
        think_left = cli.think_time;

        let session = middle_layer.session();
        let Some(chosen) = pick_move(session.board(), session.offered_pieces()) else {
            if session.is_stuck() {
                tracing::debug!("No offered piece fits, waiting for the clock.");
            }
            continue;
        };
        match middle_layer.place(chosen.piece, chosen.row, chosen.col) {
            Ok(result) => tracing::info!(
                piece = chosen.piece,
                row = chosen.row,
                col = chosen.col,
                points = result.score_delta,
                "Placed piece."
            ),
            Err(error) => tracing::warn!(%error, "Placement rejected."),
        }
    }
}
