//! The middle layer takes care of the communication with the relay service.
//! This is the core entry point for a front end.
//!
//! The front end works heartbeat driven: it creates the middle layer before entering its loop
//! and calls [`MiddleLayer::update`] once per frame. Drop gestures become
//! [`MiddleLayer::place`] calls, everything that has to be shown is polled with
//! [`MiddleLayer::next_event`] or read from [`MiddleLayer::session`].
//!
//! ```text
//!    let mut middle_layer = MiddleLayer::generate_middle_layer(
//!        "ws://127.0.0.1:8080/ws".to_string(),
//!        MatchConfig::default(),
//!    );
//!    middle_layer.join_room("r1".to_string());
//!    loop {
//!        middle_layer.update(delta_time);
//!        match middle_layer.connection_state() {
//!            ConnectionState::Disconnected { error_string } => { /* show room input and error */ }
//!            ConnectionState::Connected { .. } => {
//!                while let Some(event) = middle_layer.next_event() { /* animate */ }
//!                if let Some((piece, row, col)) = dropped_piece {
//!                    let _ = middle_layer.place(piece, row, col);
//!                }
//!            }
//!            _ => { /* show connecting */ }
//!        }
//!    }
//! ```

use crate::board::PlacementResult;
use crate::catalog::PieceId;
use crate::error::Result;
use crate::match_session::{MatchConfig, MatchEvent, MatchSession};
use crate::web_socket_interface::ConnectionInformation;
use protocol::{ClientMessage, PlayerIndex, ServerMessage};
use rand::Rng;
use rand::rngs::StdRng;

/// The different phases we may be in concerning the connection.
#[derive(Clone, PartialEq, Debug)]
pub enum ConnectionState {
    /// When we are disconnected we may have an error string, that tells the reason why we went to disconnection.
    Disconnected { error_string: Option<String> },
    /// The socket is being opened.
    AwaitingOpen,
    /// The join request is out, we wait for the seat.
    AwaitingJoin,
    /// We are seated in a room.
    Connected { player_index: PlayerIndex },
}

/// Glues the socket to the match session.
pub struct MiddleLayer<R> {
    session: MatchSession<R>,
    core_connection: Option<ConnectionInformation>,
    connection_state: ConnectionState,
    /// The URI we use for connection.
    connection_string: String,
    /// The room we join as soon as the socket is open.
    pending_room: Option<String>,
}

impl MiddleLayer<StdRng> {
    /// Creates the middle layer. Should be done before entering the game loop.
    pub fn generate_middle_layer(connection_string: String, config: MatchConfig) -> Self {
        Self::with_session(connection_string, MatchSession::with_entropy(config))
    }
}

impl<R: Rng> MiddleLayer<R> {
    pub fn with_session(connection_string: String, session: MatchSession<R>) -> Self {
        MiddleLayer {
            session,
            core_connection: None,
            connection_state: ConnectionState::Disconnected { error_string: None },
            connection_string,
            pending_room: None,
        }
    }

    /// Connects and asks for a seat in the room. Only has an effect while disconnected.
    pub fn join_room(&mut self, room_id: String) {
        if !matches!(self.connection_state, ConnectionState::Disconnected { .. }) {
            tracing::warn!(room_id, "Join requested while not disconnected.");
            return;
        }
        match ConnectionInformation::start_connecting(&self.connection_string) {
            Ok(connection) => {
                self.core_connection = Some(connection);
                self.pending_room = Some(room_id);
                self.connection_state = ConnectionState::AwaitingOpen;
            }
            Err(error) => self.mark_error(error),
        }
    }

    /// Should be called once a frame, before events are polled.
    pub fn update(&mut self, delta_time: f32) {
        match self.connection_state {
            ConnectionState::Disconnected { .. } => {}
            ConnectionState::AwaitingOpen => self.update_awaiting_open(),
            ConnectionState::AwaitingJoin | ConnectionState::Connected { .. } => {
                self.update_connected(delta_time)
            }
        }
    }

    /// Places an offered piece. The resulting update goes out with the next heartbeat.
    pub fn place(&mut self, piece: PieceId, row: usize, col: usize) -> Result<PlacementResult> {
        self.session.place(piece, row, col)
    }

    /// Leaves the room. The server tells the opponent.
    pub fn disconnect(&mut self) {
        if self.core_connection.is_some() {
            self.mark_error("Disconnected from server".to_string());
        }
    }

    pub fn session(&self) -> &MatchSession<R> {
        &self.session
    }

    pub fn next_event(&mut self) -> Option<MatchEvent> {
        self.session.next_event()
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection_state
    }

    /// Global function to mark error and drop the connection.
    fn mark_error(&mut self, error: String) {
        self.connection_state = ConnectionState::Disconnected {
            error_string: Some(error),
        };
        self.core_connection = None;
        self.pending_room = None;
    }

    fn update_awaiting_open(&mut self) {
        let Some(connection) = self.core_connection.as_mut() else {
            debug_assert!(false, "No connection in awaiting open state");
            return;
        };
        match connection.poll_opened() {
            Ok(true) => {
                let room_id = self.pending_room.take().unwrap_or_default();
                let sent = connection.send_message(&ClientMessage::Join { room_id });
                match sent {
                    Ok(()) => self.connection_state = ConnectionState::AwaitingJoin,
                    Err(error) => self.mark_error(error),
                }
            }
            Ok(false) => {}
            Err(error) => self.mark_error(error),
        }
    }

    fn update_connected(&mut self, delta_time: f32) {
        let Some(connection) = self.core_connection.as_mut() else {
            debug_assert!(false, "No connection in connected state");
            return;
        };

        // 1. Collect what the relay sent us.
        let incoming = match connection.receive_messages() {
            Ok(incoming) => incoming,
            Err(error) => {
                self.mark_error(error);
                return;
            }
        };
        for message in incoming {
            let mut rejected = None;
            match &message {
                ServerMessage::Joined { player_index, .. } => {
                    self.connection_state = ConnectionState::Connected {
                        player_index: *player_index,
                    };
                }
                ServerMessage::Error { message }
                    if self.connection_state == ConnectionState::AwaitingJoin =>
                {
                    rejected = Some(message.clone());
                }
                _ => {}
            }
            self.session.handle_server_message(message);
            if let Some(error) = rejected {
                self.mark_error(error);
                return;
            }
        }

        // 2. Let the clocks run.
        self.session.update(delta_time);

        // 3. Send out whatever the session produced.
        let Some(connection) = self.core_connection.as_mut() else {
            return;
        };
        for message in self.session.drain_outgoing() {
            if let Err(error) = connection.send_message(&message) {
                self.mark_error(error);
                return;
            }
        }
    }
}
