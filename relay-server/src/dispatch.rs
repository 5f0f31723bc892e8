//! The single task that owns the [`RoomRegistry`].
//!
//! Connection tasks never touch room state. They report what happens on their socket as
//! [`DispatchEvent`]s, the loop applies them one after another and pushes the resulting
//! messages into the per connection outbound channels. Events of one connection are thereby
//! handled in arrival order and no room can be seen half updated.

use crate::lobby::{ConnectionId, Delivery, RoomRegistry, RoomSummary};
use protocol::{CHANNEL_BUFFER_SIZE, ClientMessage, ServerMessage};
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Everything the connection tasks and the http handlers may ask of the dispatch loop.
#[derive(Debug)]
pub enum DispatchEvent {
    /// A socket was upgraded, its messages go out through `outbound`.
    Connected {
        connection: ConnectionId,
        outbound: mpsc::Sender<ServerMessage>,
    },
    /// A well formed message arrived from a client.
    Inbound {
        connection: ConnectionId,
        message: ClientMessage,
    },
    /// The socket is gone, for whatever reason.
    Disconnected { connection: ConnectionId },
    /// Asks for a snapshot of all rooms.
    ListRooms {
        reply: oneshot::Sender<Vec<RoomSummary>>,
    },
}

/// Creates the event channel and spawns the dispatch loop on it.
pub fn spawn_dispatcher() -> mpsc::Sender<DispatchEvent> {
    let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tokio::spawn(run_dispatch_loop(receiver));
    sender
}

/// Runs until every sender of the event channel is dropped.
pub async fn run_dispatch_loop(mut events: mpsc::Receiver<DispatchEvent>) {
    let mut registry = RoomRegistry::new();
    let mut outbound: HashMap<ConnectionId, mpsc::Sender<ServerMessage>> = HashMap::new();

    while let Some(event) = events.recv().await {
        let deliveries = match event {
            DispatchEvent::Connected {
                connection,
                outbound: sender,
            } => {
                tracing::debug!(connection, "Connection registered.");
                outbound.insert(connection, sender);
                Vec::new()
            }
            DispatchEvent::Inbound {
                connection,
                message,
            } => handle_client_message(&mut registry, connection, message),
            DispatchEvent::Disconnected { connection } => {
                tracing::debug!(connection, "Connection unregistered.");
                outbound.remove(&connection);
                registry.disconnect(connection)
            }
            DispatchEvent::ListRooms { reply } => {
                // The asking handler may have given up already.
                let _ = reply.send(registry.room_summaries());
                Vec::new()
            }
        };
        deliver(&outbound, deliveries);
    }
    tracing::info!("All dispatch senders dropped, leaving dispatch loop.");
}

fn handle_client_message(
    registry: &mut RoomRegistry,
    connection: ConnectionId,
    message: ClientMessage,
) -> Vec<Delivery> {
    match message {
        ClientMessage::Join { room_id } => registry.join(connection, room_id),
        ClientMessage::Update {
            board,
            my_score,
            opponent_score,
        } => registry.update(connection, board, my_score, opponent_score),
        ClientMessage::Place { piece_id, row, col } => {
            registry.place(connection, piece_id, row, col)
        }
        ClientMessage::End => registry.end(connection),
    }
}

/// Hands the messages to the connection tasks without waiting. A client that does not keep
/// up loses messages instead of stalling everybody else.
fn deliver(outbound: &HashMap<ConnectionId, mpsc::Sender<ServerMessage>>, deliveries: Vec<Delivery>) {
    for Delivery {
        connection,
        message,
    } in deliveries
    {
        let Some(sender) = outbound.get(&connection) else {
            tracing::warn!(connection, "Delivery to unknown connection dropped.");
            continue;
        };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                tracing::warn!(connection, ?message, "Outbound channel full, message dropped.");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection, "Outbound channel already closed.");
            }
        }
    }
}
