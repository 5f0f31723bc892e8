//! WebSocket message routing for the relay server.
//!
//! Every connection runs two Tokio tasks:
//! - **Send task**: writes whatever the dispatch loop queued for this connection
//! - **Receive task**: parses client frames and forwards them to the dispatch loop
//!
//! Frames are JSON text. A frame that does not parse is answered with an `error` message and
//! the connection stays open.

use crate::dispatch::DispatchEvent;
use crate::lobby::ConnectionId;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;

/// Spawns the send and receive task of one connection.
///
/// When either task completes (connection lost, client closed, dispatcher gone), the other
/// is aborted. The caller unregisters the connection afterwards.
///
/// # Returns
/// A static string describing why the connection ended (for logging/debugging).
pub async fn handle_connection_logic(
    sender: SplitSink<WebSocket, Message>,
    receiver: SplitStream<WebSocket>,
    internal_receiver: mpsc::Receiver<ServerMessage>,
    outbound: mpsc::Sender<ServerMessage>,
    dispatcher: mpsc::Sender<DispatchEvent>,
    connection: ConnectionId,
) -> &'static str {
    let mut send_task = tokio::spawn(async move { send_logic(sender, internal_receiver).await });

    let mut receive_task = tokio::spawn(async move {
        receive_logic(receiver, outbound, dispatcher, connection).await
    });

    // If any one of the tasks run to completion, we abort the other.
    let result = tokio::select! {
        res_a = &mut send_task => {receive_task.abort(); res_a},
        res_b = &mut receive_task => {send_task.abort(); res_b},
    };

    result.unwrap_or_else(|err| {
        tracing::error!(?err, connection, "Internal panic in connection logic.");
        "Internal panic in connection logic."
    })
}

/// What to do with one frame a client sent.
#[derive(Debug, PartialEq)]
enum FrameAction {
    /// Hand the message to the dispatch loop.
    Forward(ClientMessage),
    /// Answer the sender directly, nothing reaches the dispatch loop.
    Reject(ServerMessage),
    /// Stop reading, the reason ends the connection.
    Close(&'static str),
    /// Control frames.
    Ignore,
}

/// Sorts a client frame. Text frames that do not parse and binary frames become an `error`
/// reply for the sender.
fn classify_frame(frame: Message) -> FrameAction {
    let reason = match frame {
        Message::Text(text) => match ClientMessage::from_json(text.as_str()) {
            Ok(message) => return FrameAction::Forward(message),
            Err(error) => error.to_string(),
        },
        Message::Binary(_) => "binary frames are not supported".to_string(),
        Message::Close(_) => return FrameAction::Close("Client closed the connection."),
        _ => return FrameAction::Ignore, // Ping and pong are handled by axum.
    };
    FrameAction::Reject(ServerMessage::Error {
        message: format!("Malformed message: {reason}"),
    })
}

/// Reads client frames and hands the parsed messages to the dispatch loop.
///
/// Malformed text and binary frames get an `error` reply on the connection's own outbound
/// channel, they are never forwarded.
async fn receive_logic(
    mut receiver: SplitStream<WebSocket>,
    outbound: mpsc::Sender<ServerMessage>,
    dispatcher: mpsc::Sender<DispatchEvent>,
    connection: ConnectionId,
) -> &'static str {
    while let Some(state) = receiver.next().await {
        let Ok(frame) = state else {
            return "Connection lost.";
        };
        match classify_frame(frame) {
            FrameAction::Forward(message) => {
                let res = dispatcher
                    .send(DispatchEvent::Inbound {
                        connection,
                        message,
                    })
                    .await;
                if let Err(error) = res {
                    tracing::error!(?error, "Dispatch loop is gone.");
                    return "Dispatch loop is gone.";
                }
            }
            FrameAction::Reject(reply) => {
                tracing::warn!(connection, ?reply, "Malformed message from client.");
                if outbound.try_send(reply).is_err() {
                    tracing::warn!(connection, "Could not queue malformed message reply.");
                }
            }
            FrameAction::Close(reason) => return reason,
            FrameAction::Ignore => {}
        }
    }
    "Connection lost."
}

/// Writes the queued server messages as text frames.
async fn send_logic(
    mut sender: SplitSink<WebSocket, Message>,
    mut internal_receiver: mpsc::Receiver<ServerMessage>,
) -> &'static str {
    while let Some(message) = internal_receiver.recv().await {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(?error, ?message, "Could not encode server message.");
                continue;
            }
        };
        let res = sender.send(Message::Text(text.into())).await;
        if let Err(err) = res {
            tracing::error!(?err, "Error in communication with client endpoint.");
            return "Error in communication with client endpoint.";
        }
    }
    // The receive task holds a sender as well, so this only happens on shutdown.
    "Internal channel closed."
}
