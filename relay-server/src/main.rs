mod config;
mod dispatch;
mod lobby;
mod message_relay;

use crate::config::ServerConfig;
use crate::dispatch::{DispatchEvent, spawn_dispatcher};
use crate::lobby::ConnectionId;
use crate::message_relay::handle_connection_logic;
use axum::Router;
use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::stream::StreamExt;
use protocol::CHANNEL_BUFFER_SIZE;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// What every handler gets to see.
struct AppState {
    /// The entry into the dispatch loop, which owns all rooms.
    dispatcher: mpsc::Sender<DispatchEvent>,
    next_connection_id: AtomicU64,
}

#[tokio::main]
/// Activates error tracing, reads the configuration from the environment, spawns the dispatch
/// loop and sets up the routing system to serve the web sockets, the room listing and the
/// static browser client.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true) // Modul-Path (e.g. relay_server::dispatch)
                .with_thread_ids(true) // Thread-ID (helpful for Tokio)
                .with_thread_names(true), // Thread-Name
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(message) => {
            tracing::error!(message, "Invalid configuration.");
            return;
        }
    };

    let app_state = Arc::new(AppState {
        dispatcher: spawn_dispatcher(),
        next_connection_id: AtomicU64::new(1),
    });

    let index_file = config.static_dir.join("index.html");
    let app = Router::new()
        .route("/enlist", get(enlist_handler))
        .route("/ws", get(websocket_handler))
        .with_state(app_state)
        .fallback_service(ServeDir::new(&config.static_dir).not_found_service(ServeFile::new(index_file)));

    let address = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(?error, %address, "Could not bind listener.");
            return;
        }
    };
    tracing::info!(%address, static_dir = ?config.static_dir, "Relay server listening.");

    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(?error, "Server stopped.");
    }
}

/// Generates a list with the current rooms, their state, the amount of players and the scores.
async fn enlist_handler(State(state): State<Arc<AppState>>) -> String {
    let (reply, answer) = oneshot::channel();
    if state
        .dispatcher
        .send(DispatchEvent::ListRooms { reply })
        .await
        .is_err()
    {
        return "Dispatch loop is not running.".to_string();
    }
    let Ok(rooms) = answer.await else {
        return "Dispatch loop did not answer.".to_string();
    };
    rooms
        .iter()
        .map(|room| {
            format!(
                "Room: {:<30}  State: {:<9} Players: {} Scores: {:>5} {:>5}",
                room.room_id,
                format!("{:?}", room.phase),
                room.players,
                room.scores[0],
                room.scores[1]
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// This function gets immediately called and upgrades the web response to a web socket.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket(socket, state))
}

/// Does the whole handling from start to finish: registration at the dispatch loop ->
/// relaying in both directions -> unregistration.
async fn websocket(stream: WebSocket, state: Arc<AppState>) {
    let connection: ConnectionId = state.next_connection_id.fetch_add(1, Ordering::Relaxed);
    // By splitting, we can send and receive at the same time.
    let (sender, receiver) = stream.split();
    let (outbound, internal_receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);

    let registered = state
        .dispatcher
        .send(DispatchEvent::Connected {
            connection,
            outbound: outbound.clone(),
        })
        .await;
    if registered.is_err() {
        tracing::error!(connection, "Dispatch loop is gone, refusing connection.");
        return;
    }
    tracing::info!(connection, "Client connected.");

    let reason = handle_connection_logic(
        sender,
        receiver,
        internal_receiver,
        outbound,
        state.dispatcher.clone(),
        connection,
    )
    .await;

    tracing::info!(connection, reason, "Client disconnected.");
    let _ = state
        .dispatcher
        .send(DispatchEvent::Disconnected { connection })
        .await;
}
