//! Does all communication related stuff with the web socket. Frames are JSON text messages
//! as defined in [`protocol`].

use ewebsock::WsEvent::{Closed, Error, Message, Opened};
use ewebsock::{WsMessage, WsReceiver, WsSender};
use protocol::{ClientMessage, ServerMessage};

/// The open connection to the relay server. Dropping it closes the socket.
pub struct ConnectionInformation {
    sender: WsSender,
    receiver: WsReceiver,
}

impl ConnectionInformation {
    /// Initiates the connection phase.
    pub fn start_connecting(url: &str) -> Result<ConnectionInformation, String> {
        let options = ewebsock::Options::default();
        let (sender, receiver) = ewebsock::connect(url, options)
            .map_err(|error| format!("Could not reach websocket api: {error}"))?;
        Ok(ConnectionInformation { sender, receiver })
    }

    /// Returns true as soon as the socket is open and messages may be sent.
    pub fn poll_opened(&mut self) -> Result<bool, String> {
        loop {
            match self.receiver.try_recv() {
                Some(Opened) => return Ok(true),
                Some(Closed) => return Err("Connection closed by server".to_string()),
                Some(Error(context)) => return Err(context),
                Some(Message(_)) => continue,
                None => return Ok(false),
            }
        }
    }

    /// Sends one message as a text frame.
    pub fn send_message(&mut self, message: &ClientMessage) -> Result<(), String> {
        let text = message
            .to_json()
            .map_err(|error| format!("Could not encode message: {error}"))?;
        self.sender.send(WsMessage::Text(text));
        Ok(())
    }

    /// Gets all messages that arrived since the last call. Frames that do not parse are
    /// skipped, a closed or failed socket is an error.
    pub fn receive_messages(&mut self) -> Result<Vec<ServerMessage>, String> {
        let mut result = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Some(Message(WsMessage::Text(text))) => match ServerMessage::from_json(&text) {
                    Ok(message) => result.push(message),
                    Err(error) => {
                        tracing::warn!(%error, frame = %text, "Dropping unreadable server frame.")
                    }
                },
                Some(Closed) => return Err("Connection closed by server".to_string()),
                Some(Error(context)) => return Err(context),
                Some(_) => continue, // Binary, ping and pong frames carry nothing for us.
                None => return Ok(result),
            }
        }
    }
}
