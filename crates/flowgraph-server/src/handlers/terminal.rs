//! The terminal WebSocket: starts a session and relays its I/O.
//!
//! Outbound messages go through an unbounded channel to a writer task that
//! owns the socket's sink, so sessions never wait on the client. Closing the
//! connection aborts the session, which kills its process and removes its
//! workspace.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::schema::events::{ClientMessage, ServerMessage};
use crate::session::{run_session, StdinSlot};
use crate::state::AppState;

/// `GET /ws`
pub async fn terminal(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut source) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(Message::Text(msg.to_text().into())).await.is_err() {
                break;
            }
        }
    });

    let stdin = StdinSlot::default();
    let mut session = None;
    while let Some(Ok(msg)) = source.next().await {
        match msg {
            Message::Text(text) => match ClientMessage::parse(text.as_str()) {
                Some(ClientMessage::Start {
                    sheet_id,
                    playground_id,
                }) => {
                    if session.is_some() {
                        tracing::debug!("ignoring repeated start");
                        continue;
                    }
                    session = Some(tokio::spawn(run_session(
                        state.clone(),
                        sheet_id,
                        playground_id,
                        tx.clone(),
                        stdin.clone(),
                    )));
                }
                Some(ClientMessage::Input { input }) => {
                    if !stdin.forward(&input) {
                        tracing::debug!("input dropped, no running process");
                    }
                }
                None => tracing::debug!("ignoring unrecognised message"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some(session) = session {
        session.abort();
    }
    writer.abort();
    tracing::debug!("terminal connection closed");
}
