//! Terminal WebSocket message types.
//!
//! Inbound messages are JSON objects tagged by `event`. Outbound traffic is
//! mostly raw process output; the only structured message is
//! `graph_ready`.

use serde::{Deserialize, Serialize};

use flowgraph_storage::{PlaygroundId, SheetId};

/// A message from the terminal client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Run a sheet. Only the first `start` on a connection is honoured.
    Start {
        #[serde(rename = "sheetId")]
        sheet_id: SheetId,
        #[serde(rename = "playgroundId")]
        playground_id: PlaygroundId,
    },
    /// Text for the running process's stdin, forwarded verbatim.
    Input { input: String },
}

impl ClientMessage {
    /// Parses a text frame; unknown or malformed messages yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Notification that the sheet's graph has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphReady {
    pub event: &'static str,
    pub sheet_id: SheetId,
    pub playground_id: PlaygroundId,
}

impl GraphReady {
    pub fn new(sheet_id: SheetId, playground_id: PlaygroundId) -> Self {
        GraphReady {
            event: "graph_ready",
            sheet_id,
            playground_id,
        }
    }
}

/// A message for the terminal client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Raw process output, status lines and setup errors.
    Output(String),
    GraphReady(GraphReady),
}

impl ServerMessage {
    /// Text sent over the socket.
    pub fn to_text(&self) -> String {
        match self {
            ServerMessage::Output(text) => text.clone(),
            ServerMessage::GraphReady(event) => {
                serde_json::to_string(event).unwrap_or_default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_messages() {
        assert_eq!(
            ClientMessage::parse(r#"{"event":"start","sheetId":"s1","playgroundId":"p1"}"#),
            Some(ClientMessage::Start {
                sheet_id: "s1".into(),
                playground_id: "p1".into(),
            })
        );
        assert_eq!(
            ClientMessage::parse(r#"{"event":"input","input":"yes\n"}"#),
            Some(ClientMessage::Input { input: "yes\n".into() })
        );
    }

    #[test]
    fn ignores_unknown_and_malformed() {
        assert_eq!(ClientMessage::parse(r#"{"event":"resize","cols":80}"#), None);
        assert_eq!(ClientMessage::parse(r#"{"event":"start"}"#), None);
        assert_eq!(ClientMessage::parse("ls -la"), None);
    }

    #[test]
    fn graph_ready_wire_format() {
        let msg = ServerMessage::GraphReady(GraphReady::new("s1".into(), "p1".into()));
        let value: serde_json::Value = serde_json::from_str(&msg.to_text()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "event": "graph_ready", "sheetId": "s1", "playgroundId": "p1" })
        );
    }
}
