//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for the live statistics channel.

use serde::Serialize;

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// Client frames are ignored apart from Close; the channel is push-only.
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// The number of currently open connections.
    ConnectionsCounter { value: usize },
}
