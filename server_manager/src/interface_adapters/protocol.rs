// Wire protocol for the control socket between the server manager and game servers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sent as soon as a control socket opens so the game server treats the
/// connection as a control connection rather than a player connection.
pub const INITIALIZE_CONTROL_SOCKET_MESSAGE: &str = r#"{"type":"InitializeControlSocket"}"#;

/// Envelope for every RPC frame exchanged over the control socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RpcMessage {
    // A call. Requests without an id are notifications and get no response.
    Request {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        method: String,
        #[serde(default)]
        args: Value,
    },
    // Answer to a request that carried an id.
    Response {
        id: u64,
        #[serde(default)]
        result: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Calls a game server may make on the server manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum ServerManagerRequest {
    ReportPlayerCount(i64),
}
