use serde::{Deserialize, Serialize};
use url::Url;

// Publish configuration for one remote game server, as edited by the admin side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    // Whether the server may be listed for clients at all.
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub official: bool,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default)]
    pub display_name: String,
    // Control socket address of the game server. Stored verbatim, may be malformed.
    #[serde(default)]
    pub endpoint: String,
}

/// Data about a server that is safe to hand to untrusted clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicServerJson {
    pub display_name: String,
    pub endpoint: String,
    pub official: bool,
    pub player_count: i64,
}

/// Returns true when the endpoint parses as an absolute URL.
pub fn is_valid_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint).is_ok()
}

/// A server is joinable only when it is public and its control socket is up.
///
/// `channel_connected` is `None` when no channel exists.
pub fn is_available(public: bool, valid_endpoint: bool, channel_connected: Option<bool>) -> bool {
    if !public || !valid_endpoint {
        return false;
    }
    channel_connected.unwrap_or(false)
}
