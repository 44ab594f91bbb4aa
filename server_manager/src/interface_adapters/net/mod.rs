// Network adapters for talking to game servers.

pub mod persistent_socket;

pub use persistent_socket::{PersistentWebSocket, ReconnectSettings, WebSocketConnector};
