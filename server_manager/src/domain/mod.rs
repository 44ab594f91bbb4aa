// Domain layer: server configuration, availability rules and channel ports.

pub mod config;
pub mod errors;
pub mod ports;

// Re-export the domain boundary types and ports.
pub use config::{PublicServerJson, ServerConfig, is_available, is_valid_endpoint};
pub use errors::{ChannelError, GameServerError};
pub use ports::{
    ChannelConnector, ChannelHandlers, ControlChannel, MessageHandler, OpenHandler, OutboundSink,
};
