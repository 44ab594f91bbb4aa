use crate::domain::errors::ChannelError;

// The entry depends on these traits, not on the websocket adapter.
// Dependencies point inwards to the domain layer.

/// Anything a control socket payload can be written to.
pub trait OutboundSink: Send + Sync {
    fn is_connected(&self) -> bool;
    fn send(&self, payload: String) -> Result<(), ChannelError>;
}

/// A self-reconnecting connection to one game server.
///
/// Implementations start connecting as soon as they are opened and keep
/// retrying on their own until [`ControlChannel::close`] is called.
pub trait ControlChannel: OutboundSink {
    /// Stops reconnecting and releases the connection. Must be idempotent.
    fn close(&self);
}

pub type OpenHandler = Box<dyn Fn(&dyn OutboundSink) + Send + Sync>;
pub type MessageHandler = Box<dyn Fn(&str) + Send + Sync>;

// Callbacks registered once when a channel is created.
pub struct ChannelHandlers {
    // Runs every time the transport (re)connects, before any message callback.
    pub on_open: OpenHandler,
    // Receives each inbound text payload.
    pub on_message: MessageHandler,
}

/// Creates channels for entries; each call yields a new, exclusively owned channel.
pub trait ChannelConnector: Send + Sync {
    fn open(&self, endpoint: &str, handlers: ChannelHandlers) -> Box<dyn ControlChannel>;
}
