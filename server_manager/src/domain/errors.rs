use std::fmt;

// Caller contract violations on a game server entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameServerError {
    // The public projection was requested for a server that isn't public.
    NotPublic,
}

impl fmt::Display for GameServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameServerError::NotPublic => {
                write!(f, "servers that are not public should not be exposed to clients")
            }
        }
    }
}

impl std::error::Error for GameServerError {}

// Failures when pushing a payload onto a control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    // The entry has no channel, or its channel isn't connected. Indicates a protocol bug.
    NotOpen,
    // The transport is between connections.
    NotConnected,
    // The channel was closed and will not reconnect.
    Closed,
    // The outbound buffer is saturated.
    BufferFull,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::NotOpen => write!(
                f,
                "tried to send a control socket message without an open socket"
            ),
            ChannelError::NotConnected => write!(f, "control socket is not connected"),
            ChannelError::Closed => write!(f, "control socket is closed"),
            ChannelError::BufferFull => write!(f, "control socket outbound buffer is full"),
        }
    }
}

impl std::error::Error for ChannelError {}
