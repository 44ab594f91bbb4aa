// Interface adapters: control socket protocol, messaging and transport.

pub mod messenger;
pub mod net;
pub mod protocol;
