// Use cases layer: lifecycle of the game servers the manager tracks.

pub mod game_server;

#[cfg(test)]
pub(crate) mod test_support;

pub use game_server::GameServer;
