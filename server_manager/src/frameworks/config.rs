use crate::domain::ServerConfig;
use crate::interface_adapters::net::ReconnectSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fmt, fs, io, time::Duration};

// Runtime/service constants.

pub const OUTBOUND_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_LOG_FILTER: &str = "info";

// LOG_FORMAT=json switches to structured output for log shippers.
pub fn json_logs() -> bool {
    matches!(env::var("LOG_FORMAT").as_deref(), Ok("json"))
}

pub fn server_list_path() -> PathBuf {
    env::var("SERVER_LIST_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("servers.toml"))
}

fn env_millis(name: &str, default: u64) -> Duration {
    let millis = env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}

pub fn reconnect_settings() -> ReconnectSettings {
    ReconnectSettings {
        min_delay: env_millis("CONTROL_SOCKET_RETRY_MIN_MS", 500),
        max_delay: env_millis("CONTROL_SOCKET_RETRY_MAX_MS", 30_000),
        outbound_capacity: OUTBOUND_CHANNEL_CAPACITY,
    }
}

pub fn status_log_interval() -> Duration {
    let secs = env::var("STATUS_LOG_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(30);
    Duration::from_secs(secs)
}

// One `[[servers]]` table in the server list file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerListEntry {
    pub id: u64,
    #[serde(flatten)]
    pub config: ServerConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ServerListFile {
    #[serde(default)]
    servers: Vec<ServerListEntry>,
}

#[derive(Debug)]
pub enum ServerListError {
    Io(io::Error),
    Parse(toml::de::Error),
    DuplicateId(u64),
}

impl fmt::Display for ServerListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerListError::Io(err) => write!(f, "failed to read server list: {err}"),
            ServerListError::Parse(err) => write!(f, "failed to parse server list: {err}"),
            ServerListError::DuplicateId(id) => write!(f, "duplicate server id {id}"),
        }
    }
}

impl std::error::Error for ServerListError {}

pub fn parse_server_list(text: &str) -> Result<Vec<ServerListEntry>, ServerListError> {
    let file: ServerListFile = toml::from_str(text).map_err(ServerListError::Parse)?;

    let mut seen = std::collections::HashSet::new();
    for entry in &file.servers {
        if !seen.insert(entry.id) {
            return Err(ServerListError::DuplicateId(entry.id));
        }
    }
    Ok(file.servers)
}

/// Reads the server list; a missing file means no servers yet.
pub fn load_server_list(path: &Path) -> Result<Vec<ServerListEntry>, ServerListError> {
    match fs::read_to_string(path) {
        Ok(text) => parse_server_list(&text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "server list not found, starting empty");
            Ok(Vec::new())
        }
        Err(e) => Err(ServerListError::Io(e)),
    }
}
