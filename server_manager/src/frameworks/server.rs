// Framework bootstrap for the server manager runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::WebSocketConnector;
use crate::use_cases::GameServer;
use std::io::Result;
use std::sync::Arc;
use tokio::runtime::Handle;

// Logging has to be up before the server list is read so load failures show.
fn init_runtime() {
    // Operators usually drop SERVER_LIST_PATH and RUST_LOG into a local .env.
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if config::json_logs() {
        subscriber.json().with_current_span(true).init();
    } else {
        subscriber.compact().init();
    }

    // Panics on a control socket task would otherwise only reach stderr.
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "server manager panicked");
    }));
}

/// Builds one entry per configured server and keeps their control sockets
/// alive until ctrl-c.
pub async fn run(servers: Vec<config::ServerListEntry>) -> Result<()> {
    let settings = config::reconnect_settings();
    tracing::debug!(
        retry_min_ms = settings.min_delay.as_millis(),
        retry_max_ms = settings.max_delay.as_millis(),
        "control socket connector configured"
    );
    let connector = Arc::new(WebSocketConnector::new(Handle::current(), settings));

    let mut game_servers: Vec<GameServer> = servers
        .into_iter()
        .map(|entry| {
            let mut server = GameServer::new(entry.id, connector.clone());
            server.set_config(entry.config);
            server
        })
        .collect();
    tracing::info!(count = game_servers.len(), "game servers loaded");

    let mut status_interval = tokio::time::interval(config::status_log_interval());
    loop {
        tokio::select! {
            _ = status_interval.tick() => log_status(&game_servers),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    tracing::info!("shutting down, closing control sockets");
    for server in &mut game_servers {
        server.dispose();
    }
    Ok(())
}

fn log_status(game_servers: &[GameServer]) {
    for server in game_servers {
        let config = server.config();
        tracing::info!(
            server_id = server.id(),
            display_name = %config.display_name,
            public = config.public,
            available = server.available(),
            player_count = server.player_count(),
            "game server status"
        );
    }
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let path = config::server_list_path();
    let servers = config::load_server_list(&path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "failed to load server list");
        std::io::Error::other(e)
    })?;

    run(servers).await
}
