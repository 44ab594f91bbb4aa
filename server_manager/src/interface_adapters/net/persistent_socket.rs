use crate::domain::{ChannelConnector, ChannelError, ChannelHandlers, ControlChannel, OutboundSink};

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

/// Retry timing for dropped or refused connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectSettings {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound for the exponential backoff.
    pub max_delay: Duration,
    /// Capacity of the per-socket outbound buffer.
    pub outbound_capacity: usize,
}

impl ReconnectSettings {
    /// Delay before retry number `attempt` (starting at 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.min_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

// State shared between the socket handle and its connection task.
struct SocketShared {
    connected: AtomicBool,
    closed: AtomicBool,
    outbound_tx: mpsc::Sender<String>,
}

impl OutboundSink for SocketShared {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, payload: String) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        // Never queue for a future connection.
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        self.outbound_tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::BufferFull,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

enum SessionEnd {
    Shutdown,
    Dropped(String),
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket that keeps reconnecting to its endpoint until closed.
pub struct PersistentWebSocket {
    endpoint: String,
    shared: Arc<SocketShared>,
    shutdown_tx: watch::Sender<bool>,
}

impl PersistentWebSocket {
    /// Starts connecting right away on the given runtime.
    pub fn connect(
        runtime: &Handle,
        endpoint: impl Into<String>,
        handlers: ChannelHandlers,
        settings: ReconnectSettings,
    ) -> Self {
        let endpoint = endpoint.into();
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(settings.outbound_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(SocketShared {
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            outbound_tx,
        });

        runtime.spawn(socket_task(
            endpoint.clone(),
            shared.clone(),
            handlers,
            outbound_rx,
            shutdown_rx,
            settings,
        ));

        Self {
            endpoint,
            shared,
            shutdown_tx,
        }
    }
}

impl OutboundSink for PersistentWebSocket {
    fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    fn send(&self, payload: String) -> Result<(), ChannelError> {
        self.shared.send(payload)
    }
}

impl ControlChannel for PersistentWebSocket {
    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        // The task may already be gone; nothing to wake in that case.
        self.shutdown_tx.send_replace(true);
        debug!(endpoint = %self.endpoint, "persistent socket closed");
    }
}

impl Drop for PersistentWebSocket {
    fn drop(&mut self) {
        self.close();
    }
}

async fn socket_task(
    endpoint: String,
    shared: Arc<SocketShared>,
    handlers: ChannelHandlers,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
    settings: ReconnectSettings,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let connect = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            result = connect_async(endpoint.as_str()) => result,
        };

        match connect {
            Ok((mut stream, _response)) => {
                attempt = 0;
                // Anything still buffered belongs to the previous connection.
                while outbound_rx.try_recv().is_ok() {}

                // Closed while the handshake was in flight.
                if shared.closed.load(Ordering::SeqCst) {
                    let _ = stream.close(None).await;
                    break;
                }
                shared.connected.store(true, Ordering::SeqCst);
                info!(%endpoint, "persistent socket connected");
                (handlers.on_open)(shared.as_ref());

                let end = run_session(stream, &shared, &handlers, &mut outbound_rx, &mut shutdown_rx)
                    .await;
                shared.connected.store(false, Ordering::SeqCst);

                match end {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Dropped(reason) => {
                        warn!(%endpoint, %reason, "persistent socket connection lost");
                    }
                }
            }
            Err(e) => {
                warn!(%endpoint, error = %e, attempt, "persistent socket failed to connect");
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = settings.backoff(attempt);
        debug!(%endpoint, delay_ms = delay.as_millis(), "reconnecting persistent socket");

        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    debug!(%endpoint, "persistent socket task exiting");
}

async fn run_session(
    stream: WsStream,
    shared: &SocketShared,
    handlers: &ChannelHandlers,
    outbound_rx: &mut mpsc::Receiver<String>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        // Shutdown wins over frames that are already buffered.
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                // Best-effort close frame; the peer may already be gone.
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            outbound = outbound_rx.recv() => {
                let Some(payload) = outbound else {
                    return SessionEnd::Shutdown;
                };
                if let Err(e) = write.send(Message::text(payload)).await {
                    return SessionEnd::Dropped(e.to_string());
                }
            }
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(_) | Message::Binary(_)))
                    if shared.closed.load(Ordering::SeqCst) =>
                {
                    return SessionEnd::Shutdown;
                }
                Some(Ok(Message::Text(text))) => (handlers.on_message)(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => (handlers.on_message)(text),
                    Err(_) => warn!("ignoring non-utf8 binary control socket frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    return SessionEnd::Dropped("closed by peer".to_string());
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Dropped(e.to_string()),
            },
        }
    }
}

/// Opens [`PersistentWebSocket`]s on a fixed tokio runtime.
#[derive(Clone)]
pub struct WebSocketConnector {
    runtime: Handle,
    settings: ReconnectSettings,
}

impl WebSocketConnector {
    pub fn new(runtime: Handle, settings: ReconnectSettings) -> Self {
        Self { runtime, settings }
    }
}

impl ChannelConnector for WebSocketConnector {
    fn open(&self, endpoint: &str, handlers: ChannelHandlers) -> Box<dyn ControlChannel> {
        Box::new(PersistentWebSocket::connect(
            &self.runtime,
            endpoint,
            handlers,
            self.settings,
        ))
    }
}
