// A single remote game server as seen by the server manager.

use crate::domain::{
    ChannelConnector, ChannelError, ChannelHandlers, ControlChannel, GameServerError,
    OutboundSink, PublicServerJson, ServerConfig, is_available, is_valid_endpoint,
};
use crate::interface_adapters::messenger::{MessengerError, PendingResponse, TypedMessenger};
use crate::interface_adapters::protocol::{
    INITIALIZE_CONTROL_SOCKET_MESSAGE, ServerManagerRequest,
};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, warn};

/// Publish configuration plus the control socket of one game server.
///
/// Config changes take `&mut self`; hosts that share an entry between tasks
/// must put it behind a mutex so endpoint swaps never interleave.
pub struct GameServer {
    id: u64,
    config: ServerConfig,
    valid_endpoint: bool,
    connector: Arc<dyn ChannelConnector>,
    control: Arc<ControlSocket>,
}

// State reachable from channel callbacks. Callbacks only hold a `Weak` to it,
// so a live channel never keeps its owner around.
struct ControlSocket {
    server_id: u64,
    channel: Mutex<Option<Box<dyn ControlChannel>>>,
    // Bumped whenever the current channel is closed; callbacks of older
    // channels compare against it and go quiet.
    generation: AtomicU64,
    player_count: AtomicI64,
    messenger: TypedMessenger<ServerManagerRequest>,
}

impl ControlSocket {
    fn new(server_id: u64) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ControlSocket>| {
            let mut messenger = TypedMessenger::<ServerManagerRequest>::new();

            let handler_ref = weak.clone();
            messenger.set_request_handler(move |request| {
                if let Some(control) = handler_ref.upgrade() {
                    control.handle_request(request);
                }
                Value::Null
            });

            let send_ref = weak.clone();
            messenger.set_send_handler(move |payload| match send_ref.upgrade() {
                Some(control) => control.send_raw(payload),
                None => Err(ChannelError::NotOpen),
            });

            ControlSocket {
                server_id,
                channel: Mutex::new(None),
                generation: AtomicU64::new(0),
                player_count: AtomicI64::new(0),
                messenger,
            }
        })
    }

    fn handle_request(&self, request: ServerManagerRequest) {
        match request {
            ServerManagerRequest::ReportPlayerCount(count) => self.update_player_count(count),
        }
    }

    fn update_player_count(&self, count: i64) {
        self.player_count.store(count, Ordering::Relaxed);
    }

    fn channel(&self) -> MutexGuard<'_, Option<Box<dyn ControlChannel>>> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Reads the current channel at call time so a replaced channel is never used.
    fn send_raw(&self, payload: String) -> Result<(), ChannelError> {
        let channel = self.channel();
        match channel.as_ref() {
            Some(channel) if channel.is_connected() => channel.send(payload),
            _ => {
                error!(
                    server_id = self.server_id,
                    "tried to send a control socket message without an open socket"
                );
                Err(ChannelError::NotOpen)
            }
        }
    }

    fn channel_connected(&self) -> Option<bool> {
        self.channel().as_ref().map(|channel| channel.is_connected())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn close_channel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        // Take it out first so the lock isn't held while the transport shuts down.
        let previous = self.channel().take();
        if let Some(channel) = previous {
            channel.close();
            debug!(server_id = self.server_id, "control socket closed");
        }

        let rejected = self.messenger.reject_pending("control socket closed");
        if rejected > 0 {
            debug!(server_id = self.server_id, rejected, "rejected in-flight requests");
        }
    }

    // Handlers for the channel about to be opened. Must be built after the
    // previous channel was closed.
    fn handlers(self: &Arc<Self>) -> ChannelHandlers {
        let server_id = self.server_id;
        let generation = self.generation.load(Ordering::SeqCst);
        let open_ref = Arc::downgrade(self);
        let message_ref = Arc::downgrade(self);

        ChannelHandlers {
            on_open: Box::new(move |socket: &dyn OutboundSink| {
                let current = open_ref
                    .upgrade()
                    .is_some_and(|control| control.is_current(generation));
                if !current {
                    return;
                }
                info!(server_id, "control socket open, sending handshake");
                if let Err(e) = socket.send(INITIALIZE_CONTROL_SOCKET_MESSAGE.to_string()) {
                    warn!(server_id, error = %e, "failed to send control socket handshake");
                }
            }),
            on_message: Box::new(move |payload: &str| {
                let Some(control) = message_ref.upgrade() else {
                    return;
                };
                if !control.is_current(generation) {
                    debug!(server_id, "dropping message from a replaced control socket");
                    return;
                }
                if let Err(e) = control.messenger.handle_received_message(payload) {
                    error!(server_id, error = %e, "failed to handle control socket message");
                }
            }),
        }
    }
}

impl GameServer {
    pub fn new(id: u64, connector: Arc<dyn ChannelConnector>) -> Self {
        Self {
            id,
            config: ServerConfig::default(),
            valid_endpoint: false,
            connector,
            control: ControlSocket::new(id),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// True when the server should be joinable by the public.
    ///
    /// False when the public flag is off or the control socket to this game
    /// server isn't connected.
    pub fn available(&self) -> bool {
        is_available(
            self.config.public,
            self.valid_endpoint,
            self.control.channel_connected(),
        )
    }

    pub fn player_count(&self) -> i64 {
        self.control.player_count.load(Ordering::Relaxed)
    }

    /// Projection handed to untrusted clients.
    ///
    /// Callers must check visibility first; asking for a non-public server is a bug.
    pub fn public_json(&self) -> Result<PublicServerJson, GameServerError> {
        if !self.config.public {
            return Err(GameServerError::NotPublic);
        }
        Ok(PublicServerJson {
            display_name: self.config.display_name.clone(),
            endpoint: self.config.endpoint.clone(),
            official: self.config.official,
            player_count: self.player_count(),
        })
    }

    /// Full configuration, including fields that aren't public. Trusted callers only.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[tracing::instrument(
        name = "set_config",
        skip_all,
        fields(server_id = self.id, public = config.public)
    )]
    pub fn set_config(&mut self, config: ServerConfig) {
        // Literal comparison; equivalent URLs that differ textually still reconnect.
        let endpoint_changed = config.endpoint != self.config.endpoint;
        self.config = config;

        if endpoint_changed {
            self.valid_endpoint = is_valid_endpoint(&self.config.endpoint);
            if !self.valid_endpoint && !self.config.endpoint.is_empty() {
                warn!(endpoint = %self.config.endpoint, "invalid game server endpoint");
            }
            self.refresh_control_socket();
        }
    }

    pub fn update_player_count(&self, count: i64) {
        self.control.update_player_count(count);
    }

    /// Calls a method on the game server over the control socket.
    ///
    /// Fails immediately with [`ChannelError::NotOpen`] when the socket isn't connected.
    pub fn send_request(&self, method: &str, args: Value) -> Result<PendingResponse, MessengerError> {
        self.control.messenger.send_request(method, args)
    }

    /// Fire-and-forget call; the game server sends no response.
    pub fn send_notification(&self, method: &str, args: Value) -> Result<(), MessengerError> {
        self.control.messenger.send_notification(method, args)
    }

    /// Closes the control socket and fails requests still waiting on it.
    /// Safe to call more than once.
    pub fn dispose(&mut self) {
        self.control.close_channel();
    }

    fn refresh_control_socket(&mut self) {
        // Old channel is closed before a new one exists.
        self.control.close_channel();

        if !self.valid_endpoint {
            return;
        }

        info!(endpoint = %self.config.endpoint, "opening control socket");
        let channel = self
            .connector
            .open(&self.config.endpoint, self.control.handlers());
        *self.control.channel() = Some(channel);
    }
}

impl Drop for GameServer {
    fn drop(&mut self) {
        self.dispose();
    }
}
