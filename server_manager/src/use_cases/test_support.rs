use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{ChannelConnector, ChannelError, ChannelHandlers, ControlChannel, OutboundSink};

type EventLog = Arc<Mutex<Vec<String>>>;

// Observable state of one channel handed out by the recording connector.
pub(crate) struct FakeChannelState {
    pub(crate) endpoint: String,
    connected: AtomicBool,
    closes: AtomicUsize,
    sent: Mutex<Vec<String>>,
    handlers: ChannelHandlers,
    events: EventLog,
}

impl FakeChannelState {
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl OutboundSink for FakeChannelState {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, payload: String) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        self.sent.lock().expect("sent mutex poisoned").push(payload);
        Ok(())
    }
}

struct FakeChannel(Arc<FakeChannelState>);

impl OutboundSink for FakeChannel {
    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    fn send(&self, payload: String) -> Result<(), ChannelError> {
        self.0.send(payload)
    }
}

impl ControlChannel for FakeChannel {
    fn close(&self) {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        self.0.connected.store(false, Ordering::SeqCst);
        self.0
            .events
            .lock()
            .expect("events mutex poisoned")
            .push(format!("close {}", self.0.endpoint));
    }
}

// Connector that never touches the network; tests drive transport events by hand.
#[derive(Clone)]
pub(crate) struct RecordingConnector {
    channels: Arc<Mutex<Vec<Arc<FakeChannelState>>>>,
    events: EventLog,
}

impl RecordingConnector {
    pub(crate) fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn opened_count(&self) -> usize {
        self.channels.lock().expect("channels mutex poisoned").len()
    }

    pub(crate) fn channel(&self, index: usize) -> Arc<FakeChannelState> {
        self.channels.lock().expect("channels mutex poisoned")[index].clone()
    }

    // Open and close calls in the order they happened.
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().expect("events mutex poisoned").clone()
    }

    pub(crate) fn simulate_open(&self, index: usize) {
        let state = self.channel(index);
        state.connected.store(true, Ordering::SeqCst);
        (state.handlers.on_open)(state.as_ref());
    }

    pub(crate) fn simulate_disconnect(&self, index: usize) {
        self.channel(index).connected.store(false, Ordering::SeqCst);
    }

    pub(crate) fn simulate_message(&self, index: usize, payload: &str) {
        let state = self.channel(index);
        (state.handlers.on_message)(payload);
    }
}

impl ChannelConnector for RecordingConnector {
    fn open(&self, endpoint: &str, handlers: ChannelHandlers) -> Box<dyn ControlChannel> {
        self.events
            .lock()
            .expect("events mutex poisoned")
            .push(format!("open {endpoint}"));

        let state = Arc::new(FakeChannelState {
            endpoint: endpoint.to_string(),
            connected: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            handlers,
            events: self.events.clone(),
        });
        self.channels
            .lock()
            .expect("channels mutex poisoned")
            .push(state.clone());

        Box::new(FakeChannel(state))
    }
}
