// Typed request/response messaging layered on top of a raw text transport.

use crate::domain::ChannelError;
use crate::interface_adapters::protocol::RpcMessage;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

pub type RequestHandler<Req> = Box<dyn Fn(Req) -> Value + Send + Sync>;
pub type SendHandler = Box<dyn Fn(String) -> Result<(), ChannelError> + Send + Sync>;
pub type RpcResult = Result<Value, String>;
pub type PendingResponse = oneshot::Receiver<RpcResult>;

#[derive(Debug)]
pub enum MessengerError {
    // Inbound payload isn't a valid RPC frame.
    Decode(serde_json::Error),
    Encode(serde_json::Error),
    // Request names a method (or arguments) no handler understands.
    UnknownRequest {
        method: String,
        source: serde_json::Error,
    },
    // Response for an id we never sent or already resolved.
    UnknownResponse(u64),
    MissingRequestHandler,
    MissingSendHandler,
    Send(ChannelError),
}

impl fmt::Display for MessengerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessengerError::Decode(err) => write!(f, "failed to decode rpc message: {err}"),
            MessengerError::Encode(err) => write!(f, "failed to encode rpc message: {err}"),
            MessengerError::UnknownRequest { method, source } => {
                write!(f, "unhandled rpc request {method}: {source}")
            }
            MessengerError::UnknownResponse(id) => {
                write!(f, "received response for unknown request id {id}")
            }
            MessengerError::MissingRequestHandler => write!(f, "no request handler registered"),
            MessengerError::MissingSendHandler => write!(f, "no send handler registered"),
            MessengerError::Send(err) => write!(f, "failed to send rpc message: {err}"),
        }
    }
}

impl std::error::Error for MessengerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MessengerError::Decode(err) | MessengerError::Encode(err) => Some(err),
            MessengerError::UnknownRequest { source, .. } => Some(source),
            MessengerError::Send(err) => Some(err),
            _ => None,
        }
    }
}

/// Routes inbound requests to a typed handler and matches responses to
/// outbound requests by id.
///
/// `Req` is a serde enum tagged by `method` with its arguments under `args`.
pub struct TypedMessenger<Req> {
    request_handler: Option<RequestHandler<Req>>,
    send_handler: Option<SendHandler>,
    pending: Mutex<HashMap<u64, oneshot::Sender<RpcResult>>>,
    next_request_id: AtomicU64,
}

impl<Req> Default for TypedMessenger<Req> {
    fn default() -> Self {
        Self {
            request_handler: None,
            send_handler: None,
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
        }
    }
}

impl<Req: DeserializeOwned> TypedMessenger<Req> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_request_handler(&mut self, handler: impl Fn(Req) -> Value + Send + Sync + 'static) {
        self.request_handler = Some(Box::new(handler));
    }

    pub fn set_send_handler(
        &mut self,
        handler: impl Fn(String) -> Result<(), ChannelError> + Send + Sync + 'static,
    ) {
        self.send_handler = Some(Box::new(handler));
    }

    /// Sends a request and returns a receiver that resolves with the remote result.
    pub fn send_request(
        &self,
        method: &str,
        args: Value,
    ) -> Result<PendingResponse, MessengerError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);

        let message = RpcMessage::Request {
            id: Some(id),
            method: method.to_string(),
            args,
        };
        if let Err(e) = self.send(&message) {
            self.pending().remove(&id);
            return Err(e);
        }
        Ok(rx)
    }

    pub fn send_notification(&self, method: &str, args: Value) -> Result<(), MessengerError> {
        self.send(&RpcMessage::Request {
            id: None,
            method: method.to_string(),
            args,
        })
    }

    /// Decodes one inbound frame and dispatches it.
    pub fn handle_received_message(&self, raw: &str) -> Result<(), MessengerError> {
        let message: RpcMessage = serde_json::from_str(raw).map_err(MessengerError::Decode)?;

        match message {
            RpcMessage::Request { id, method, args } => {
                let handler = self
                    .request_handler
                    .as_ref()
                    .ok_or(MessengerError::MissingRequestHandler)?;

                let request = match serde_json::from_value::<Req>(
                    json!({ "method": method, "args": args }),
                ) {
                    Ok(request) => request,
                    Err(source) => {
                        // Let the caller know instead of leaving it waiting forever.
                        if let Some(id) = id {
                            self.send(&RpcMessage::Response {
                                id,
                                result: Value::Null,
                                error: Some(format!("unknown method {method}")),
                            })?;
                        }
                        return Err(MessengerError::UnknownRequest { method, source });
                    }
                };

                let result = handler(request);
                if let Some(id) = id {
                    self.send(&RpcMessage::Response {
                        id,
                        result,
                        error: None,
                    })?;
                }
                Ok(())
            }
            RpcMessage::Response { id, result, error } => {
                let waiter = self
                    .pending()
                    .remove(&id)
                    .ok_or(MessengerError::UnknownResponse(id))?;
                let outcome = match error {
                    Some(message) => Err(message),
                    None => Ok(result),
                };
                // The requester may have stopped waiting.
                let _ = waiter.send(outcome);
                Ok(())
            }
        }
    }

    /// Fails every request still waiting for a response.
    ///
    /// Used when the transport the requests went out on is gone; their
    /// responses can no longer arrive.
    pub fn reject_pending(&self, reason: &str) -> usize {
        let waiters: Vec<_> = self.pending().drain().map(|(_, waiter)| waiter).collect();
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(Err(reason.to_string()));
        }
        count
    }

    fn send(&self, message: &RpcMessage) -> Result<(), MessengerError> {
        let handler = self
            .send_handler
            .as_ref()
            .ok_or(MessengerError::MissingSendHandler)?;
        let payload = serde_json::to_string(message).map_err(MessengerError::Encode)?;
        handler(payload).map_err(MessengerError::Send)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<RpcResult>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
