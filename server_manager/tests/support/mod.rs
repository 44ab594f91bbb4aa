// Stand-in game server that speaks the control socket protocol over a real WebSocket.
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubEvent {
    // Text frame received from the server manager.
    Message(String),
    // The server manager side closed the connection.
    Closed,
}

enum StubCommand {
    Send(String),
    Disconnect,
}

pub struct StubGameServer {
    pub url: String,
    events: mpsc::UnboundedReceiver<StubEvent>,
    commands: mpsc::UnboundedSender<StubCommand>,
}

impl StubGameServer {
    // Bind an ephemeral port and serve one control connection at a time.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral test port");
        let addr = listener.local_addr().expect("get local addr");
        let (events_tx, events) = mpsc::unbounded_channel();
        let (commands, mut commands_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(tcp).await else {
                    continue;
                };

                loop {
                    tokio::select! {
                        inbound = ws.next() => match inbound {
                            Some(Ok(Message::Text(text))) => {
                                let _ = events_tx.send(StubEvent::Message(text.as_str().to_string()));
                            }
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                                let _ = events_tx.send(StubEvent::Closed);
                                break;
                            }
                            Some(Ok(_)) => {}
                        },
                        command = commands_rx.recv() => match command {
                            Some(StubCommand::Send(payload)) => {
                                let _ = ws.send(Message::text(payload)).await;
                            }
                            Some(StubCommand::Disconnect) => {
                                let _ = ws.close(None).await;
                                break;
                            }
                            None => return,
                        },
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}/control"),
            events,
            commands,
        }
    }

    pub fn send(&self, payload: &str) {
        self.commands
            .send(StubCommand::Send(payload.to_string()))
            .expect("stub server task should be running");
    }

    pub fn disconnect(&self) {
        self.commands
            .send(StubCommand::Disconnect)
            .expect("stub server task should be running");
    }

    // Next event from the stub, failing the test if none arrives in time.
    pub async fn next_event(&mut self) -> StubEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for stub event")
            .expect("stub event channel closed")
    }
}

// Poll a condition until it holds or the deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition did not become true in time");
}

