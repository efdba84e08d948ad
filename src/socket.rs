use std::{pin::Pin, sync::{Arc, Weak}, task::{Context, Poll}, time::Duration};

use tokio::{net::TcpStream, sync::mpsc::UnboundedReceiver, time::{sleep_until, timeout, Instant}};
use tokio_tungstenite::{connect_async, tungstenite::{handshake::client::Request, Message}, MaybeTlsStream, WebSocketStream};
use futures::{ready, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    config::ProtocolVersion,
    dispatch,
    error::SocketError,
    events::ClientEvent,
    model::gateway::IncomingPayload,
    msg::ToSocketMessage,
    node::{ConnectionState, Node, Reconnect},
    Shared
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// A websocket client to a node.
pub(crate) struct Socket {
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    close: Option<(u16, String)>
}

impl Socket {
    pub fn new() -> Self {
        Self {
            stream: None,
            close: None
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub async fn connect(&mut self, request: Request) -> Result<(), SocketError> {
        let (connection, _) = timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| SocketError::Timeout)??;

        self.stream = Some(connection);
        self.close = None;

        Ok(())
    }

    pub async fn send(&mut self, payload: &Value) -> Result<(), SocketError> {
        if let Some(stream) = self.stream.as_mut() {
            stream.send(Message::Text(payload.to_string())).await?;
        }

        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }

    /// Close code and reason of the last closure, if the node sent them.
    pub fn take_close(&mut self) -> Option<(u16, String)> {
        self.close.take()
    }
}

impl Stream for Socket {
    type Item = Result<IncomingPayload, SocketError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let Some(socket) = this.stream.as_mut() else { return Poll::Ready(None) };

            let msg = match ready!(Pin::new(socket).poll_next(cx)) {
                None => {
                    this.stream = None;
                    return Poll::Ready(None);
                },
                Some(Err(e)) => {
                    warn!("Disconnected from node, error: {e}");
                    this.stream = None;
                    return Poll::Ready(Some(Err(From::from(e))));
                },
                Some(Ok(msg)) => msg
            };

            match msg {
                Message::Text(t) => return Poll::Ready(Some(IncomingPayload::parse(&t).map_err(From::from))),
                Message::Close(frame) => {
                    this.close = frame.map(|f| (u16::from(f.code), f.reason.into_owned()));
                    this.stream = None;
                    return Poll::Ready(None);
                },
                _ => continue
            }
        }
    }
}

enum Action {
    Command(Option<ToSocketMessage>),
    Incoming(Option<Result<IncomingPayload, SocketError>>),
    Reconnect
}

/// Task owning the control channel of a node.
pub(crate) struct NodeRunner {
    node: Arc<Node>,
    shared: Weak<Shared>,
    socket: Socket,
    receiver: UnboundedReceiver<ToSocketMessage>,
    reconnect_at: Option<Instant>,
    connected_before: bool
}

impl NodeRunner {
    pub fn new(node: Arc<Node>, shared: Weak<Shared>, receiver: UnboundedReceiver<ToSocketMessage>) -> Self {
        Self {
            node,
            shared,
            socket: Socket::new(),
            receiver,
            reconnect_at: None,
            connected_before: false
        }
    }

    pub async fn run(mut self) {
        loop {
            let connected = self.socket.is_connected();
            let deadline = self.reconnect_at;

            let action = tokio::select! {
                command = self.receiver.recv() => Action::Command(command),
                item = self.socket.next(), if connected => Action::Incoming(item),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Action::Reconnect
            };

            match action {
                Action::Command(None) | Action::Command(Some(ToSocketMessage::Kill)) => {
                    self.reconnect_at = None;
                    self.disconnect().await;
                    break;
                },
                Action::Command(Some(ToSocketMessage::Connect)) => {
                    self.reconnect_at = None;
                    if self.node.state() == ConnectionState::Disconnected {
                        self.node.reset_attempts();
                    }
                    self.connect().await;
                },
                Action::Command(Some(ToSocketMessage::Disconnect)) => {
                    self.reconnect_at = None;
                    self.disconnect().await;
                },
                Action::Command(Some(ToSocketMessage::Send(payload))) => self.send(payload).await,
                Action::Incoming(Some(Ok(payload))) => self.dispatch(payload),
                Action::Incoming(Some(Err(SocketError::Deserialize(e)))) => {
                    warn!("Failed to decode message from node {}: {e}", self.node.id());
                },
                Action::Incoming(_) => self.on_closed(),
                Action::Reconnect => {
                    self.reconnect_at = None;
                    self.connect().await;
                }
            }
        }

        debug!("Socket task of node {} finished", self.node.id());
    }

    fn emit(&self, event: ClientEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.events.emit(event);
        }
    }

    async fn connect(&mut self) {
        if self.node.state() != ConnectionState::Disconnected {
            return;
        }

        let Some(shared) = self.shared.upgrade() else { return };
        let user_id = *shared.user_id.read();
        drop(shared);
        let request = match self.node.request(user_id) {
            Ok(r) => r,
            Err(e) => {
                error!("Invalid connection parameters for node {}: {e}", self.node.id());
                self.emit(ClientEvent::NodeError { node: self.node.id().to_string(), error: e.to_string() });
                return;
            }
        };

        self.node.set_state(ConnectionState::Connecting);
        info!("Connecting to node {} at {}", self.node.id(), self.node.config().ws_url());

        match self.socket.connect(request).await {
            Ok(()) => self.on_open().await,
            Err(e) => {
                warn!("Failed to connect to node {}: {e}", self.node.id());
                self.node.set_state(ConnectionState::Disconnected);
                self.emit(ClientEvent::NodeError { node: self.node.id().to_string(), error: e.to_string() });
                self.schedule_reconnect();
            }
        }
    }

    async fn on_open(&mut self) {
        self.node.set_state(ConnectionState::Ready);
        self.node.reset_attempts();
        info!("Connected to node {}", self.node.id());
        self.emit(ClientEvent::NodeConnect { node: self.node.id().to_string() });

        if self.node.version() == ProtocolVersion::V3 {
            if let Some(payload) = self.node.resume_payload() {
                self.send(payload).await;
            }

            if self.connected_before {
                if let Some(shared) = self.shared.upgrade() {
                    dispatch::resync_players(&shared, &self.node);
                }
            }
        }

        self.connected_before = true;
    }

    async fn send(&mut self, payload: Value) {
        if self.node.state() != ConnectionState::Ready {
            return;
        }

        if let Err(e) = self.socket.send(&payload).await {
            warn!("Failed to send message to node {}: {e}", self.node.id());
        }
    }

    fn dispatch(&self, payload: IncomingPayload) {
        if let Some(shared) = self.shared.upgrade() {
            dispatch::dispatch(&shared, &self.node, payload);
        }
    }

    /// Handles a closure not requested by the client.
    fn on_closed(&mut self) {
        let (code, reason) = match self.socket.take_close() {
            Some((code, reason)) => (Some(code), reason),
            None => (None, String::from("connection lost"))
        };

        warn!("Node {} disconnected (code: {code:?}, reason: {reason})", self.node.id());
        self.node.set_state(ConnectionState::Disconnected);
        if !self.node.auto_resume() {
            self.node.set_session(None);
        }

        self.emit(ClientEvent::NodeDisconnect { node: self.node.id().to_string(), code, reason });
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.node.record_unexpected_close() {
            Reconnect::After(delay) => {
                info!(
                    "Reconnecting to node {} in {delay:?} (attempt {})",
                    self.node.id(),
                    self.node.attempts()
                );
                self.reconnect_at = Some(Instant::now() + delay);
            },
            Reconnect::GiveUp(attempts) => {
                error!("Node {} failed after {attempts} attempts, not reconnecting", self.node.id());
                self.emit(ClientEvent::NodeFailure { node: self.node.id().to_string(), attempts });
            }
        }
    }

    async fn disconnect(&mut self) {
        let was_connected = self.socket.is_connected();

        self.socket.close().await;
        self.node.set_state(ConnectionState::Disconnected);
        self.node.set_session(None);

        if was_connected {
            info!("Disconnected from node {}", self.node.id());
            self.emit(ClientEvent::NodeDisconnect {
                node: self.node.id().to_string(),
                code: Some(1000),
                reason: String::from("disconnected by client")
            });
        }
    }
}
