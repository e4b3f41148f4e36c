//! WebSocket Session
//!
//! Persistent session with the hub over its upgraded WebSocket endpoint,
//! addressed by the domain and hub id obtained from discovery.
//!
//! The socket is opened lazily and dropped on any read or write failure, so
//! the next call transparently reconnects.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::discovery::HubIdentity;
use crate::protocol::{HubRequest, HubResponse};
use crate::transport::traits::{HubTransport, TransportError};

type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the session URL for a discovered hub
pub fn session_url(identity: &HubIdentity) -> String {
    format!(
        "ws://{}:{}/?domain={}&hubId={}",
        identity.host, identity.port, identity.domain, identity.remote_id
    )
}

/// WebSocket transport to a single hub
pub struct WebSocketSession {
    url: String,
    stream: Option<HubStream>,
    next_id: u64,
}

impl WebSocketSession {
    /// Create a session for an explicit URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
            next_id: 0,
        }
    }

    /// Create a session for a discovered hub
    pub fn for_hub(identity: &HubIdentity) -> Self {
        Self::new(session_url(identity))
    }

    /// Session URL
    pub fn url(&self) -> &str {
        &self.url
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    async fn write(&mut self, request: &HubRequest) -> Result<(), TransportError> {
        let text = serde_json::to_string(request)?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::InvalidState("Not connected".to_string()))?;

        if let Err(e) = stream.send(Message::Text(text)).await {
            self.stream = None;
            return Err(TransportError::SendFailed(e.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HubTransport for WebSocketSession {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (stream, _) = connect_async(self.url.as_str()).await.map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to connect to {}: {}", self.url, e))
        })?;

        tracing::debug!(url = %self.url, "Hub session opened");
        self.stream = Some(stream);
        Ok(())
    }

    async fn request(&mut self, mut request: HubRequest) -> Result<HubResponse, TransportError> {
        self.open().await?;

        let id = self.allocate_id();
        request.set_id(id);
        tracing::debug!(id, cmd = request.cmd(), "Sending hub request");
        self.write(&request).await?;

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::InvalidState("Not connected".to_string()))?;

        let result = await_reply(stream, id).await;
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    async fn send(&mut self, mut request: HubRequest) -> Result<(), TransportError> {
        self.open().await?;

        let id = self.allocate_id();
        request.set_id(id);
        tracing::debug!(id, cmd = request.cmd(), "Sending hub message");
        self.write(&request).await
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Error closing hub session");
            }
            tracing::debug!(url = %self.url, "Hub session closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// Read frames until the reply for `id` arrives
async fn await_reply(stream: &mut HubStream, id: u64) -> Result<HubResponse, TransportError> {
    loop {
        let frame = match stream.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
            None => return Err(TransportError::ConnectionClosed),
        };

        let reply: HubResponse = match frame {
            Message::Text(text) => match serde_json::from_str(&text) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring undecodable hub frame");
                    continue;
                }
            },
            Message::Binary(bytes) => match serde_json::from_slice(&bytes) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring undecodable hub frame");
                    continue;
                }
            },
            Message::Close(_) => return Err(TransportError::ConnectionClosed),
            _ => continue,
        };

        if reply.correlation_id() == Some(id) {
            tracing::debug!(id, code = ?reply.status_code(), "Hub reply received");
            return Ok(reply);
        }

        tracing::debug!(
            expected = id,
            got = ?reply.correlation_id(),
            "Discarding uncorrelated hub frame"
        );
    }
}
