//! Transport Traits
//!
//! The single seam between the hub engine and the channel carrying requests.
//!
//! Every hub exchange goes through [`HubTransport::request`]: one request in,
//! exactly one correlated reply out. Implementations own correlation, so
//! callers never attach or detach listeners themselves.

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::{HubRequest, HubResponse};

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Channel to the hub could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Channel was closed while waiting for a reply
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to write a request
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to read a reply
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Request could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport not in expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Request/response channel to the hub
///
/// Failures surface as [`TransportError`] and are never retried here; retry
/// policy belongs to the dispatcher.
#[async_trait]
pub trait HubTransport: Send {
    /// Establish the channel, reusing it if already open
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Send a request and wait for the reply carrying the same correlation id
    ///
    /// The transport assigns the id. Replies for other ids are discarded.
    async fn request(&mut self, request: HubRequest) -> Result<HubResponse, TransportError>;

    /// Send a request without waiting for any reply
    async fn send(&mut self, request: HubRequest) -> Result<(), TransportError>;

    /// Drop the channel
    async fn close(&mut self);

    /// Whether the channel is currently open
    fn is_open(&self) -> bool;
}
