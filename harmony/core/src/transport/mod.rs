//! Transport Layer for the Hub Session
//!
//! Provides abstraction over the channel carrying hub requests:
//! - `WebSocketSession`: persistent WebSocket session with a real hub
//! - `InProcessHub`: scripted hub answering from a closure
//!
//! # Correlation
//!
//! Both implementations stamp a fresh id on every request and hand back only
//! the reply echoing it. No listener outlives the call that created it.

pub mod in_process;
pub mod traits;
pub mod websocket;

// Re-exports for convenience
pub use in_process::{InProcessHub, RequestLog, Responder};
pub use traits::{HubTransport, TransportError};
pub use websocket::{session_url, WebSocketSession};
