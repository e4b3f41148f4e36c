//! In-Process Hub
//!
//! Scripted stand-in for a real hub, driven by a responder closure.
//! Used when the engine runs without network access: tests, demos and
//! embedders that replay recorded hub traffic.
//!
//! # Usage
//!
//! ```ignore
//! let hub = InProcessHub::new(|request| {
//!     Ok(HubResponse::with_code(200).msg("OK"))
//! });
//! let log = hub.log();
//!
//! // hand `hub` to the platform, inspect `log` afterwards
//! assert_eq!(log.count(CMD_RUN_ACTIVITY), 1);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::protocol::{HubRequest, HubResponse};

use super::traits::{HubTransport, TransportError};

/// Produces the reply for a request
pub type Responder = Box<dyn FnMut(&HubRequest) -> Result<HubResponse, TransportError> + Send>;

/// Shared record of every request the hub received
#[derive(Clone, Default)]
pub struct RequestLog {
    requests: Arc<Mutex<Vec<HubRequest>>>,
}

impl RequestLog {
    fn record(&self, request: &HubRequest) {
        self.requests.lock().push(request.clone());
    }

    /// All requests so far, in arrival order
    pub fn requests(&self) -> Vec<HubRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests carrying `cmd`
    pub fn count(&self, cmd: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.cmd() == cmd).count()
    }

    /// Total number of requests
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    /// Whether no request has arrived yet
    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }

    /// Forget recorded requests
    pub fn clear(&self) {
        self.requests.lock().clear();
    }
}

/// Hub transport answering from a closure
pub struct InProcessHub {
    responder: Responder,
    log: RequestLog,
    open: bool,
    next_id: u64,
}

impl InProcessHub {
    /// Create a hub that answers every request with `responder`
    #[must_use]
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&HubRequest) -> Result<HubResponse, TransportError> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            log: RequestLog::default(),
            open: false,
            next_id: 0,
        }
    }

    /// Handle on the request log, usable after the hub is moved
    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }

    fn exchange(&mut self, mut request: HubRequest) -> Result<HubResponse, TransportError> {
        self.open = true;
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        request.set_id(id);
        self.log.record(&request);

        let reply = (self.responder)(&request)?;
        Ok(match reply.correlation_id() {
            Some(_) => reply,
            None => reply.correlated(id),
        })
    }
}

#[async_trait]
impl HubTransport for InProcessHub {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.open = true;
        Ok(())
    }

    async fn request(&mut self, request: HubRequest) -> Result<HubResponse, TransportError> {
        self.exchange(request)
    }

    async fn send(&mut self, request: HubRequest) -> Result<(), TransportError> {
        self.exchange(request).map(|_| ())
    }

    async fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
