//! Current-Activity Tracker
//!
//! Answers "what is running on the hub right now" from a short-lived cache,
//! going to the hub only when the cached value is stale or a refresh is
//! forced. Reads never fail: any problem degrades to
//! [`CurrentActivity::Unknown`].

use serde_json::Value;
use tokio::time::Duration;

use crate::catalog::ActivityId;
use crate::protocol::{lenient_i64, HubRequest, HubResponse};
use crate::session::{CurrentActivity, HubSession};
use crate::transport::HubTransport;

/// How long a cached current activity is served without asking the hub
pub const FRESHNESS_WINDOW: Duration = Duration::from_millis(1500);

/// Reads and caches the hub's current activity
#[derive(Clone, Debug)]
pub struct ActivityTracker {
    window: Duration,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityTracker {
    /// Tracker with the default freshness window
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: FRESHNESS_WINDOW,
        }
    }

    /// Set the freshness window
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Freshness window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Current activity, from cache when fresh unless `force` is set
    pub async fn current<T: HubTransport>(
        &self,
        session: &HubSession<T>,
        force: bool,
    ) -> CurrentActivity {
        if !force {
            if let Some(current) = self.cached(session) {
                return current;
            }
        }

        let mut transport = session.transport().lock().await;

        // A reader that held the transport before us may have refreshed it
        if !force {
            if let Some(current) = self.cached(session) {
                return current;
            }
        }

        let result = transport
            .request(HubRequest::get_current_activity(session.hub_id()))
            .await;
        drop(transport);

        let current = match result {
            Ok(reply) => decode_current(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "Current activity refresh failed");
                CurrentActivity::Unknown
            }
        };

        session.with_state(|state| state.record(current));
        tracing::debug!(?current, force, "Current activity refreshed");
        current
    }

    fn cached<T: HubTransport>(&self, session: &HubSession<T>) -> Option<CurrentActivity> {
        let state = session.snapshot();
        if !state.is_fresh(self.window) {
            return None;
        }
        tracing::debug!(current = ?state.current, "Current activity served from cache");
        Some(state.current)
    }
}

fn decode_current(reply: &HubResponse) -> CurrentActivity {
    match reply.status_code() {
        Some(200 | 100) => {}
        code => {
            tracing::warn!(?code, msg = ?reply.message(), "Unexpected current activity reply");
            return CurrentActivity::Unknown;
        }
    }

    match reply
        .payload()
        .and_then(|data| data.get("result"))
        .and_then(lenient_i64)
    {
        Some(id) => CurrentActivity::from_id(ActivityId(id)),
        None => {
            let data = reply.payload().unwrap_or(&Value::Null);
            tracing::warn!(
                %data,
                "Current activity reply without a usable result"
            );
            CurrentActivity::Unknown
        }
    }
}
