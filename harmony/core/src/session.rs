//! Hub Session State
//!
//! The single owned home for everything that changes while the bridge runs:
//! the transport, the cached current activity and the switch bookkeeping.
//! Tracker and dispatcher borrow it; nothing lives in ambient globals.
//!
//! # Locking
//!
//! - `transport`: async mutex, held for the length of one hub exchange
//! - `state`: sync mutex, never held across an `.await`

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{Duration, Instant};

use crate::catalog::ActivityId;
use crate::transport::HubTransport;

/// Cached current activity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CurrentActivity {
    /// No refresh has succeeded yet, or the last one failed
    #[default]
    Unknown,
    /// Hub reports everything off
    Off,
    /// Hub reports this activity running
    Running(ActivityId),
}

impl CurrentActivity {
    /// Classify a hub-reported id
    pub fn from_id(id: ActivityId) -> Self {
        if id.is_off() {
            Self::Off
        } else {
            Self::Running(id)
        }
    }

    /// Id of the running activity, if any
    pub fn running(self) -> Option<ActivityId> {
        match self {
            Self::Running(id) => Some(id),
            _ => None,
        }
    }

    /// Whether an activity is running
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running(_))
    }

    /// Power characteristic value
    pub fn power(self) -> bool {
        self.is_running()
    }

    /// Selected-input characteristic value (`-1` when nothing runs)
    pub fn selector_value(self) -> i64 {
        self.running().unwrap_or(ActivityId::OFF).0
    }
}

/// Mutable per-accessory state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    /// Last known current activity
    pub current: CurrentActivity,
    /// When `current` was last written
    pub last_updated: Option<Instant>,
    /// Switch sends made for the command in progress
    pub set_attempts: u32,
    /// Last activity a switch succeeded for (never off)
    pub last_selected: Option<ActivityId>,
}

impl SessionState {
    /// Whether `current` was written less than `window` ago
    pub fn is_fresh(&self, window: Duration) -> bool {
        self.last_updated
            .is_some_and(|updated| updated.elapsed() < window)
    }

    /// Record a new current activity, stamped now
    pub fn record(&mut self, current: CurrentActivity) {
        self.current = current;
        self.last_updated = Some(Instant::now());
    }
}

/// Transport plus cached state for one hub
pub struct HubSession<T> {
    hub_id: String,
    transport: AsyncMutex<T>,
    state: Mutex<SessionState>,
}

impl<T: HubTransport> HubSession<T> {
    /// Wrap a transport addressed to `hub_id`
    pub fn new(hub_id: impl Into<String>, transport: T) -> Self {
        Self {
            hub_id: hub_id.into(),
            transport: AsyncMutex::new(transport),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Hub identifier stamped on every request
    pub fn hub_id(&self) -> &str {
        &self.hub_id
    }

    /// Transport, serialized across callers
    pub fn transport(&self) -> &AsyncMutex<T> {
        &self.transport
    }

    /// Snapshot of the cached state
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Cached current activity
    pub fn current(&self) -> CurrentActivity {
        self.state.lock().current
    }

    /// Run `f` with the state locked
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Close the transport unless a request is holding it
    ///
    /// Returns whether the transport was closed.
    pub async fn close_if_idle(&self) -> bool {
        match self.transport.try_lock() {
            Ok(mut transport) => {
                transport.close().await;
                true
            }
            Err(_) => {
                tracing::debug!("Hub request in flight, dropping session without closing");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InProcessHub;
    use crate::protocol::HubResponse;

    #[test]
    fn test_current_activity_values() {
        assert_eq!(CurrentActivity::from_id(ActivityId(-1)), CurrentActivity::Off);
        assert_eq!(
            CurrentActivity::from_id(ActivityId(0)),
            CurrentActivity::Running(ActivityId(0))
        );

        assert!(!CurrentActivity::Unknown.power());
        assert!(!CurrentActivity::Off.power());
        assert!(CurrentActivity::Running(ActivityId(4)).power());

        assert_eq!(CurrentActivity::Unknown.selector_value(), -1);
        assert_eq!(CurrentActivity::Off.selector_value(), -1);
        assert_eq!(CurrentActivity::Running(ActivityId(4)).selector_value(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_freshness() {
        let mut state = SessionState::default();
        assert!(!state.is_fresh(Duration::from_millis(1500)));

        state.record(CurrentActivity::Off);
        assert!(state.is_fresh(Duration::from_millis(1500)));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(!state.is_fresh(Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn test_close_if_idle() {
        let session = HubSession::new("hub", InProcessHub::new(|_| Ok(HubResponse::default())));
        session.transport().lock().await.open().await.unwrap();

        assert!(session.close_if_idle().await);
        assert!(!session.transport().lock().await.is_open());
    }

    #[tokio::test]
    async fn test_close_skipped_while_busy() {
        let session = HubSession::new("hub", InProcessHub::new(|_| Ok(HubResponse::default())));
        let _guard = session.transport().lock().await;
        assert!(!session.close_if_idle().await);
    }
}
