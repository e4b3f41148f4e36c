//! Command Dispatcher
//!
//! Issues activity switches and button presses.
//!
//! # Switch retry
//!
//! ```text
//! send runactivity ──► 200 "OK"  ──► Switched (cache updated, attempts = 0)
//!        ▲          ├─► 202 / 100 ──► attempts < 12 ? wait 2s : Abandoned
//!        └──────────┘
//!                   └─► anything else ──► Failed
//! ```
//!
//! The transport is released while waiting out a busy reply so reads can
//! still reach the hub.

use serde_json::Value;
use thiserror::Error;
use tokio::time::Duration;

use crate::catalog::ActivityId;
use crate::protocol::{ButtonPhase, HubRequest, HubResponse};
use crate::session::{CurrentActivity, HubSession};
use crate::transport::{HubTransport, TransportError};

/// Total switch sends before a busy hub is given up on
pub const MAX_SWITCH_ATTEMPTS: u32 = 12;

/// Wait between switch sends while the hub reports busy
pub const SWITCH_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Errors from hub commands
#[derive(Debug, Error)]
pub enum CommandError {
    /// Request never got a reply
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Reply was neither success nor busy
    #[error("Unexpected hub reply (code {code:?}, msg {msg:?})")]
    Protocol {
        /// Status code, if any
        code: Option<u16>,
        /// Status message, if any
        msg: Option<String>,
    },
}

/// How a switch request ended
#[derive(Debug)]
pub enum SwitchOutcome {
    /// Hub confirmed the switch; the cache now holds the target
    Switched,
    /// Hub stayed busy through every attempt
    Abandoned {
        /// Sends made
        attempts: u32,
    },
    /// Switch failed outright
    Failed(CommandError),
}

/// Whether switching to `target` requires a hub request
///
/// Powering off is only needed while something runs. Any other target is
/// needed unless it is already the running activity.
pub fn plan_switch(target: ActivityId, current: CurrentActivity) -> bool {
    if target.is_off() {
        current.is_running()
    } else {
        current != CurrentActivity::Running(target)
    }
}

enum SwitchReply {
    Success,
    Busy,
    Rejected,
}

fn classify(reply: &HubResponse) -> SwitchReply {
    match (reply.status_code(), reply.message()) {
        (Some(200), Some("OK")) => SwitchReply::Success,
        (Some(202 | 100), _) => SwitchReply::Busy,
        _ => SwitchReply::Rejected,
    }
}

/// Sends switch and button commands
#[derive(Clone, Debug)]
pub struct CommandDispatcher {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher {
    /// Dispatcher with the default retry policy
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: MAX_SWITCH_ATTEMPTS,
            backoff: SWITCH_RETRY_BACKOFF,
        }
    }

    /// Set the attempt bound
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the wait between busy retries
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Ask the hub to run `target`, retrying while it reports busy
    pub async fn run_switch<T: HubTransport>(
        &self,
        session: &HubSession<T>,
        target: ActivityId,
    ) -> SwitchOutcome {
        loop {
            let result = {
                let mut transport = session.transport().lock().await;
                transport
                    .request(HubRequest::run_activity(session.hub_id(), target))
                    .await
            };

            let reply = match result {
                Ok(reply) => reply,
                Err(e) => {
                    session.with_state(|state| state.set_attempts = 0);
                    tracing::warn!(activity_id = %target, error = %e, "Activity switch failed");
                    return SwitchOutcome::Failed(e.into());
                }
            };

            let attempt = session.with_state(|state| {
                state.set_attempts += 1;
                state.set_attempts
            });

            match classify(&reply) {
                SwitchReply::Success => {
                    session.with_state(|state| {
                        state.record(CurrentActivity::from_id(target));
                        state.set_attempts = 0;
                        if !target.is_off() {
                            state.last_selected = Some(target);
                        }
                    });
                    tracing::info!(activity_id = %target, attempt, "Activity switched");
                    return SwitchOutcome::Switched;
                }
                SwitchReply::Busy if attempt < self.max_attempts => {
                    tracing::debug!(
                        activity_id = %target,
                        attempt,
                        code = ?reply.status_code(),
                        "Hub busy, retrying switch"
                    );
                    // Retry backoff
                    tokio::time::sleep(self.backoff).await;
                }
                SwitchReply::Busy => {
                    session.with_state(|state| state.set_attempts = 0);
                    tracing::warn!(
                        activity_id = %target,
                        attempts = attempt,
                        "Hub still busy, abandoning activity switch"
                    );
                    return SwitchOutcome::Abandoned { attempts: attempt };
                }
                SwitchReply::Rejected => {
                    session.with_state(|state| state.set_attempts = 0);
                    let error = CommandError::Protocol {
                        code: reply.status_code(),
                        msg: reply.message().map(str::to_string),
                    };
                    tracing::warn!(activity_id = %target, error = %error, "Activity switch rejected");
                    return SwitchOutcome::Failed(error);
                }
            }
        }
    }

    /// Press then release the button bound to `action`
    ///
    /// The release is only sent once the press went out.
    pub async fn press_button<T: HubTransport>(
        &self,
        session: &HubSession<T>,
        action: &Value,
    ) -> Result<(), CommandError> {
        let mut transport = session.transport().lock().await;

        transport
            .send(HubRequest::hold_action(session.hub_id(), action, ButtonPhase::Press))
            .await?;
        transport
            .send(HubRequest::hold_action(session.hub_id(), action, ButtonPhase::Release))
            .await?;

        tracing::debug!(action = %action, "Button pressed");
        Ok(())
    }
}
