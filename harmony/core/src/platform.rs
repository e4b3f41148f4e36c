//! Platform Orchestration
//!
//! Ties the catalog, session, tracker, dispatcher and refresh scheduler
//! together behind the operations the accessory surface calls.
//!
//! # Command flow
//!
//! ```text
//! select_activity(target)
//!   ├─ nothing to do ─► forced reconcile in 800ms
//!   └─ pause timer ─► run_switch ─┬─ Switched  ─► push state, resume in 8s
//!                                 ├─ Abandoned ─► forced refresh, resume
//!                                 └─ Failed    ─► resume
//! ```
//!
//! Every state change that did not come from a direct read is pushed on the
//! update channel returned by [`HarmonyPlatform::launch`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::accessory::{
    AccessoryLayout, Characteristic, CharacteristicValue, RemoteKey, StateUpdate, VolumeDirection,
};
use crate::catalog::{ActivityId, ButtonFunction, Catalog};
use crate::config::PlatformConfig;
use crate::discovery::{Discovery, HubIdentity};
use crate::dispatcher::{plan_switch, CommandDispatcher, CommandError, SwitchOutcome};
use crate::scheduler::{RefreshScheduler, TickFn};
use crate::session::{CurrentActivity, HubSession, SessionState};
use crate::tracker::ActivityTracker;
use crate::transport::HubTransport;

/// Wait before re-reading hub state after a switch that needed no request
pub const NOOP_RECONCILE_DELAY: Duration = Duration::from_millis(800);

/// Wait after a successful switch before background refresh resumes
pub const SETTLE_DELAY: Duration = Duration::from_secs(8);

/// Capacity of the state update channel
pub const UPDATE_CHANNEL_CAPACITY: usize = 100;

struct PlatformInner<T> {
    identity: HubIdentity,
    catalog: Catalog,
    layout: AccessoryLayout,
    session: HubSession<T>,
    tracker: ActivityTracker,
    dispatcher: CommandDispatcher,
    scheduler: RefreshScheduler,
    updates: mpsc::Sender<StateUpdate>,
    reconcile: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

/// A launched hub accessory
pub struct HarmonyPlatform<T> {
    inner: Arc<PlatformInner<T>>,
}

impl<T> Clone for HarmonyPlatform<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Knobs for the platform's internal timings
#[derive(Clone, Debug, Default)]
pub struct PlatformOptions {
    /// Tracker override
    pub tracker: Option<ActivityTracker>,
    /// Dispatcher override
    pub dispatcher: Option<CommandDispatcher>,
}

impl<T: HubTransport + 'static> HarmonyPlatform<T> {
    /// Build the accessory, read the current activity and start the timer
    pub async fn launch(
        config: &PlatformConfig,
        discovery: Discovery<T>,
    ) -> (Self, mpsc::Receiver<StateUpdate>) {
        Self::launch_with(config, discovery, PlatformOptions::default()).await
    }

    /// [`launch`](Self::launch) with explicit tracker and dispatcher settings
    pub async fn launch_with(
        config: &PlatformConfig,
        discovery: Discovery<T>,
        options: PlatformOptions,
    ) -> (Self, mpsc::Receiver<StateUpdate>) {
        let (updates, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let Discovery {
            identity,
            catalog,
            transport,
            ..
        } = discovery;

        let layout = AccessoryLayout::build(&config.name, &identity.host, &catalog);
        let session = HubSession::new(identity.remote_id.clone(), transport);
        let period = config.refresh_period();

        let inner = Arc::new_cyclic(|weak: &Weak<PlatformInner<T>>| PlatformInner {
            identity,
            catalog,
            layout,
            session,
            tracker: options.tracker.unwrap_or_default(),
            dispatcher: options.dispatcher.unwrap_or_default(),
            scheduler: RefreshScheduler::new(period, refresh_tick(weak.clone())),
            updates,
            reconcile: Mutex::new(None),
            stopped: AtomicBool::new(false),
        });
        let platform = Self { inner };

        tracing::info!(
            name = %platform.inner.layout.television.name,
            inputs = platform.inner.layout.inputs.len(),
            refresh_secs = ?period.map(|p| p.as_secs()),
            "Accessory launched"
        );

        platform.refresh_accessory(false).await;
        platform.inner.scheduler.resume();

        (platform, update_rx)
    }

    /// Hub identity
    pub fn identity(&self) -> &HubIdentity {
        &self.inner.identity
    }

    /// Selectable activities
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Accessory layout
    pub fn layout(&self) -> &AccessoryLayout {
        &self.inner.layout
    }

    /// Refresh scheduler
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.inner.scheduler
    }

    /// Snapshot of the cached session state
    pub fn session_state(&self) -> SessionState {
        self.inner.session.snapshot()
    }

    /// Current activity through the tracker
    pub async fn current_activity(&self, force: bool) -> CurrentActivity {
        self.inner.tracker.current(&self.inner.session, force).await
    }

    /// Re-read the current activity and push selector then power
    pub async fn refresh_accessory(&self, force: bool) -> CurrentActivity {
        let current = self.current_activity(force).await;
        self.push_state(current);
        current
    }

    /// Switch to `target`, or power off for [`ActivityId::OFF`]
    ///
    /// Returns `None` when no hub request was needed.
    pub async fn select_activity(&self, target: ActivityId) -> Option<SwitchOutcome> {
        if self.is_stopped() {
            return None;
        }

        if !target.is_off() && !self.inner.catalog.contains(target) {
            tracing::warn!(activity_id = %target, "Ignoring switch to unknown activity");
            return None;
        }

        let current = self.inner.session.current();
        if !plan_switch(target, current) {
            tracing::debug!(activity_id = %target, ?current, "Switch not needed, reconciling");
            self.schedule_reconcile();
            return None;
        }

        self.inner.scheduler.pause();
        let outcome = self
            .inner
            .dispatcher
            .run_switch(&self.inner.session, target)
            .await;

        match &outcome {
            SwitchOutcome::Switched => {
                self.push_state(self.inner.session.current());
                self.inner.scheduler.resume_after(SETTLE_DELAY);
            }
            SwitchOutcome::Abandoned { .. } => {
                self.refresh_accessory(true).await;
                self.inner.scheduler.resume();
            }
            SwitchOutcome::Failed(_) => {
                self.inner.scheduler.resume();
            }
        }

        Some(outcome)
    }

    /// Turn the accessory on or off
    ///
    /// Powering on restarts the last selected activity when it is still in
    /// the catalog, the main activity otherwise.
    pub async fn set_power(&self, on: bool) -> Option<SwitchOutcome> {
        if !on {
            return self.select_activity(ActivityId::OFF).await;
        }

        let current = self.refresh_accessory(false).await;
        if current.is_running() {
            return None;
        }

        let target = self
            .inner
            .session
            .snapshot()
            .last_selected
            .filter(|id| self.inner.catalog.contains(*id))
            .unwrap_or_else(|| self.inner.catalog.main_activity_id());

        tracing::info!(activity_id = %target, "Powering on");
        self.select_activity(target).await
    }

    /// Send a remote key to the running activity
    pub async fn press_remote_key(&self, key: RemoteKey) -> Result<bool, CommandError> {
        self.press_function(key.button_function()).await
    }

    /// Toggle mute on the running activity
    pub async fn toggle_mute(&self) -> Result<bool, CommandError> {
        self.press_function(ButtonFunction::Mute).await
    }

    /// Step the volume of the running activity
    pub async fn step_volume(&self, direction: VolumeDirection) -> Result<bool, CommandError> {
        self.press_function(direction.button_function()).await
    }

    /// Press `function` on the running activity
    ///
    /// Returns `Ok(false)` when nothing runs or the activity has no such
    /// button.
    pub async fn press_function(&self, function: ButtonFunction) -> Result<bool, CommandError> {
        if self.is_stopped() {
            return Ok(false);
        }

        let current = self.current_activity(false).await;
        let Some(activity_id) = current.running() else {
            tracing::debug!(button = ?function, "No running activity, ignoring button");
            return Ok(false);
        };

        let Some(action) = self
            .inner
            .catalog
            .get(activity_id)
            .and_then(|activity| activity.action(function))
            .cloned()
        else {
            tracing::debug!(
                activity_id = %activity_id,
                button = ?function,
                "Activity has no such button"
            );
            return Ok(false);
        };

        self.inner.scheduler.pause();
        let result = self
            .inner
            .dispatcher
            .press_button(&self.inner.session, &action)
            .await;
        self.inner.scheduler.resume();

        if let Err(ref e) = result {
            tracing::warn!(button = ?function, error = %e, "Button press failed");
        }
        result.map(|()| true)
    }

    /// Stop background work and release the hub session
    ///
    /// Never waits for a request already in flight.
    pub async fn shutdown(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.scheduler.stop();
        if let Some(reconcile) = self.inner.reconcile.lock().take() {
            reconcile.abort();
        }
        self.inner.session.close_if_idle().await;

        tracing::info!("Platform shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) ran
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    fn push_state(&self, current: CurrentActivity) {
        self.push(StateUpdate {
            characteristic: Characteristic::Selector,
            value: CharacteristicValue::Int(current.selector_value()),
        });
        self.push(StateUpdate {
            characteristic: Characteristic::Power,
            value: CharacteristicValue::Bool(current.power()),
        });
    }

    fn push(&self, update: StateUpdate) {
        match self.inner.updates.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(update)) => {
                tracing::warn!(?update, "Update channel full, dropping state update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Update channel closed");
            }
        }
    }

    fn schedule_reconcile(&self) {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            // Reconcile delay
            tokio::time::sleep(NOOP_RECONCILE_DELAY).await;
            if let Some(inner) = weak.upgrade() {
                let platform = HarmonyPlatform { inner };
                if !platform.is_stopped() {
                    platform.refresh_accessory(true).await;
                }
            }
        });

        if let Some(previous) = self.inner.reconcile.lock().replace(handle) {
            previous.abort();
        }
    }
}

fn refresh_tick<T: HubTransport + 'static>(weak: Weak<PlatformInner<T>>) -> TickFn {
    Arc::new(move || {
        let weak = weak.clone();
        async move {
            if let Some(inner) = weak.upgrade() {
                tracing::debug!("Background refresh");
                HarmonyPlatform { inner }.refresh_accessory(false).await;
            }
        }
        .boxed()
    })
}
