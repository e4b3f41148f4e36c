//! Background Refresh Scheduler
//!
//! Periodically re-reads hub state so changes made elsewhere (the physical
//! remote, the companion app) reach the accessory.
//!
//! # Pause / resume protocol
//!
//! Commands pause the timer before talking to the hub and resume it when
//! done, so a tick never races a switch. After a successful switch the
//! resume is delayed to let devices settle:
//!
//! ```text
//! pause() ── run switch ── resume_after(8s) ─────────► resume()
//!                              │  pause() in between
//!                              └─► generation bumped, delayed resume dropped
//! ```
//!
//! At most one timer task is alive at any moment. Each tick runs on its own
//! task, so pausing never cancels a request already sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

/// Work run on every tick
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct TimerSlots {
    timer: Option<JoinHandle<()>>,
    delayed: Option<JoinHandle<()>>,
    generation: u64,
    stopped: bool,
}

struct Shared {
    period: Option<Duration>,
    tick: TickFn,
    slots: Mutex<TimerSlots>,
    tick_running: Arc<AtomicBool>,
}

/// Pausable periodic refresh
#[derive(Clone)]
pub struct RefreshScheduler {
    shared: Arc<Shared>,
}

impl RefreshScheduler {
    /// Scheduler running `tick` every `period`; `None` disables it
    pub fn new(period: Option<Duration>, tick: TickFn) -> Self {
        Self {
            shared: Arc::new(Shared {
                period: period.filter(|p| !p.is_zero()),
                tick,
                slots: Mutex::new(TimerSlots::default()),
                tick_running: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Refresh period, if enabled
    pub fn period(&self) -> Option<Duration> {
        self.shared.period
    }

    /// Start the timer if it is not already running
    pub fn resume(&self) {
        let mut slots = self.shared.slots.lock();
        self.resume_locked(&mut slots);
    }

    fn resume_locked(&self, slots: &mut TimerSlots) {
        let Some(period) = self.shared.period else {
            return;
        };
        if slots.stopped {
            return;
        }
        if slots.timer.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let tick = Arc::clone(&self.shared.tick);
        let tick_running = Arc::clone(&self.shared.tick_running);
        slots.timer = Some(tokio::spawn(run_timer(period, tick, tick_running)));

        tracing::info!(period_secs = period.as_secs(), "Refresh timer set");
    }

    /// Stop the timer and drop any pending delayed resume
    pub fn pause(&self) {
        let mut slots = self.shared.slots.lock();
        slots.generation = slots.generation.wrapping_add(1);

        if let Some(delayed) = slots.delayed.take() {
            delayed.abort();
        }
        if let Some(timer) = slots.timer.take() {
            timer.abort();
            tracing::info!("Refresh timer cleared");
        }
    }

    /// Resume after `delay` unless paused again in the meantime
    pub fn resume_after(&self, delay: Duration) {
        if self.shared.period.is_none() {
            return;
        }

        let mut slots = self.shared.slots.lock();
        if slots.stopped {
            return;
        }

        let generation = slots.generation;
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            // Settle delay
            tokio::time::sleep(delay).await;
            let mut slots = scheduler.shared.slots.lock();
            if slots.generation == generation {
                scheduler.resume_locked(&mut slots);
            } else {
                tracing::debug!("Delayed resume superseded");
            }
        });

        if let Some(previous) = slots.delayed.replace(handle) {
            previous.abort();
        }
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Refresh timer resume scheduled");
    }

    /// Stop for good; later resumes are ignored
    pub fn stop(&self) {
        self.pause();
        self.shared.slots.lock().stopped = true;
    }

    /// Whether the timer is running
    pub fn is_active(&self) -> bool {
        self.shared
            .slots
            .lock()
            .timer
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Whether a delayed resume is waiting
    pub fn has_pending_resume(&self) -> bool {
        self.shared
            .slots
            .lock()
            .delayed
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

async fn run_timer(period: Duration, tick: TickFn, tick_running: Arc<AtomicBool>) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        if tick_running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Previous refresh still running, skipping tick");
            continue;
        }

        let work = tick();
        let running = Arc::clone(&tick_running);
        tokio::spawn(async move {
            work.await;
            running.store(false, Ordering::SeqCst);
        });
    }
}
