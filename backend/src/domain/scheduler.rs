//! Midnight rollover scheduler.
//!
//! Publishes the current local date and wakes subscribers shortly after
//! each local midnight, so budget figures recompute on day change without
//! anything polling. This is the only trigger that can move the cycle or
//! the snapshot with no data mutation behind it.

use std::sync::Mutex;
use std::time::Duration as StdDuration;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Seconds added past midnight so a tick never lands before the boundary
/// under clock drift or wake-up jitter.
const ROLLOVER_BUFFER_SECS: i64 = 5;

/// Owns the single repeating rollover task. Created stopped; [`start`] and
/// [`cancel`] bound its lifetime explicitly.
///
/// [`start`]: MidnightScheduler::start
/// [`cancel`]: MidnightScheduler::cancel
pub struct MidnightScheduler {
    today_tx: watch::Sender<NaiveDate>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MidnightScheduler {
    pub fn new() -> Self {
        let (today_tx, _) = watch::channel(Local::now().date_naive());
        Self {
            today_tx,
            task: Mutex::new(None),
        }
    }

    /// The date the scheduler last published.
    pub fn today(&self) -> NaiveDate {
        *self.today_tx.subscribe().borrow()
    }

    /// Subscribe to day changes. The channel always holds the current date.
    pub fn subscribe(&self) -> watch::Receiver<NaiveDate> {
        self.today_tx.subscribe()
    }

    /// Start the rollover task. Idempotent; an already-running task is kept,
    /// so ticks are never double-scheduled.
    pub fn start(&self) {
        let mut task = self.task.lock().expect("scheduler mutex poisoned");
        if task.is_some() {
            return;
        }

        let today_tx = self.today_tx.clone();
        *task = Some(tokio::spawn(async move {
            loop {
                // Each iteration arms exactly one future tick, then notifies
                let wait = until_next_rollover(Local::now().naive_local());
                debug!("next midnight tick in {:?}", wait);
                tokio::time::sleep(wait).await;

                let today = Local::now().date_naive();
                info!("day rolled over, today is now {}", today);
                today_tx.send_replace(today);
            }
        }));
    }

    /// Stop the rollover task. No further ticks fire after this returns.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().expect("scheduler mutex poisoned").take() {
            task.abort();
        }
    }
}

impl Default for MidnightScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidnightScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Time to sleep from `now` until the next local midnight plus the buffer.
fn until_next_rollover(now: NaiveDateTime) -> StdDuration {
    let tomorrow = now
        .date()
        .succ_opt()
        .expect("reference dates are nowhere near the calendar limits");
    let next_tick = tomorrow
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists on every date")
        + Duration::seconds(ROLLOVER_BUFFER_SECS);

    // A non-positive wait (clock jumped past the tick) degrades to an
    // immediate retry rather than panicking
    (next_tick - now).to_std().unwrap_or(StdDuration::from_secs(1))
}
