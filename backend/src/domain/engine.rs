//! Reactive synchronizer for the budget engine.
//!
//! Owns the session's computed state and funnels every trigger (session
//! start, store change notifications, the midnight rollover, settings
//! edits, imperative refreshes) into one invalidate-and-refetch path.
//! Fetches race freely; a monotonic sequence token makes sure only the most
//! recently initiated one commits, so a slow response can never clobber
//! fresher numbers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use shared::{
    BudgetSnapshot, Cycle, CycleSettings, SyncPhase, Transaction, DEFAULT_CYCLE_START_DAY,
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::domain::scheduler::MidnightScheduler;
use crate::domain::settings_service::SettingsService;
use crate::domain::transaction_service::TransactionService;
use crate::domain::{aggregate, allowance, cycle};
use crate::storage::Connection;

/// Everything the engine publishes to consumers.
#[derive(Debug, Clone, Serialize)]
pub struct EngineState {
    pub phase: SyncPhase,
    /// True until the first fetch for the session completes; gates
    /// first-paint skeletons
    pub initializing: bool,
    /// True while any fetch is in flight
    pub loading: bool,
    pub user_id: Option<String>,
    pub cycle: Option<Cycle>,
    pub settings: Option<CycleSettings>,
    pub snapshot: Option<BudgetSnapshot>,
    /// Current cycle window, newest first
    pub transactions: Vec<Transaction>,
    /// Chart window (last 90 days), newest first
    pub recent_transactions: Vec<Transaction>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Uninitialized,
            initializing: true,
            loading: false,
            user_id: None,
            cycle: None,
            settings: None,
            snapshot: None,
            transactions: Vec::new(),
            recent_transactions: Vec::new(),
        }
    }
}

/// One successful fetch-compute pass, committed atomically.
struct FetchedData {
    cycle: Cycle,
    settings: CycleSettings,
    snapshot: BudgetSnapshot,
    transactions: Vec<Transaction>,
    recent_transactions: Vec<Transaction>,
}

struct EngineInner<C: Connection> {
    connection: C,
    transaction_service: TransactionService<C>,
    settings_service: SettingsService<C>,
    scheduler: MidnightScheduler,
    state_tx: watch::Sender<EngineState>,
    /// Monotonic fetch token; only the latest initiated fetch may commit
    fetch_seq: AtomicU64,
    /// Serializes the token check and the commit, so a stale result can't
    /// slip in between a newer fetch's bump and its own commit
    commit_lock: Mutex<()>,
    /// Fetches currently in flight; drives the published `loading` flag
    inflight: AtomicU64,
    /// Start day carried across cycles until a settings row says otherwise
    last_start_day: AtomicU32,
    tasks: std::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

/// Session-scoped budget synchronizer. Cheap to clone; clones share state.
pub struct BudgetEngine<C: Connection> {
    inner: Arc<EngineInner<C>>,
}

impl<C: Connection> Clone for BudgetEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> BudgetEngine<C> {
    pub fn new(connection: C) -> Self {
        let transaction_service = TransactionService::new(&connection);
        let settings_service = SettingsService::new(&connection);
        let (state_tx, _) = watch::channel(EngineState::default());

        Self {
            inner: Arc::new(EngineInner {
                connection,
                transaction_service,
                settings_service,
                scheduler: MidnightScheduler::new(),
                state_tx,
                fetch_seq: AtomicU64::new(0),
                commit_lock: Mutex::new(()),
                inflight: AtomicU64::new(0),
                last_start_day: AtomicU32::new(DEFAULT_CYCLE_START_DAY),
                tasks: std::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    /// Spawn the reactive listeners: store change notifications and the
    /// midnight rollover. Call once at startup.
    pub fn start(&self) {
        self.inner.scheduler.start();

        let mut changes = self.inner.connection.subscribe_changes();
        let engine = self.clone();
        let change_task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        debug!("change notification for {:?}, refetching", change);
                        engine.refetch().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("change stream lagged by {} events, refetching", skipped);
                        engine.refetch().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut today_rx = self.inner.scheduler.subscribe();
        let engine = self.clone();
        let midnight_task = tokio::spawn(async move {
            while today_rx.changed().await.is_ok() {
                let today = *today_rx.borrow_and_update();
                info!("recomputing budget for new day {}", today);
                engine.refetch().await;
            }
        });

        let mut tasks = self.inner.tasks.lock().expect("engine mutex poisoned");
        tasks.push(change_task);
        tasks.push(midnight_task);
    }

    /// Cancel all background work. The engine keeps serving its last state
    /// but no longer reacts.
    pub fn shutdown(&self) {
        self.inner.scheduler.cancel();
        for task in self.inner.tasks.lock().expect("engine mutex poisoned").drain(..) {
            task.abort();
        }
    }

    /// Subscribe to published state. The channel always holds the latest
    /// committed state.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.inner.state_tx.subscribe()
    }

    /// The latest committed state.
    pub fn state(&self) -> EngineState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn current_user(&self) -> Option<String> {
        self.inner.state_tx.borrow().user_id.clone()
    }

    /// Establish a user session and run the first fetch.
    pub async fn sign_in(&self, user_id: &str) {
        info!("session established for user {}", user_id);
        self.inner.state_tx.send_modify(|state| {
            *state = EngineState::default();
            state.user_id = Some(user_id.to_string());
            state.phase = SyncPhase::Loading;
        });
        self.refetch().await;
    }

    /// Tear down the session and drop all computed state.
    pub async fn sign_out(&self) {
        info!("session closed, clearing state");
        // Invalidate any in-flight fetch before resetting
        self.inner.fetch_seq.fetch_add(1, Ordering::SeqCst);
        let _guard = self.inner.commit_lock.lock().await;
        self.inner.last_start_day.store(DEFAULT_CYCLE_START_DAY, Ordering::SeqCst);
        self.inner.state_tx.send_replace(EngineState::default());
    }

    /// Imperative recompute trigger; the reactive paths funnel here too.
    pub async fn refresh(&self) {
        self.refetch().await;
    }

    async fn refetch(&self) {
        let Some(user_id) = self.current_user() else {
            debug!("refetch skipped, no active session");
            return;
        };

        let seq = self.inner.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.inflight.fetch_add(1, Ordering::SeqCst);
        self.inner.state_tx.send_modify(|state| state.loading = true);

        let result = self.fetch_pass(&user_id).await;

        let _guard = self.inner.commit_lock.lock().await;
        // Overlapping fetches each set the loading flag; it only clears
        // once the last one lands, whichever order they finish in
        let still_loading = self.inner.inflight.fetch_sub(1, Ordering::SeqCst) > 1;

        if seq != self.inner.fetch_seq.load(Ordering::SeqCst) {
            debug!("discarding stale fetch result (token {})", seq);
            self.inner.state_tx.send_modify(|state| state.loading = still_loading);
            return;
        }

        match result {
            Ok(fetched) => {
                self.inner
                    .last_start_day
                    .store(fetched.settings.cycle_start_day, Ordering::SeqCst);
                self.inner.state_tx.send_modify(|state| {
                    state.cycle = Some(fetched.cycle);
                    state.settings = Some(fetched.settings);
                    state.snapshot = Some(fetched.snapshot);
                    state.transactions = fetched.transactions;
                    state.recent_transactions = fetched.recent_transactions;
                    state.phase = SyncPhase::Ready;
                    state.loading = still_loading;
                    state.initializing = false;
                });
            }
            Err(error) => {
                // Keep showing the last known good numbers
                warn!("budget fetch failed, keeping previous snapshot: {:#}", error);
                self.inner.state_tx.send_modify(|state| {
                    state.phase = SyncPhase::Ready;
                    state.loading = still_loading;
                    state.initializing = false;
                });
            }
        }
    }

    async fn fetch_pass(&self, user_id: &str) -> Result<FetchedData> {
        let today = Local::now().date_naive();

        let mut start_day = self.inner.last_start_day.load(Ordering::SeqCst);
        let mut cycle = cycle::resolve(today, start_day);
        let mut settings = self
            .inner
            .settings_service
            .get_or_create(user_id, &cycle.key, start_day)
            .await?;

        // The stored start day wins over the inherited guess. One
        // re-resolution is enough: the second lookup already uses the
        // stored value itself.
        if settings.cycle_start_day != start_day {
            start_day = settings.cycle_start_day;
            cycle = cycle::resolve(today, start_day);
            settings = self
                .inner
                .settings_service
                .get_or_create(user_id, &cycle.key, start_day)
                .await?;
        }

        let transactions = self
            .inner
            .transaction_service
            .list_cycle_window(user_id, &cycle)
            .await?;
        let recent_transactions = self
            .inner
            .transaction_service
            .list_recent_window(user_id, today)
            .await?;

        let totals = aggregate::aggregate(&transactions, &cycle, today, settings.initial_spent);
        let remaining_days = cycle::remaining_days(today, start_day);
        let snapshot = allowance::compute_snapshot(&settings, &totals, cycle.total_days, remaining_days);

        debug!(
            "fetch pass for {}: cycle {} with {} transactions, {} days remaining",
            user_id,
            cycle.key,
            transactions.len(),
            remaining_days
        );

        Ok(FetchedData {
            cycle,
            settings,
            snapshot,
            transactions,
            recent_transactions,
        })
    }
}
