// In crates/engine/src/synchronizer.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use api_client::{BotAction, ControlTowerApi};
use app_config::SyncSettings;
use chrono::Utc;
use core_types::RunId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::ViewState;
use crate::task::spawn_poll_loop;

/// Keeps a `ViewState` eventually consistent with a Control Tower backend.
///
/// Two timers drive it: the global loop refreshes the run list and bot
/// status, the selected loop refreshes the detail and time-series of the
/// selected run. Both are children of one root `CancellationToken`, so
/// `shutdown()` stops everything this instance started.
///
/// The handle is cheap to clone; all clones share the same state.
pub struct Synchronizer<A> {
    inner: Arc<Inner<A>>,
}

struct Inner<A> {
    api: A,
    settings: SyncSettings,
    state: watch::Sender<ViewState>,
    root: CancellationToken,
    global_task: Mutex<Option<JoinHandle<()>>>,
    selected_task: Mutex<Option<SelectedTask>>,
}

struct SelectedTask {
    run_id: RunId,
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl<A> Clone for Synchronizer<A> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A: ControlTowerApi + 'static> Synchronizer<A> {
    pub fn new(api: A, settings: SyncSettings) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                settings,
                state,
                root: CancellationToken::new(),
                global_task: Mutex::new(None),
                selected_task: Mutex::new(None),
            }),
        }
    }

    /// Starts the global loop; its first tick runs immediately.
    ///
    /// Calling `start` on a running or shut-down instance does nothing.
    pub fn start(&self) {
        if self.inner.root.is_cancelled() {
            return;
        }
        let mut slot = lock(&self.inner.global_task);
        if slot.is_some() {
            return;
        }

        tracing::info!(
            global_interval_ms = self.inner.settings.global_interval_ms,
            selected_interval_ms = self.inner.settings.selected_interval_ms,
            "Starting synchronizer."
        );
        let this = self.clone();
        *slot = Some(spawn_poll_loop(
            "global",
            self.inner.settings.global_interval(),
            self.inner.root.child_token(),
            move || {
                let this = this.clone();
                async move { this.refresh_global().await }
            },
        ));
        drop(slot);

        // A selection made before start() gets its loop now.
        if self.inner.state.borrow().selected_run.is_some() {
            self.ensure_selected_loop();
        }
    }

    /// Cancels both loops. In-flight responses are dropped and no further
    /// requests are issued by this instance. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.root.is_cancelled() {
            return;
        }
        tracing::info!("Shutting down synchronizer.");
        self.inner.root.cancel();

        if let Some(handle) = lock(&self.inner.global_task).take() {
            handle.abort();
        }
        if let Some(task) = lock(&self.inner.selected_task).take() {
            task.handle.abort();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    /// A clone of the current view state.
    pub fn snapshot(&self) -> ViewState {
        self.inner.state.borrow().clone()
    }

    /// A receiver that is notified on every applied update.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.inner.state.subscribe()
    }

    /// One global tick: run list and bot status, fetched concurrently and
    /// applied together. A failure of either leaves both slots untouched.
    pub async fn refresh_global(&self) {
        if self.inner.root.is_cancelled() {
            return;
        }
        let api = &self.inner.api;
        let (runs, status) = tokio::join!(api.list_runs(), api.bot_status());

        let (runs, status) = match (runs, status) {
            (Ok(runs), Ok(status)) => (runs, status),
            (runs, status) => {
                if let Err(e) = &runs {
                    tracing::warn!(error = %e, "Failed to fetch run list; keeping previous state.");
                }
                if let Err(e) = &status {
                    tracing::warn!(error = %e, "Failed to fetch bot status; keeping previous state.");
                }
                return;
            }
        };
        if self.inner.root.is_cancelled() {
            return;
        }

        let run_count = runs.len();
        let mut auto_selected = None;
        self.inner.state.send_modify(|state| {
            state.runs = runs;
            state.bot_status = Some(status);
            state.global_updated_at = Some(Utc::now());
            if let Some(run_id) = state.default_selection() {
                if state.select(run_id.clone()) {
                    auto_selected = Some(run_id);
                }
            }
        });
        tracing::debug!(runs = run_count, "Applied global refresh.");

        if let Some(run_id) = auto_selected {
            tracing::info!(%run_id, "Auto-selected latest run.");
            self.restart_selected_loop();
        }
    }

    /// One selected-run tick: detail and time-series for the selected run,
    /// fetched concurrently and applied together. Does nothing (and sends
    /// nothing) when no run is selected.
    ///
    /// With `discard_superseded` set, a response that comes back after the
    /// selection moved to another run is dropped.
    pub async fn refresh_selected(&self) {
        if self.inner.root.is_cancelled() {
            return;
        }
        let Some((run_id, generation)) = self.current_selection() else {
            return;
        };

        let api = &self.inner.api;
        let (detail, series) = tokio::join!(api.run_detail(&run_id), api.timeseries(&run_id));

        let (detail, series) = match (detail, series) {
            (Ok(detail), Ok(series)) => (detail, series),
            (detail, series) => {
                if let Err(e) = &detail {
                    tracing::warn!(%run_id, error = %e, "Failed to fetch run detail; keeping previous state.");
                }
                if let Err(e) = &series {
                    tracing::warn!(%run_id, error = %e, "Failed to fetch time-series; keeping previous state.");
                }
                return;
            }
        };
        if self.inner.root.is_cancelled() {
            return;
        }

        let discard_superseded = self.inner.settings.discard_superseded;
        let applied = self.inner.state.send_if_modified(|state| {
            if discard_superseded && state.selection_generation != generation {
                return false;
            }
            state.detail = Some(detail);
            state.timeseries = Some(series);
            state.selected_updated_at = Some(Utc::now());
            true
        });

        if applied {
            tracing::debug!(%run_id, "Applied selected-run refresh.");
        } else {
            tracing::debug!(%run_id, "Discarded response for a superseded selection.");
        }
    }

    /// Re-fetches only the bot status slot.
    pub async fn refresh_status(&self) {
        if self.inner.root.is_cancelled() {
            return;
        }
        match self.inner.api.bot_status().await {
            Ok(status) => {
                if self.inner.root.is_cancelled() {
                    return;
                }
                self.inner.state.send_modify(|state| state.bot_status = Some(status));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch bot status; keeping previous state.");
            }
        }
    }

    /// Both ticks at once, outside the timers' cadence.
    pub async fn refresh_now(&self) {
        tokio::join!(self.refresh_global(), self.refresh_selected());
    }

    /// Selects `run_id`. A different id clears the selected-run slots,
    /// fetches the new run immediately and restarts the selected loop's
    /// phase; re-selecting the current id is a no-op.
    pub fn select_run(&self, run_id: RunId) {
        if self.inner.root.is_cancelled() {
            return;
        }
        let logged = run_id.clone();
        let changed = self.inner.state.send_if_modified(|state| state.select(run_id));

        if changed {
            tracing::info!(run_id = %logged, "Selected run.");
            self.restart_selected_loop();
        } else {
            self.ensure_selected_loop();
        }
    }

    /// Sends stop when the bot is known to be running, start otherwise, then
    /// re-fetches the bot status. The acknowledgement lands in `last_ack`.
    ///
    /// Returns the action that was sent.
    pub async fn toggle_bot(&self) -> BotAction {
        let running = self.inner.state.borrow().is_running();
        let action = if running {
            BotAction::Stop
        } else {
            BotAction::Start
        };
        if self.inner.root.is_cancelled() {
            return action;
        }

        match self.inner.api.control(action).await {
            Ok(ack) => {
                if ack.ok {
                    tracing::info!(?action, pid = ?ack.pid, "Bot control accepted.");
                } else {
                    tracing::warn!(?action, error = ?ack.error, "Bot control rejected.");
                }
                self.inner.state.send_modify(|state| state.last_ack = Some(ack));
            }
            Err(e) => {
                tracing::warn!(?action, error = %e, "Bot control request failed.");
            }
        }

        self.refresh_status().await;
        action
    }

    fn current_selection(&self) -> Option<(RunId, u64)> {
        let state = self.inner.state.borrow();
        let run_id = state.selected_run.clone()?;
        Some((run_id, state.selection_generation))
    }

    fn ensure_selected_loop(&self) {
        let running = lock(&self.inner.selected_task).is_some();
        if !running {
            self.restart_selected_loop();
        }
    }

    /// Cancels the current selected loop (if any) and spawns a fresh one for
    /// the current selection. The new loop's first tick is immediate.
    ///
    /// A loop already spawned for the current selection generation is kept,
    /// so racing callers that saw the same selection change start one loop.
    fn restart_selected_loop(&self) {
        let mut slot = lock(&self.inner.selected_task);
        let selection = self.current_selection();
        if let (Some(task), Some((_, generation))) = (slot.as_ref(), &selection) {
            if task.generation == *generation {
                return;
            }
        }
        if let Some(old) = slot.take() {
            tracing::debug!(run_id = %old.run_id, "Stopped polling run.");
            old.token.cancel();
        }
        if self.inner.root.is_cancelled() {
            return;
        }
        let Some((run_id, generation)) = selection else {
            return;
        };

        let token = self.inner.root.child_token();
        let this = self.clone();
        let handle = spawn_poll_loop(
            "selected",
            self.inner.settings.selected_interval(),
            token.clone(),
            move || {
                let this = this.clone();
                async move { this.refresh_selected().await }
            },
        );
        tracing::debug!(%run_id, "Polling run.");
        *slot = Some(SelectedTask { run_id, generation, token, handle });
    }
}
