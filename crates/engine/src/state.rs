// In crates/engine/src/state.rs

use chrono::{DateTime, Utc};
use core_types::{BotStatus, ControlAck, RunDetail, RunId, RunSummary, TimeSeries};

/// The view-state slots owned by a `Synchronizer`.
///
/// Renderers get clones of this struct and never mutate it. A slot is `None`
/// (or empty) until its first successful fetch; after that it always holds
/// the most recently *completed* fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    /// Slot: run list. Backend order, oldest first.
    pub runs: Vec<RunSummary>,
    /// Slot: bot status.
    pub bot_status: Option<BotStatus>,
    /// The run whose detail and time-series are polled.
    pub selected_run: Option<RunId>,
    /// Slot: selected run's meta + summary.
    pub detail: Option<RunDetail>,
    /// Slot: selected run's time-series.
    pub timeseries: Option<TimeSeries>,
    /// The acknowledgement of the last start/stop request.
    pub last_ack: Option<ControlAck>,
    /// Bumped every time `selected_run` changes to a different id.
    pub selection_generation: u64,
    /// When the run list + bot status pair was last replaced.
    pub global_updated_at: Option<DateTime<Utc>>,
    /// When the detail + time-series pair was last replaced.
    pub selected_updated_at: Option<DateTime<Utc>>,
}

impl ViewState {
    /// Points the selection at `run_id`.
    ///
    /// Switching to a different run clears the detail and time-series slots
    /// so nothing from the previous run is shown under the new id. Returns
    /// `true` when the selection actually changed.
    pub(crate) fn select(&mut self, run_id: RunId) -> bool {
        if self.selected_run.as_ref() == Some(&run_id) {
            return false;
        }
        self.selected_run = Some(run_id);
        self.detail = None;
        self.timeseries = None;
        self.selected_updated_at = None;
        self.selection_generation += 1;
        true
    }

    /// The default selection for a freshly fetched run list: the last entry.
    pub(crate) fn default_selection(&self) -> Option<RunId> {
        if self.selected_run.is_some() {
            return None;
        }
        self.runs.last().map(|r| r.run_id.clone())
    }

    pub fn is_running(&self) -> bool {
        self.bot_status.as_ref().is_some_and(|s| s.running)
    }

    /// The run list entry for the current selection, if it is listed.
    pub fn selected_summary(&self) -> Option<&RunSummary> {
        let selected = self.selected_run.as_ref()?;
        self.runs.iter().find(|r| &r.run_id == selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str) -> RunSummary {
        RunSummary { run_id: RunId(id.into()), has_meta: true, has_summary: false }
    }

    #[test]
    fn select_clears_slots_only_on_change() {
        let mut state = ViewState {
            selected_run: Some(RunId("a".into())),
            detail: Some(RunDetail::default()),
            timeseries: Some(TimeSeries::default()),
            ..ViewState::default()
        };

        assert!(!state.select(RunId("a".into())));
        assert!(state.detail.is_some());
        assert_eq!(state.selection_generation, 0);

        assert!(state.select(RunId("b".into())));
        assert!(state.detail.is_none());
        assert!(state.timeseries.is_none());
        assert_eq!(state.selection_generation, 1);
    }

    #[test]
    fn default_selection_is_last_run_when_nothing_selected() {
        let mut state = ViewState {
            runs: vec![run("paper-1"), run("paper-2")],
            ..ViewState::default()
        };
        assert_eq!(state.default_selection(), Some(RunId("paper-2".into())));

        state.selected_run = Some(RunId("paper-1".into()));
        assert_eq!(state.default_selection(), None);

        state.selected_run = None;
        state.runs.clear();
        assert_eq!(state.default_selection(), None);
    }
}
