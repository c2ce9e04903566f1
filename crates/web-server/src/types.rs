// In crates/web-server/src/types.rs

use serde::Deserialize;

/// Query parameters for `GET /api/runs/{run_id}/timeseries`.
#[derive(Debug, Default, Deserialize)]
pub struct TimeseriesParams {
    /// Keep only the last `limit` rows of each series.
    pub limit: Option<usize>,
}
