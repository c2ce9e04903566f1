// In crates/core-types/src/types.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::de::{empty_object_as_none, flexible_bool, null_as_default};
use crate::{Error, Result};

/// The identifier of one trading run (e.g., "paper-20240101-120000").
///
/// Run ids double as directory names on the backend, so a valid id is a
/// single, non-empty path component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Validates and wraps a raw run id.
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim();
        let is_component = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\', '\0']);
        if !is_component {
            return Err(Error::InvalidRunId(raw.to_string()));
        }
        Ok(RunId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the run list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    /// `run_meta.json` exists for this run.
    #[serde(default)]
    pub has_meta: bool,
    /// `performance_summary.json` exists for this run.
    #[serde(default)]
    pub has_summary: bool,
}

/// The body of `GET /api/runs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub runs: Vec<RunSummary>,
}

/// Whether the controlled bot process is alive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub pid: Option<u32>,
}

/// The acknowledgement returned by the start/stop endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlAck {
    pub fn accepted(pid: u32) -> Self {
        Self { ok: true, pid: Some(pid), error: None }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self { ok: false, pid: None, error: Some(error.into()) }
    }
}

/// Point-in-time performance metrics computed by the bot for one run.
///
/// `sharpe_like` is the smoothed performance ratio over the returns window;
/// `sharpe_low`/`sharpe_high` are the same ratio computed separately over the
/// low- and high-volatility regimes, with `points_low`/`points_high` samples
/// each. `regime_ok` is set once both regimes have enough samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSummary {
    pub ts: f64,
    pub equity: f64,
    pub cash: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub fills: u64,
    pub max_drawdown_pct: f64,
    pub sharpe_like: f64,
    pub sharpe_low: f64,
    pub sharpe_high: f64,
    pub points_low: u64,
    pub points_high: u64,
    pub regime_ok: bool,
}

/// The two correlated markets a run trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketPair {
    pub a: String,
    pub b: String,
}

/// The configuration a run was started with. Both sections are free-form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Paper-trading parameters (cash, fees, slippage, ...).
    pub paper: Value,
    /// Dependency-trigger parameters (trigger move, min gap, linear model).
    pub dependency: Value,
}

/// Static metadata of a run, from `run_meta.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMeta {
    pub run_id: Option<RunId>,
    pub created_at_ts: Option<f64>,
    pub created_at: Option<String>,
    pub pair: MarketPair,
    pub config: RunConfig,
}

/// The body of `GET /api/runs/{run_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDetail {
    #[serde(default)]
    pub run_id: Option<RunId>,
    #[serde(default, deserialize_with = "empty_object_as_none")]
    pub meta: Option<RunMeta>,
    #[serde(default, deserialize_with = "empty_object_as_none")]
    pub summary: Option<PerformanceSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    #[serde(alias = "buy", alias = "Buy")]
    Buy,
    #[serde(alias = "sell", alias = "Sell")]
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// One row of `equity_timeseries.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: f64,
    pub equity: f64,
    #[serde(default)]
    pub cash: f64,
    #[serde(default)]
    pub realized_pnl: f64,
    #[serde(default)]
    pub unrealized_pnl: f64,
    #[serde(default)]
    pub fills: u64,
}

impl EquityPoint {
    pub fn is_finite(&self) -> bool {
        [self.ts, self.equity, self.cash, self.realized_pnl, self.unrealized_pnl]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// One simulated fill, from `paper_fills.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub ts: f64,
    #[serde(default)]
    pub token_id: String,
    pub side: Side,
    pub price: f64,
    pub size_usd: f64,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub reason: String,
}

impl Fill {
    pub fn is_finite(&self) -> bool {
        [self.ts, self.price, self.size_usd, self.shares]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// One market-mid sample, from `market_mid_timeseries.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMidPoint {
    pub ts: f64,
    #[serde(default)]
    pub token_id: String,
    pub mid: f64,
}

impl MarketMidPoint {
    pub fn is_finite(&self) -> bool {
        self.ts.is_finite() && self.mid.is_finite()
    }
}

/// One order attempt, from `order_attempts.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAttempt {
    pub ts: f64,
    #[serde(default)]
    pub token_id: String,
    pub side: Side,
    pub limit_price: f64,
    pub size_usd: f64,
    #[serde(deserialize_with = "flexible_bool")]
    pub ok: bool,
    #[serde(default)]
    pub reason: String,
}

impl OrderAttempt {
    pub fn is_finite(&self) -> bool {
        [self.ts, self.limit_price, self.size_usd]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// The body of `GET /api/runs/{run_id}/timeseries`. Every series is ordered
/// by timestamp, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    #[serde(default, deserialize_with = "null_as_default")]
    pub equity: Vec<EquityPoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub market_mid: Vec<MarketMidPoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fills: Vec<Fill>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub orders: Vec<OrderAttempt>,
}

impl TimeSeries {
    pub fn is_empty(&self) -> bool {
        self.equity.is_empty()
            && self.market_mid.is_empty()
            && self.fills.is_empty()
            && self.orders.is_empty()
    }
}
