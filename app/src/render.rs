// In app/src/render.rs

use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use core_types::{ControlAck, EquityPoint, Fill, PerformanceSummary, RunDetail, RunId, TimeSeries};
use engine::ViewState;

use crate::tracing_layer::LogLine;

/// Rows shown in the equity and fills tables.
pub const TABLE_ROWS: usize = 10;
/// Log lines shown under the frame.
pub const LOG_ROWS: usize = 8;

pub const NO_RUNS: &str = "No runs yet. Start the bot to begin trading!";
pub const NO_FILLS: &str = "No fills yet.";

/// Renders one dashboard frame. Pure: the same inputs always give the same
/// text, and nothing in `state` is modified.
pub fn render(state: &ViewState, logs: &[LogLine], api_url: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_frame(&mut out, state, logs, api_url);
    out
}

fn write_frame(out: &mut String, state: &ViewState, logs: &[LogLine], api_url: &str) -> fmt::Result {
    writeln!(out, "🎯 Control Tower")?;
    writeln!(out, "API: {api_url}")?;
    writeln!(out, "Bot: {}", bot_line(state))?;
    if let Some(ack) = &state.last_ack {
        writeln!(out, "Last action: {}", ack_line(ack))?;
    }
    writeln!(out)?;

    write_runs(out, state)?;

    if let Some(run_id) = &state.selected_run {
        writeln!(out)?;
        write_selected(out, run_id, state.detail.as_ref(), state.timeseries.as_ref())?;
    }

    let tail = &logs[logs.len().saturating_sub(LOG_ROWS)..];
    if !tail.is_empty() {
        writeln!(out)?;
        writeln!(out, "── Log")?;
        for line in tail {
            writeln!(out, "  {} {:<5} {}", line.timestamp.format("%H:%M:%S"), line.level, line.message)?;
        }
    }
    Ok(())
}

fn bot_line(state: &ViewState) -> String {
    match &state.bot_status {
        None => "unknown".into(),
        Some(status) if status.running => match status.pid {
            Some(pid) => format!("running (pid {pid})"),
            None => "running".into(),
        },
        Some(_) => "stopped".into(),
    }
}

fn ack_line(ack: &ControlAck) -> String {
    match (ack.ok, ack.pid, ack.error.as_deref()) {
        (true, Some(pid), _) => format!("ok (pid {pid})"),
        (true, None, _) => "ok".into(),
        (false, _, Some(error)) => format!("rejected: {error}"),
        (false, _, None) => "rejected".into(),
    }
}

fn write_runs(out: &mut String, state: &ViewState) -> fmt::Result {
    writeln!(out, "📊 Trading Runs")?;
    if state.runs.is_empty() {
        return writeln!(out, "  {NO_RUNS}");
    }
    for run in &state.runs {
        let marker = if state.selected_run.as_ref() == Some(&run.run_id) { "▶" } else { " " };
        let badge = if run.has_summary { "✅" } else { "⏳" };
        writeln!(out, "  {marker} {} {badge}", run.run_id)?;
    }
    Ok(())
}

fn write_selected(
    out: &mut String,
    run_id: &RunId,
    detail: Option<&RunDetail>,
    series: Option<&TimeSeries>,
) -> fmt::Result {
    writeln!(out, "── Run {run_id}")?;
    let Some(detail) = detail else {
        return writeln!(out, "  Loading…");
    };

    match &detail.meta {
        Some(meta) => {
            let created = meta
                .created_at_ts
                .map(fmt_ts)
                .or_else(|| meta.created_at.clone())
                .unwrap_or_else(|| "-".into());
            writeln!(out, "  Pair: {} / {}", or_dash(&meta.pair.a), or_dash(&meta.pair.b))?;
            writeln!(out, "  Created: {created}")?;
        }
        None => writeln!(out, "  No run metadata.")?,
    }

    writeln!(out)?;
    match &detail.summary {
        Some(summary) => write_summary(out, summary)?,
        None => writeln!(out, "  No performance summary yet.")?,
    }

    let Some(series) = series else {
        return Ok(());
    };
    writeln!(out)?;
    write_equity(out, &series.equity)?;
    writeln!(out)?;
    write_fills(out, &series.fills)
}

fn write_summary(out: &mut String, s: &PerformanceSummary) -> fmt::Result {
    writeln!(out, "── Performance (as of {})", fmt_ts(s.ts))?;
    writeln!(
        out,
        "  Equity {}  Cash {}  Realized {}  Unrealized {}",
        fmt_usd(s.equity),
        fmt_usd(s.cash),
        fmt_usd(s.realized_pnl),
        fmt_usd(s.unrealized_pnl)
    )?;
    writeln!(out, "  Fills {}  Max drawdown {}", s.fills, fmt_pct(s.max_drawdown_pct))?;
    writeln!(
        out,
        "  Sharpe-like {:.2}  (low-vol {:.2} over {} pts, high-vol {:.2} over {} pts)",
        s.sharpe_like, s.sharpe_low, s.points_low, s.sharpe_high, s.points_high
    )?;
    writeln!(out, "  Regime: {}", if s.regime_ok { "ok" } else { "insufficient data" })
}

fn write_equity(out: &mut String, points: &[EquityPoint]) -> fmt::Result {
    writeln!(out, "── Equity (last {TABLE_ROWS})")?;
    if points.is_empty() {
        return writeln!(out, "  No equity points yet.");
    }
    writeln!(
        out,
        "  {:<19}  {:>12}  {:>12}  {:>12}  {:>12}  {:>5}",
        "time", "equity", "cash", "realized", "unrealized", "fills"
    )?;
    for p in &points[points.len().saturating_sub(TABLE_ROWS)..] {
        writeln!(
            out,
            "  {:<19}  {:>12}  {:>12}  {:>12}  {:>12}  {:>5}",
            fmt_ts(p.ts),
            fmt_usd(p.equity),
            fmt_usd(p.cash),
            fmt_usd(p.realized_pnl),
            fmt_usd(p.unrealized_pnl),
            p.fills
        )?;
    }
    Ok(())
}

fn write_fills(out: &mut String, fills: &[Fill]) -> fmt::Result {
    writeln!(out, "── Fills (last {TABLE_ROWS})")?;
    if fills.is_empty() {
        return writeln!(out, "  {NO_FILLS}");
    }
    writeln!(
        out,
        "  {:<19}  {:<4}  {:<12}  {:>8}  {:>10}  {:>10}  reason",
        "time", "side", "token", "price", "size", "shares"
    )?;
    for f in &fills[fills.len().saturating_sub(TABLE_ROWS)..] {
        writeln!(
            out,
            "  {:<19}  {:<4}  {:<12}  {:>8.4}  {:>10}  {:>10.2}  {}",
            fmt_ts(f.ts),
            f.side.to_string(),
            truncate(&f.token_id, 12),
            f.price,
            fmt_usd(f.size_usd),
            f.shares,
            f.reason
        )?;
    }
    Ok(())
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Formats dollars with two decimals and thousands separators:
/// `1234.5` becomes `$1,234.50`, `-3.2` becomes `-$3.20`.
pub fn fmt_usd(value: f64) -> String {
    if !value.is_finite() {
        return "-".into();
    }
    let cents = (value.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac:02}")
}

/// Formats a fraction as a percentage: `0.032` becomes `3.20%`.
pub fn fmt_pct(fraction: f64) -> String {
    if !fraction.is_finite() {
        return "-".into();
    }
    format!("{:.2}%", fraction * 100.0)
}

/// Formats epoch seconds as a UTC timestamp.
pub fn fmt_ts(epoch_secs: f64) -> String {
    if !epoch_secs.is_finite() || epoch_secs <= 0.0 {
        return "-".into();
    }
    let secs = epoch_secs.floor();
    let nanos = ((epoch_secs - secs) * 1e9) as u32;
    match DateTime::<Utc>::from_timestamp(secs as i64, nanos) {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".into(),
    }
}
