// In crates/web-server/src/runs.rs

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use core_types::{
    EquityPoint, Fill, MarketMidPoint, OrderAttempt, PerformanceSummary, RunDetail, RunId, RunMeta,
    RunSummary, TimeSeries,
};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub const META_FILE: &str = "run_meta.json";
pub const SUMMARY_FILE: &str = "performance_summary.json";
pub const EQUITY_FILE: &str = "equity_timeseries.csv";
pub const FILLS_FILE: &str = "paper_fills.csv";
pub const MARKET_MID_FILE: &str = "market_mid_timeseries.csv";
pub const ORDERS_FILE: &str = "order_attempts.csv";

/// Directory names under the runs directory that are never runs.
const RESERVED_DIRS: &[&str] = &["evolution"];

/// Read-only access to the run artifacts the bot writes, one sub-directory
/// per run. All methods do blocking file I/O.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every run directory, sorted by name. A missing runs directory is an
    /// empty list.
    pub fn list(&self) -> Result<Vec<RunSummary>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::debug!(path = ?entry.path(), "Skipping run directory with a non UTF-8 name.");
                continue;
            };
            if RESERVED_DIRS.contains(&name.as_str()) {
                continue;
            }
            let dir = entry.path();
            runs.push(RunSummary {
                has_meta: dir.join(META_FILE).is_file(),
                has_summary: dir.join(SUMMARY_FILE).is_file(),
                run_id: RunId(name),
            });
        }
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        Ok(runs)
    }

    /// Meta and summary of one run; either is `None` when its file is absent.
    pub fn detail(&self, run_id: &RunId) -> Result<RunDetail> {
        let dir = self.run_dir(run_id)?;
        let meta: Option<RunMeta> = read_json(&dir.join(META_FILE))?;
        let summary: Option<PerformanceSummary> = read_json(&dir.join(SUMMARY_FILE))?;
        Ok(RunDetail { run_id: Some(run_id.clone()), meta, summary })
    }

    /// The four CSV series of one run, each trimmed to its last `limit` rows.
    pub fn timeseries(&self, run_id: &RunId, limit: usize) -> Result<TimeSeries> {
        let dir = self.run_dir(run_id)?;
        Ok(TimeSeries {
            equity: read_csv(&dir.join(EQUITY_FILE), limit, EquityPoint::is_finite)?,
            market_mid: read_csv(&dir.join(MARKET_MID_FILE), limit, MarketMidPoint::is_finite)?,
            fills: read_csv(&dir.join(FILLS_FILE), limit, Fill::is_finite)?,
            orders: read_csv(&dir.join(ORDERS_FILE), limit, OrderAttempt::is_finite)?,
        })
    }

    fn run_dir(&self, run_id: &RunId) -> Result<PathBuf> {
        if RESERVED_DIRS.contains(&run_id.as_str()) {
            return Err(Error::NotFound(run_id.to_string()));
        }
        let dir = self.root.join(run_id.as_str());
        if !dir.is_dir() {
            return Err(Error::NotFound(run_id.to_string()));
        }
        Ok(dir)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&text).map(Some).map_err(|e| Error::Artifact {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Reads a headed CSV file into `T`, keeping the last `limit` rows.
///
/// Rows that fail to parse or that `keep` rejects are skipped. A missing file
/// is an empty series.
fn read_csv<T: DeserializeOwned>(path: &Path, limit: usize, keep: fn(&T) -> bool) -> Result<Vec<T>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let mut reader = match csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            if let csv::ErrorKind::Io(io) = e.kind() {
                if io.kind() == std::io::ErrorKind::NotFound {
                    return Ok(Vec::new());
                }
            }
            return Err(Error::Artifact { path: path.display().to_string(), message: e.to_string() });
        }
    };

    let mut rows = VecDeque::with_capacity(limit.min(4096));
    let mut skipped = 0usize;
    for record in reader.deserialize::<T>() {
        match record {
            Ok(row) if keep(&row) => {
                if rows.len() == limit {
                    rows.pop_front();
                }
                rows.push_back(row);
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(path = %path.display(), skipped, "Skipped malformed rows.");
    }
    Ok(rows.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Side;
    use std::fs;
    use tempfile::TempDir;

    fn store_with_run(run: &str) -> (TempDir, RunStore, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(run);
        fs::create_dir_all(&dir).unwrap();
        let store = RunStore::new(tmp.path());
        (tmp, store, dir)
    }

    #[test]
    fn list_skips_files_and_reserved_dirs() {
        let (tmp, store, dir) = store_with_run("paper-2");
        fs::write(dir.join(SUMMARY_FILE), "{}").unwrap();
        fs::create_dir(tmp.path().join("paper-1")).unwrap();
        fs::write(tmp.path().join("paper-1").join(META_FILE), "{}").unwrap();
        fs::create_dir(tmp.path().join("evolution")).unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let runs = store.list().unwrap();
        let ids: Vec<_> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, ["paper-1", "paper-2"]);
        assert!(runs[0].has_meta && !runs[0].has_summary);
        assert!(!runs[1].has_meta && runs[1].has_summary);
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = RunStore::new(tmp.path().join("nope"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn detail_of_unknown_run_is_not_found() {
        let (_tmp, store, _) = store_with_run("paper-1");
        let err = store.detail(&RunId("paper-9".into())).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = store.detail(&RunId("evolution".into())).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn detail_reads_meta_without_summary() {
        let (_tmp, store, dir) = store_with_run("paper-1");
        fs::write(
            dir.join(META_FILE),
            r#"{"run_id":"paper-1","created_at":"2024-05-01T12:00:00Z","pair":{"a":"tok-a","b":"tok-b"}}"#,
        )
        .unwrap();

        let detail = store.detail(&RunId("paper-1".into())).unwrap();
        let meta = detail.meta.unwrap();
        assert_eq!(meta.pair.a, "tok-a");
        assert!(detail.summary.is_none());
    }

    #[test]
    fn malformed_json_is_an_artifact_error() {
        let (_tmp, store, dir) = store_with_run("paper-1");
        fs::write(dir.join(SUMMARY_FILE), "{ not json").unwrap();
        let err = store.detail(&RunId("paper-1".into())).unwrap_err();
        assert!(matches!(err, Error::Artifact { .. }));
    }

    #[test]
    fn timeseries_skips_bad_rows_and_keeps_the_tail() {
        let (_tmp, store, dir) = store_with_run("paper-1");
        fs::write(
            dir.join(EQUITY_FILE),
            "ts,equity,cash,realized_pnl,unrealized_pnl,fills\n\
             1,1000,1000,0,0,0\n\
             2,oops,1000,0,0,0\n\
             3,1001.5,900,0,1.5,1\n\
             4,NaN,900,0,1.5,1\n\
             5,1003,900,2,1,2\n",
        )
        .unwrap();
        fs::write(
            dir.join(ORDERS_FILE),
            "ts,token_id,side,limit_price,size_usd,ok,reason\n\
             1,tok-a,BUY,0.42,25,1,entry\n\
             2,tok-b,SELL,0.58,25,0,rejected\n",
        )
        .unwrap();
        fs::write(
            dir.join(FILLS_FILE),
            "ts,token_id,side,price,size_usd,shares,reason\n\
             3,tok-a,buy,0.42,25,59.52,entry\n",
        )
        .unwrap();

        let series = store.timeseries(&RunId("paper-1".into()), 2).unwrap();

        let ts: Vec<f64> = series.equity.iter().map(|p| p.ts).collect();
        assert_eq!(ts, [3.0, 5.0]);
        assert_eq!(series.orders.len(), 2);
        assert!(series.orders[0].ok);
        assert!(!series.orders[1].ok);
        assert_eq!(series.fills[0].side, Side::Buy);
        assert!(series.market_mid.is_empty());
    }
}
