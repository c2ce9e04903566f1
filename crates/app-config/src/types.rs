// In crates/app-config/src/types.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// The full, layered application configuration.
///
/// Every section has defaults, so an empty (or missing) configuration file
/// still yields a usable `Settings`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Settings {
    /// The application's general settings.
    #[serde(default)]
    pub app: AppSettings,
    /// Where the dashboard finds the Control Tower backend.
    #[serde(default)]
    pub api: ApiSettings,
    /// Polling cadence of the view-state synchronizer.
    #[serde(default)]
    pub sync: SyncSettings,
    /// Settings for the Control Tower backend server.
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// The log level for the application.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiSettings {
    /// The base URL of the Control Tower backend (e.g., "http://localhost:8000").
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SyncSettings {
    /// Cadence of the run list + bot status refresh.
    #[serde(default = "default_interval_ms")]
    pub global_interval_ms: u64,
    /// Cadence of the selected run's detail + time-series refresh.
    #[serde(default = "default_interval_ms")]
    pub selected_interval_ms: u64,
    /// Drop responses that arrive after the selection moved to another run.
    #[serde(default = "default_true")]
    pub discard_superseded: bool,
}

impl SyncSettings {
    pub fn global_interval(&self) -> Duration {
        Duration::from_millis(self.global_interval_ms)
    }

    pub fn selected_interval(&self) -> Duration {
        Duration::from_millis(self.selected_interval_ms)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            global_interval_ms: default_interval_ms(),
            selected_interval_ms: default_interval_ms(),
            discard_superseded: true,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// The directory the bot writes one sub-directory per run into.
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,
    /// Holds the pid of the bot process while it runs.
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
    /// The program started by `POST /api/control/start`.
    #[serde(default = "default_bot_command")]
    pub bot_command: String,
    #[serde(default = "default_bot_args")]
    pub bot_args: Vec<String>,
    /// Maximum number of rows returned per time-series.
    #[serde(default = "default_timeseries_limit")]
    pub timeseries_limit: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            runs_dir: default_runs_dir(),
            pid_file: default_pid_file(),
            bot_command: default_bot_command(),
            bot_args: default_bot_args(),
            timeseries_limit: default_timeseries_limit(),
        }
    }
}

/// Helper functions for serde defaults
fn default_environment() -> String { "development".into() }
fn default_log_level() -> String { "info".into() }
fn default_base_url() -> String { "http://localhost:8000".into() }
fn default_request_timeout_ms() -> u64 { 10_000 }
fn default_interval_ms() -> u64 { 5_000 }
fn default_true() -> bool { true }
fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8000 }
fn default_runs_dir() -> PathBuf { PathBuf::from("./runs") }
fn default_pid_file() -> PathBuf { PathBuf::from("./control_tower_bot.pid") }
fn default_bot_command() -> String { "python".into() }
fn default_bot_args() -> Vec<String> { vec!["run.py".into()] }
fn default_timeseries_limit() -> usize { 2_000 }
