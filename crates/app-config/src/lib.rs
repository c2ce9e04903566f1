// In crates/app-config/src/lib.rs

use std::path::Path;

use config::{Config, Environment, File};

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{ApiSettings, AppSettings, ServerSettings, Settings, SyncSettings};

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from an optional `config/base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `config/development.toml`).
/// 3. Merges settings from environment variables (e.g., `APP_API__BASE_URL=...`).
pub fn load_settings() -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());
    load_settings_from(Path::new("config"), &environment, app_environment())
}

/// The environment-variable source: prefix `APP`, separator `__`.
/// `APP_SERVER__BOT_ARGS` is split on spaces.
pub fn app_environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(" ")
        .with_list_parse_key("server.bot_args")
}

/// Same layering as [`load_settings`], rooted at `dir` and with an explicit
/// environment name and variable source.
pub fn load_settings_from(dir: &Path, environment: &str, env: Environment) -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::from(dir.join("base")).required(false))
        .add_source(File::from(dir.join(environment)).required(false))
        .add_source(env)
        .build()?;

    // Deserialize the configuration into our `Settings` struct.
    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

impl Settings {
    /// Rejects values the rest of the application cannot work with.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Invalid(format!(
                "api.base_url must be an http(s) URL (got {:?})",
                self.api.base_url
            )));
        }
        if self.api.request_timeout_ms == 0 {
            return Err(Error::Invalid("api.request_timeout_ms must be > 0".into()));
        }
        if self.sync.global_interval_ms == 0 {
            return Err(Error::Invalid("sync.global_interval_ms must be > 0".into()));
        }
        if self.sync.selected_interval_ms == 0 {
            return Err(Error::Invalid("sync.selected_interval_ms must be > 0".into()));
        }
        if self.server.timeseries_limit == 0 {
            return Err(Error::Invalid("server.timeseries_limit must be > 0".into()));
        }
        if self.server.bot_command.trim().is_empty() {
            return Err(Error::Invalid("server.bot_command must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn env_from(pairs: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        app_environment().source(Some(map))
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(dir.path(), "development", env_from(&[])).unwrap();

        assert_eq!(settings.api.base_url, "http://localhost:8000");
        assert_eq!(settings.sync.global_interval_ms, 5_000);
        assert_eq!(settings.sync.selected_interval_ms, 5_000);
        assert!(settings.sync.discard_superseded);
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.bot_args, vec!["run.py".to_string()]);
    }

    #[test]
    fn environment_file_overrides_base_and_env_overrides_both() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            "[api]\nbase_url = \"http://base:1\"\n[sync]\nglobal_interval_ms = 1000\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("production.toml"),
            "[api]\nbase_url = \"http://prod:2\"\n",
        )
        .unwrap();

        let settings = load_settings_from(
            dir.path(),
            "production",
            env_from(&[
                ("APP_SYNC__SELECTED_INTERVAL_MS", "2500"),
                ("APP_SERVER__BOT_ARGS", "-m bot.run"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.api.base_url, "http://prod:2");
        assert_eq!(settings.sync.global_interval_ms, 1000);
        assert_eq!(settings.sync.selected_interval_ms, 2500);
        assert_eq!(settings.server.bot_args, vec!["-m".to_string(), "bot.run".to_string()]);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.toml"), "[sync]\nglobal_interval_ms = 0\n").unwrap();

        let err = load_settings_from(dir.path(), "development", env_from(&[])).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut settings = Settings::default();
        settings.api.base_url = "localhost:8000".into();
        assert!(settings.validate().is_err());
    }
}
