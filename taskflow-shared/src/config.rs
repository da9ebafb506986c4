//! # Configuration
//!
//! Typed settings loaded from environment variables (optionally via a
//! `.env` file through `dotenvy`) through the `config` crate's layered
//! builder, mirroring the env var surface of the original platform's
//! `internal/config` package: `DB_URL`, `RMQ_ADDRESS`, `PRODUCTION`,
//! `PORT`, `TOKEN_SECRET`, `ACCESS_TOKEN_DURATION`.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{TaskerError, TaskerResult};

/// Reads the process environment into a single `config::Config` snapshot so
/// the dev/prod fallback logic below can query it uniformly, the way the
/// teacher workspace layers `config::Environment` under its own settings
/// structs instead of calling `std::env::var` ad hoc per field.
fn environment_snapshot() -> TaskerResult<config::Config> {
    config::Config::builder()
        .add_source(config::Environment::default())
        .build()
        .map_err(|e| TaskerError::config(format!("failed to read environment: {e}")))
}

fn get_string(snapshot: &config::Config, key: &str) -> Option<String> {
    snapshot.get_string(key).ok()
}

/// Process-wide settings. Construct with [`Settings::load`].
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_url: String,
    pub rmq_address: String,
    #[serde(default)]
    pub production: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    pub token_secret: String,
    #[serde(default = "default_access_token_duration_secs")]
    pub access_token_duration_secs: u64,
    /// CORS allow-list for the HTTP surface. Empty means "no cross-origin
    /// callers" rather than "allow all" — the HTTP layer never defaults
    /// permissively.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_access_token_duration_secs() -> u64 {
    3600
}

impl Settings {
    /// Loads settings from the process environment, falling back to
    /// `DB_URL_DEV`/`RMQ_ADDRESS_DEV` when `PRODUCTION` is unset or false and
    /// the production variable is absent — matching the dev/prod variable
    /// pairs of the original config loader.
    pub fn load() -> TaskerResult<Self> {
        // Missing .env is not an error outside containers/CI.
        let _ = dotenvy::dotenv();

        let snapshot = environment_snapshot()?;

        let production = get_string(&snapshot, "PRODUCTION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let db_url = first_present(&snapshot, if production {
            &["DB_URL", "DB_URL_DEV"]
        } else {
            &["DB_URL_DEV", "DB_URL"]
        })
        .ok_or_else(|| TaskerError::config("DB_URL (or DB_URL_DEV) is not set"))?;

        let rmq_address = first_present(&snapshot, if production {
            &["RMQ_ADDRESS", "RMQ_ADDRESS_DEV"]
        } else {
            &["RMQ_ADDRESS_DEV", "RMQ_ADDRESS"]
        })
        .ok_or_else(|| TaskerError::config("RMQ_ADDRESS (or RMQ_ADDRESS_DEV) is not set"))?;

        let port = get_string(&snapshot, "PORT")
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| TaskerError::config(format!("invalid PORT: {e}")))?
            .unwrap_or_else(default_port);

        let token_secret = get_string(&snapshot, "TOKEN_SECRET")
            .ok_or_else(|| TaskerError::config("TOKEN_SECRET is not set"))?;

        let access_token_duration_secs = get_string(&snapshot, "ACCESS_TOKEN_DURATION")
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| TaskerError::config(format!("invalid ACCESS_TOKEN_DURATION: {e}")))?
            .unwrap_or_else(default_access_token_duration_secs);

        let allowed_origins = get_string(&snapshot, "ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            db_url,
            rmq_address,
            production,
            port,
            token_secret,
            access_token_duration_secs,
            allowed_origins,
        })
    }

    #[must_use]
    pub fn access_token_duration(&self) -> Duration {
        Duration::from_secs(self.access_token_duration_secs)
    }
}

fn first_present(snapshot: &config::Config, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| get_string(snapshot, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "PRODUCTION",
            "DB_URL",
            "DB_URL_DEV",
            "RMQ_ADDRESS",
            "RMQ_ADDRESS_DEV",
            "PORT",
            "TOKEN_SECRET",
            "ACCESS_TOKEN_DURATION",
            "ALLOWED_ORIGINS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn load_fails_without_required_vars() {
        clear_env();
        assert!(Settings::load().is_err());
    }

    #[test]
    #[serial]
    fn load_prefers_dev_urls_outside_production() {
        clear_env();
        std::env::set_var("DB_URL_DEV", "postgres://dev");
        std::env::set_var("DB_URL", "postgres://prod");
        std::env::set_var("RMQ_ADDRESS_DEV", "amqp://dev");
        std::env::set_var("TOKEN_SECRET", "s3cr3t");

        let settings = Settings::load().expect("settings should load");
        assert_eq!(settings.db_url, "postgres://dev");
        assert_eq!(settings.rmq_address, "amqp://dev");
        assert_eq!(settings.port, 8080);
        clear_env();
    }

    #[test]
    #[serial]
    fn load_uses_production_urls_when_flagged() {
        clear_env();
        std::env::set_var("PRODUCTION", "true");
        std::env::set_var("DB_URL", "postgres://prod");
        std::env::set_var("RMQ_ADDRESS", "amqp://prod");
        std::env::set_var("TOKEN_SECRET", "s3cr3t");
        std::env::set_var("PORT", "9090");

        let settings = Settings::load().expect("settings should load");
        assert!(settings.production);
        assert_eq!(settings.db_url, "postgres://prod");
        assert_eq!(settings.port, 9090);
        clear_env();
    }
}
