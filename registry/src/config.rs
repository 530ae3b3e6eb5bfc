//! Registry configuration loaded via OrthoConfig.
//!
//! Every value may come from the command line, a configuration file, or a
//! `REGISTRY_`-prefixed environment variable. Accessors supply the defaults.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::DEFAULT_STREAM_BATCH_SIZE;
use crate::outbound::persistence::PoolConfig;

/// Fallback environment variable consulted for the database URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Settings controlling the registry's storage connection and streaming.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "REGISTRY")]
pub struct RegistrySettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Maximum number of pooled connections.
    pub pool_max_size: Option<u32>,
    /// Idle connections kept open.
    pub pool_min_idle: Option<u32>,
    /// Connection checkout timeout in seconds.
    pub connection_timeout_secs: Option<u64>,
    /// Records fetched per request by lazy sequences.
    pub stream_batch_size: Option<usize>,
}

impl RegistrySettings {
    /// Maximum pool size, defaulting to [`PoolConfig::DEFAULT_MAX_SIZE`].
    pub fn pool_max_size(&self) -> u32 {
        self.pool_max_size.unwrap_or(PoolConfig::DEFAULT_MAX_SIZE)
    }

    /// Minimum idle connections, defaulting to
    /// [`PoolConfig::DEFAULT_MIN_IDLE`].
    pub fn pool_min_idle(&self) -> u32 {
        self.pool_min_idle.unwrap_or(PoolConfig::DEFAULT_MIN_IDLE)
    }

    /// Checkout timeout, defaulting to
    /// [`PoolConfig::DEFAULT_CONNECTION_TIMEOUT`].
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout_secs
            .map_or(PoolConfig::DEFAULT_CONNECTION_TIMEOUT, Duration::from_secs)
    }

    /// Lazy-sequence batch size; never zero.
    pub fn stream_batch_size(&self) -> usize {
        self.stream_batch_size
            .unwrap_or(DEFAULT_STREAM_BATCH_SIZE)
            .max(1)
    }

    /// Resolve the database URL: an explicit override first, then the
    /// configured value, then `DATABASE_URL`.
    pub fn resolve_database_url(&self, explicit: Option<String>) -> Option<String> {
        explicit
            .or_else(|| self.database_url.clone())
            .or_else(|| std::env::var(DATABASE_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty())
    }

    /// Pool configuration for `database_url` using these settings.
    pub fn pool_config(&self, database_url: impl Into<String>) -> PoolConfig {
        PoolConfig::from_settings(database_url, self)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for registry configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 6] = [
        "REGISTRY_DATABASE_URL",
        "REGISTRY_POOL_MAX_SIZE",
        "REGISTRY_POOL_MIN_IDLE",
        "REGISTRY_CONNECTION_TIMEOUT_SECS",
        "REGISTRY_STREAM_BATCH_SIZE",
        DATABASE_URL_ENV,
    ];

    fn load_from_empty_args() -> RegistrySettings {
        RegistrySettings::load_from_iter([OsString::from("registry")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_configured() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.pool_max_size(), 10);
        assert_eq!(settings.pool_min_idle(), 2);
        assert_eq!(settings.connection_timeout(), Duration::from_secs(30));
        assert_eq!(settings.stream_batch_size(), DEFAULT_STREAM_BATCH_SIZE);
        assert_eq!(settings.resolve_database_url(None), None);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            (
                "REGISTRY_DATABASE_URL",
                Some("postgres://registry@db/registry".to_owned()),
            ),
            ("REGISTRY_POOL_MAX_SIZE", Some("4".to_owned())),
            ("REGISTRY_POOL_MIN_IDLE", Some("1".to_owned())),
            ("REGISTRY_CONNECTION_TIMEOUT_SECS", Some("5".to_owned())),
            ("REGISTRY_STREAM_BATCH_SIZE", Some("0".to_owned())),
            (DATABASE_URL_ENV, None),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.pool_max_size(), 4);
        assert_eq!(settings.pool_min_idle(), 1);
        assert_eq!(settings.connection_timeout(), Duration::from_secs(5));
        assert_eq!(settings.stream_batch_size(), 1);
        assert_eq!(
            settings.resolve_database_url(None).as_deref(),
            Some("postgres://registry@db/registry")
        );
    }

    #[rstest]
    fn explicit_urls_win_and_database_url_is_the_last_resort() {
        let _guard = lock_env([
            ("REGISTRY_DATABASE_URL", None),
            (DATABASE_URL_ENV, Some("postgres://fallback/db".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.resolve_database_url(Some("postgres://cli/db".to_owned())),
            Some("postgres://cli/db".to_owned())
        );
        assert_eq!(
            settings.resolve_database_url(None),
            Some("postgres://fallback/db".to_owned())
        );
    }
}
