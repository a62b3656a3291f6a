//! Store configuration, loaded from the environment

use crate::engine::CounterMode;
use tracing::warn;

/// Settings for the SQLite backend and the coordinator's counter mode.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_path: String,
    pub max_connections: u32,
    pub counter_mode: CounterMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "data/tether.db".to_string(),
            max_connections: 5,
            counter_mode: CounterMode::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset:
    /// `TETHER_DATABASE_PATH`, `TETHER_MAX_CONNECTIONS`,
    /// `TETHER_COUNTER_MODE` (`atomic` | `read-then-write`).
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let database_path =
            std::env::var("TETHER_DATABASE_PATH").unwrap_or(defaults.database_path);

        let max_connections = std::env::var("TETHER_MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!("TETHER_MAX_CONNECTIONS is not a number, using default");
                    None
                }
            })
            .unwrap_or(defaults.max_connections);

        let counter_mode = std::env::var("TETHER_COUNTER_MODE")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(mode) => Some(mode),
                Err(err) => {
                    warn!("{err}, using default");
                    None
                }
            })
            .unwrap_or(defaults.counter_mode);

        if counter_mode == CounterMode::ReadThenWrite {
            warn!("read-then-write counter mode is subject to lost updates under concurrency");
        }

        Self {
            database_path,
            max_connections,
            counter_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.database_path, "data/tether.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.counter_mode, CounterMode::AtomicDelta);
    }
}
