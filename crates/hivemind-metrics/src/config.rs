//! Service configuration
//!
//! Values come from environment variables with fallback to defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_QUERY_LIMIT: u32 = 100;
pub const MAX_QUERY_LIMIT: u32 = 1_000;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;
pub const TOTAL_NEURONS: u32 = 35;

#[derive(Debug, Clone)]
pub struct ObserveConfig {
    pub db_path: PathBuf,
    /// Limit applied to event queries that do not name one.
    pub default_limit: u32,
    /// Ceiling caller-supplied limits are clamped to.
    pub max_limit: u32,
    pub max_payload_bytes: usize,
    /// Zero disables filter catalog caching.
    pub catalog_ttl: Duration,
    /// Trailing window for active sessions; `None` means only the scan limit applies.
    pub active_session_window: Option<Duration>,
    /// Number of most recent events scanned by the session index.
    pub session_scan_limit: u32,
    pub max_catalog_sessions: usize,
    pub bus_capacity: usize,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            default_limit: DEFAULT_QUERY_LIMIT,
            max_limit: MAX_QUERY_LIMIT,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            catalog_ttl: Duration::from_secs(5),
            active_session_window: None,
            session_scan_limit: 1_000,
            max_catalog_sessions: 50,
            bus_capacity: 1_024,
        }
    }
}

impl ObserveConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `HIVEMIND_DB_PATH`: SQLite database file (default: ~/.hivemind/observability.db)
    /// - `HIVEMIND_DEFAULT_LIMIT`: default event query limit (default: 100)
    /// - `HIVEMIND_MAX_LIMIT`: event query limit ceiling (default: 1000)
    /// - `HIVEMIND_MAX_PAYLOAD_BYTES`: largest accepted event payload (default: 65536)
    /// - `HIVEMIND_CATALOG_TTL_SECS`: filter catalog cache TTL (default: 5)
    /// - `HIVEMIND_ACTIVE_WINDOW_SECS`: active session window (default: unset)
    /// - `HIVEMIND_SESSION_SCAN_LIMIT`: events scanned for active sessions (default: 1000)
    /// - `HIVEMIND_MAX_CATALOG_SESSIONS`: session ids listed in the catalog (default: 50)
    /// - `HIVEMIND_BUS_CAPACITY`: async ingestion channel capacity (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_limit = env_or("HIVEMIND_MAX_LIMIT", defaults.max_limit).max(1);

        Self {
            db_path: std::env::var("HIVEMIND_DB_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            default_limit: env_or("HIVEMIND_DEFAULT_LIMIT", defaults.default_limit)
                .clamp(1, max_limit),
            max_limit,
            max_payload_bytes: env_or("HIVEMIND_MAX_PAYLOAD_BYTES", defaults.max_payload_bytes),
            catalog_ttl: Duration::from_secs(env_or("HIVEMIND_CATALOG_TTL_SECS", 5)),
            active_session_window: std::env::var("HIVEMIND_ACTIVE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
            session_scan_limit: env_or("HIVEMIND_SESSION_SCAN_LIMIT", defaults.session_scan_limit)
                .max(1),
            max_catalog_sessions: env_or(
                "HIVEMIND_MAX_CATALOG_SESSIONS",
                defaults.max_catalog_sessions,
            ),
            bus_capacity: env_or("HIVEMIND_BUS_CAPACITY", defaults.bus_capacity).max(1),
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    /// Resolve a caller-supplied limit against the default and ceiling.
    pub fn effective_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".hivemind")
        .join("observability.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_expectations() {
        let config = ObserveConfig::default();
        assert_eq!(config.default_limit, 100);
        assert_eq!(config.max_limit, 1_000);
        assert!(config.active_session_window.is_none());
        assert!(config.db_path.ends_with("observability.db"));
    }

    #[test]
    fn effective_limit_defaults_and_clamps() {
        let config = ObserveConfig::default();
        assert_eq!(config.effective_limit(None), 100);
        assert_eq!(config.effective_limit(Some(10)), 10);
        assert_eq!(config.effective_limit(Some(50_000)), 1_000);
    }
}
