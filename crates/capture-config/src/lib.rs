//! Configuration for the capture-session core.
//!
//! Every option named in `spec.md` §6 has a typed accessor here with its
//! default baked in; clamping (poll-interval floors, batch-size bounds)
//! happens in exactly one place so no caller has to re-derive it.
//!
//! Unlike the teacher's layered-YAML config (`mqk-config`), this core is
//! deployed as a 12-factor-style bot process, so configuration is sourced
//! from environment variables rather than merged YAML files — §6 of the
//! spec defines configuration purely as named options with defaults, not a
//! file format.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// `database-url`. If absent, the whole core is disabled and the
/// dispatchers never run (per `spec.md` §6).
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

const ENV_SESSIONS_ENABLED: &str = "DISPATCHER_SESSIONS_ENABLED";
const ENV_SESSIONS_POLL_SECONDS: &str = "DISPATCHER_SESSIONS_POLL_SECONDS";
const ENV_NOTIFICATIONS_ENABLED: &str = "DISPATCHER_NOTIFICATIONS_ENABLED";
const ENV_NOTIFICATIONS_POLL_SECONDS: &str = "DISPATCHER_NOTIFICATIONS_POLL_SECONDS";
const ENV_NOTIFICATIONS_BATCH_SIZE: &str = "DISPATCHER_NOTIFICATIONS_BATCH_SIZE";

const SESSIONS_POLL_SECONDS_DEFAULT: u64 = 5;
const NOTIFICATIONS_POLL_SECONDS_DEFAULT: u64 = 3;
const NOTIFICATIONS_BATCH_SIZE_DEFAULT: i64 = 20;
const NOTIFICATIONS_BATCH_SIZE_MIN: i64 = 1;
const NOTIFICATIONS_BATCH_SIZE_MAX: i64 = 100;
const POLL_SECONDS_FLOOR: u64 = 1;

/// Fully resolved configuration for one process.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: Option<String>,
    pub sessions: SessionDispatcherConfig,
    pub notifications: NotificationDispatcherConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionDispatcherConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct NotificationDispatcherConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub batch_size: i64,
}

impl CoreConfig {
    /// Load from the process environment. Never fails: a missing
    /// `DATABASE_URL` is represented as `None`, not an error, because
    /// callers decide whether that's fatal (the CLI does; a unit test
    /// constructing a config for clamping checks does not care).
    pub fn from_env() -> Self {
        Self {
            database_url: env::var(ENV_DATABASE_URL).ok(),
            sessions: SessionDispatcherConfig {
                enabled: bool_env(ENV_SESSIONS_ENABLED, true),
                poll_interval: Duration::from_secs(
                    u64_env(ENV_SESSIONS_POLL_SECONDS, SESSIONS_POLL_SECONDS_DEFAULT)
                        .max(POLL_SECONDS_FLOOR),
                ),
            },
            notifications: NotificationDispatcherConfig {
                enabled: bool_env(ENV_NOTIFICATIONS_ENABLED, true),
                poll_interval: Duration::from_secs(
                    u64_env(
                        ENV_NOTIFICATIONS_POLL_SECONDS,
                        NOTIFICATIONS_POLL_SECONDS_DEFAULT,
                    )
                    .max(POLL_SECONDS_FLOOR),
                ),
                batch_size: i64_env(
                    ENV_NOTIFICATIONS_BATCH_SIZE,
                    NOTIFICATIONS_BATCH_SIZE_DEFAULT,
                )
                .clamp(NOTIFICATIONS_BATCH_SIZE_MIN, NOTIFICATIONS_BATCH_SIZE_MAX),
            },
        }
    }

    /// Require `database_url`, for entry points that cannot proceed without
    /// persistence (the core is disabled entirely if absent — `spec.md` §6).
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .with_context(|| format!("missing env var {ENV_DATABASE_URL}; core is disabled"))
    }
}

fn bool_env(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn u64_env(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn i64_env(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch
    // them so they don't race each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for k in [
            ENV_DATABASE_URL,
            ENV_SESSIONS_ENABLED,
            ENV_SESSIONS_POLL_SECONDS,
            ENV_NOTIFICATIONS_ENABLED,
            ENV_NOTIFICATIONS_POLL_SECONDS,
            ENV_NOTIFICATIONS_BATCH_SIZE,
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_match_spec() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let cfg = CoreConfig::from_env();
        assert!(cfg.database_url.is_none());
        assert!(cfg.sessions.enabled);
        assert_eq!(cfg.sessions.poll_interval, Duration::from_secs(5));
        assert!(cfg.notifications.enabled);
        assert_eq!(cfg.notifications.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.notifications.batch_size, 20);
    }

    #[test]
    fn poll_seconds_floored_at_one() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var(ENV_SESSIONS_POLL_SECONDS, "0");
        env::set_var(ENV_NOTIFICATIONS_POLL_SECONDS, "0");
        let cfg = CoreConfig::from_env();
        assert_eq!(cfg.sessions.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.notifications.poll_interval, Duration::from_secs(1));
        clear_all();
    }

    #[test]
    fn batch_size_clamped_to_1_100() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var(ENV_NOTIFICATIONS_BATCH_SIZE, "0");
        assert_eq!(CoreConfig::from_env().notifications.batch_size, 1);

        env::set_var(ENV_NOTIFICATIONS_BATCH_SIZE, "500");
        assert_eq!(CoreConfig::from_env().notifications.batch_size, 100);

        env::set_var(ENV_NOTIFICATIONS_BATCH_SIZE, "42");
        assert_eq!(CoreConfig::from_env().notifications.batch_size, 42);
        clear_all();
    }

    #[test]
    fn dispatchers_can_be_disabled() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var(ENV_SESSIONS_ENABLED, "false");
        env::set_var(ENV_NOTIFICATIONS_ENABLED, "0");
        let cfg = CoreConfig::from_env();
        assert!(!cfg.sessions.enabled);
        assert!(!cfg.notifications.enabled);
        clear_all();
    }

    #[test]
    fn require_database_url_errors_when_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let cfg = CoreConfig::from_env();
        assert!(cfg.require_database_url().is_err());
        clear_all();
    }
}
