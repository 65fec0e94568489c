use std::time::Duration;

use crate::error::{Error, Result};

/// Upper bound on every configured duration (100 years).
pub const MAX_CONFIG_DURATION: Duration = Duration::from_secs(100 * 365 * 86400);

/// Recognised store options.
///
/// Tracking flags decide whether the client address and user agent handed in
/// through [`WriteContext`](crate::WriteContext) are persisted. When a flag is
/// off the column is written as `0` / empty, never null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub track_ip: bool,
    pub track_user_agent: bool,
    /// Longest time `read` waits for the per-session lock.
    pub lock_wait: Duration,
    /// Age after which a synthesized lock row is considered abandoned.
    pub stale_lock_after: Duration,
    /// Max age used by the tower adapter's expired deletion and the
    /// background GC task.
    pub session_lifetime: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            track_ip: false,
            track_user_agent: false,
            lock_wait: Duration::from_secs(50),
            stale_lock_after: Duration::from_secs(300),
            session_lifetime: Duration::from_secs(86400), // 24 hours
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `SESSION_TRACK_IP` | `track_ip` |
    /// | `SESSION_TRACK_USER_AGENT` | `track_user_agent` |
    /// | `SESSION_LOCK_WAIT_SECONDS` | `lock_wait` |
    /// | `SESSION_STALE_LOCK_SECONDS` | `stale_lock_after` |
    /// | `SESSION_LIFETIME_SECONDS` | `session_lifetime` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            track_ip: parse_bool(&lookup, "SESSION_TRACK_IP")?.unwrap_or(defaults.track_ip),
            track_user_agent: parse_bool(&lookup, "SESSION_TRACK_USER_AGENT")?
                .unwrap_or(defaults.track_user_agent),
            lock_wait: parse_seconds(&lookup, "SESSION_LOCK_WAIT_SECONDS")?
                .unwrap_or(defaults.lock_wait),
            stale_lock_after: parse_seconds(&lookup, "SESSION_STALE_LOCK_SECONDS")?
                .unwrap_or(defaults.stale_lock_after),
            session_lifetime: parse_seconds(&lookup, "SESSION_LIFETIME_SECONDS")?
                .unwrap_or(defaults.session_lifetime),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("lock wait", self.lock_wait),
            ("stale lock threshold", self.stale_lock_after),
            ("session lifetime", self.session_lifetime),
        ] {
            if value > MAX_CONFIG_DURATION {
                return Err(Error::Config(format!(
                    "{name} of {}s exceeds the maximum of {}s",
                    value.as_secs(),
                    MAX_CONFIG_DURATION.as_secs()
                )));
            }
        }
        if self.session_lifetime.is_zero() {
            return Err(Error::Config(
                "session lifetime must be greater than zero".to_string(),
            ));
        }
        if self.stale_lock_after < self.lock_wait {
            return Err(Error::Config(format!(
                "stale lock threshold ({}s) must not be shorter than the lock wait ({}s)",
                self.stale_lock_after.as_secs(),
                self.lock_wait.as_secs()
            )));
        }
        Ok(())
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
        other => Err(Error::Config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}

fn parse_seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|e| Error::Config(format!("{key}: {e}")))
}
