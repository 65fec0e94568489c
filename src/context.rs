//! Per-call inputs of the write path and the clock the store reads time from.

use std::fmt::Debug;
use std::net::IpAddr;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use time::OffsetDateTime;

/// Longest user agent persisted, in bytes.
pub const MAX_USER_AGENT_LEN: usize = 255;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    // An unterminated tag swallows the rest of the string.
    Regex::new(r"<[^>]*(?:>|$)").expect("static regex")
});

/// Identity and request metadata for one write.
///
/// The store never reads these from ambient state; the request layer builds
/// one per request. `client_ip` and `user_agent` are only persisted when the
/// matching tracking flag is enabled in [`StoreConfig`](crate::StoreConfig).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteContext {
    /// Authenticated user, 0 if anonymous.
    pub user_id: u32,
    /// Application-defined current resource (e.g. the current page), 0 if none.
    pub resource_id: u32,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    /// Explicit expiry. Without one the session lives until it has not been
    /// written for the sweep's maximum age.
    pub expires_at: Option<OffsetDateTime>,
}

impl WriteContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: u32) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn with_resource(mut self, resource_id: u32) -> Self {
        self.resource_id = resource_id;
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Numeric encoding of a client address.
///
/// IPv4 addresses map to their big-endian `u32` value. IPv6 addresses only
/// have an encoding when they are IPv4-mapped; every other address encodes
/// as 0, the same as an untracked address.
pub fn encode_ip(ip: IpAddr) -> u32 {
    match ip {
        IpAddr::V4(v4) => u32::from(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(u32::from).unwrap_or(0),
    }
}

/// Strip markup from a user agent and cut it to [`MAX_USER_AGENT_LEN`] bytes
/// without splitting a character.
pub fn sanitize_user_agent(raw: &str) -> String {
    let stripped = TAG.replace_all(raw, "");
    let trimmed = stripped.trim();

    let mut end = trimmed.len().min(MAX_USER_AGENT_LEN);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Source of "now" for timestamps, GC cutoffs and activity windows.
pub trait Clock: Debug + Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to. Useful for exercising GC windows.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: time::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
