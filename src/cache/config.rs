//! Result cache configuration.
//!
//! Mirrors the `[cache]` table of `wpp.toml` after validation.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_INTERVAL_VALUE: u32 = 1;
const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 250;
const DEFAULT_CAPACITY: usize = 512;

const MINUTE_SECS: u64 = 60;
const HOUR_SECS: u64 = 60 * MINUTE_SECS;
const DAY_SECS: u64 = 24 * HOUR_SECS;

/// Unit of the cache refresh interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minute,
    #[default]
    Hour,
    Day,
    Week,
    /// Thirty days.
    Month,
    /// 365 days.
    Year,
}

impl IntervalUnit {
    pub fn as_secs(self) -> u64 {
        match self {
            Self::Minute => MINUTE_SECS,
            Self::Hour => HOUR_SECS,
            Self::Day => DAY_SECS,
            Self::Week => 7 * DAY_SECS,
            Self::Month => 30 * DAY_SECS,
            Self::Year => 365 * DAY_SECS,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

/// Refresh interval expressed as quantity × unit (e.g. 5 minutes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheInterval {
    pub value: u32,
    pub unit: IntervalUnit,
}

impl Default for CacheInterval {
    fn default() -> Self {
        Self {
            value: DEFAULT_INTERVAL_VALUE,
            unit: IntervalUnit::default(),
        }
    }
}

impl CacheInterval {
    pub fn new(value: u32, unit: IntervalUnit) -> Self {
        Self { value, unit }
    }

    /// Time-to-live for entries written with this interval; a zero quantity
    /// is clamped to one unit.
    pub fn ttl(&self) -> Duration {
        let quantity = u64::from(self.value.max(1));
        Duration::from_secs(quantity.saturating_mul(self.unit.as_secs()))
    }
}

/// Runtime configuration of the popular-posts result cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store query results through the cache.
    pub active: bool,
    /// Entry lifetime.
    pub interval: CacheInterval,
    /// Upper bound on a single backend call before it is treated as a miss.
    pub backend_timeout_ms: u64,
    /// Maximum entries held by the in-memory store.
    pub capacity: usize,
    /// Coalesce concurrent misses on the same fingerprint.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            active: false,
            interval: CacheInterval::default(),
            backend_timeout_ms: DEFAULT_BACKEND_TIMEOUT_MS,
            capacity: DEFAULT_CAPACITY,
            single_flight: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            active: settings.active,
            interval: CacheInterval::new(settings.interval_value.get(), settings.interval_unit),
            backend_timeout_ms: settings.backend_timeout.as_millis().try_into().unwrap_or(u64::MAX),
            capacity: settings.capacity.get(),
            single_flight: settings.single_flight,
        }
    }
}

impl CacheConfig {
    /// Enabled cache with the given interval and otherwise default settings.
    pub fn enabled(interval: CacheInterval) -> Self {
        Self {
            active: true,
            interval,
            ..Default::default()
        }
    }

    pub fn ttl(&self) -> Duration {
        self.interval.ttl()
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms.max(1))
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
