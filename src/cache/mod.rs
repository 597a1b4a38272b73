//! Popular-posts result cache.
//!
//! Query results are cached under a [`Fingerprint`] of the normalized widget
//! configuration:
//!
//! - **Keys**: SHA-256 over the canonical JSON encoding of the configuration.
//! - **Store**: pluggable [`ResultStore`]; [`MemoryResultStore`] keeps
//!   entries in-process with LRU eviction and lazy TTL expiry.
//! - **Facade**: [`ResultCache`] bounds backend calls, fails open and
//!   coalesces concurrent misses per fingerprint.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! active = true
//! interval_value = 5
//! interval_unit = "minute"
//! backend_timeout_ms = 250
//! ```

mod clock;
mod config;
mod flight;
mod keys;
mod lock;
mod result_cache;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheInterval, IntervalUnit};
pub use flight::{Flight, FlightLease, FlightWaiter, SingleFlight};
pub use keys::{Fingerprint, canonical_bytes, derive_key};
pub use result_cache::{
    CacheStatus, METRIC_CACHE_BYPASS, METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
    ResultCache,
};
pub use store::{CacheEntry, MemoryResultStore, ResultStore, StoreError};
