//! Popular-posts widget: settings normalization, cache-key derivation and a
//! fail-open TTL result cache around an external ranking query.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
