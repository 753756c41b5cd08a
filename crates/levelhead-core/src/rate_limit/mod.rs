//! Rate limiting
//!
//! Four independent fixed-window limiters: per install, per IP on public
//! endpoints, per IP + API key hash on key status checks, and per IP on admin
//! endpoints.

pub mod config;
pub mod extractors;
pub mod key_hash;
pub mod limiter;
pub mod middleware;

pub use config::{RateLimitConfig, RateLimitTiers};
pub use extractors::{
	admin_ip_key, install_key, public_ip_key, status_check_key, KeyFn, TrustedProxies,
};
pub use key_hash::KeyHasher;
pub use limiter::{
	spawn_gc_task, Admission, BucketStore, MemoryBucketStore, RateLimitEngine, RateLimiterStats,
};
pub use middleware::RateLimitLayer;

// vim: ts=4
