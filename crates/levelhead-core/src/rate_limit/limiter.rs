//! Fixed-Window Rate Limiter
//!
//! Counts requests per key inside fixed windows. A key whose window elapsed is
//! reset rather than incremented, so a burst straddling a window edge may see up
//! to twice the configured maximum.
//!
//! Idle buckets are collected by a background task that only holds a weak
//! reference to the engine.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use super::config::RateLimitConfig;
use crate::prelude::*;

/// Counter state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBucket {
	pub count: u32,
	pub window_started_at: Instant,
	pub last_updated_at: Instant,
}

impl RateBucket {
	fn fresh(now: Instant) -> Self {
		Self { count: 1, window_started_at: now, last_updated_at: now }
	}
}

/// Storage for rate buckets.
///
/// `apply` must run the update and store its result as one atomic step for the
/// given key.
pub trait BucketStore: Debug + Send + Sync {
	/// Replace the bucket of `key` with the result of `update`
	fn apply(&self, key: &str, update: &mut dyn FnMut(Option<RateBucket>) -> RateBucket);

	/// Remove buckets not touched since `cutoff`, returning how many were removed
	fn remove_idle(&self, cutoff: Instant) -> usize;

	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

// MemoryBucketStore //
//*******************//
/// Process-local bucket store guarded by a mutex
#[derive(Debug, Default)]
pub struct MemoryBucketStore {
	buckets: Mutex<HashMap<Box<str>, RateBucket>>,
}

impl MemoryBucketStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl BucketStore for MemoryBucketStore {
	fn apply(&self, key: &str, update: &mut dyn FnMut(Option<RateBucket>) -> RateBucket) {
		let mut buckets = self.buckets.lock();
		let next = update(buckets.get(key).copied());
		if let Some(bucket) = buckets.get_mut(key) {
			*bucket = next;
		} else {
			buckets.insert(key.into(), next);
		}
	}

	fn remove_idle(&self, cutoff: Instant) -> usize {
		let mut buckets = self.buckets.lock();
		let before = buckets.len();
		buckets.retain(|_, bucket| bucket.last_updated_at >= cutoff);
		before - buckets.len()
	}

	fn len(&self) -> usize {
		self.buckets.lock().len()
	}
}

/// A successful admission, used for the `RateLimit-*` response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
	pub limit: u32,
	pub remaining: u32,
	/// Time until the current window ends
	pub reset_after: Duration,
}

/// Limiter statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
	pub name: &'static str,
	pub window_ms: u64,
	pub max: u32,
	pub tracked_keys: usize,
	pub total_requests_limited: u64,
}

// RateLimitEngine //
//*****************//
#[derive(Debug)]
pub struct RateLimitEngine {
	name: &'static str,
	config: RateLimitConfig,
	store: Box<dyn BucketStore>,
	total_limited: AtomicU64,
}

impl RateLimitEngine {
	/// Create an engine backed by a process-local store
	pub fn new(name: &'static str, config: RateLimitConfig) -> Self {
		Self::with_store(name, config, Box::new(MemoryBucketStore::new()))
	}

	pub fn with_store(
		name: &'static str,
		config: RateLimitConfig,
		store: Box<dyn BucketStore>,
	) -> Self {
		// Zero values would admit the first request anyway or stall the GC interval
		let config = RateLimitConfig {
			window: config.window.max(Duration::from_millis(1)),
			max: config.max.max(1),
		};
		Self { name, config, store, total_limited: AtomicU64::new(0) }
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn config(&self) -> RateLimitConfig {
		self.config
	}

	/// Count one request for `key`
	pub fn check(&self, key: &str) -> ClResult<Admission> {
		self.check_at(key, Instant::now())
	}

	pub fn check_at(&self, key: &str, now: Instant) -> ClResult<Admission> {
		let RateLimitConfig { window, max } = self.config;
		let mut outcome = Err(Duration::ZERO);

		self.store.apply(key, &mut |bucket| match bucket {
			Some(mut bucket) if now.saturating_duration_since(bucket.window_started_at) < window => {
				let reset_after = (bucket.window_started_at + window).saturating_duration_since(now);
				if bucket.count >= max {
					outcome = Err(reset_after);
				} else {
					bucket.count += 1;
					outcome = Ok(Admission { limit: max, remaining: max - bucket.count, reset_after });
				}
				bucket.last_updated_at = now;
				bucket
			}
			_ => {
				outcome = Ok(Admission { limit: max, remaining: max - 1, reset_after: window });
				RateBucket::fresh(now)
			}
		});

		outcome.map_err(|retry_after| {
			self.total_limited.fetch_add(1, Ordering::Relaxed);
			debug!("[{}] rate limited key {}", self.name, truncate_key(key));
			Error::RateLimited { retry_after }
		})
	}

	/// Drop buckets idle for more than two windows
	pub fn sweep(&self) -> usize {
		self.sweep_at(Instant::now())
	}

	pub fn sweep_at(&self, now: Instant) -> usize {
		let idle = self.config.window * 2;
		match now.checked_sub(idle) {
			Some(cutoff) => self.store.remove_idle(cutoff),
			None => 0,
		}
	}

	pub fn stats(&self) -> RateLimiterStats {
		RateLimiterStats {
			name: self.name,
			window_ms: u64::try_from(self.config.window.as_millis()).unwrap_or(u64::MAX),
			max: self.config.max,
			tracked_keys: self.store.len(),
			total_requests_limited: self.total_limited.load(Ordering::Relaxed),
		}
	}
}

/// First 12 characters of a key, for log lines
pub fn truncate_key(key: &str) -> &str {
	key.char_indices().nth(12).map_or(key, |(idx, _)| &key[..idx])
}

/// Spawn the idle-bucket collector for an engine.
///
/// Runs once per window and exits when the engine is dropped.
pub fn spawn_gc_task(engine: &Arc<RateLimitEngine>) -> tokio::task::JoinHandle<()> {
	let weak: Weak<RateLimitEngine> = Arc::downgrade(engine);
	let period = engine.config.window;

	tokio::spawn(async move {
		let mut interval = tokio::time::interval_at(Instant::now() + period, period);
		loop {
			interval.tick().await;
			let Some(engine) = weak.upgrade() else {
				break;
			};
			let removed = engine.sweep();
			if removed > 0 {
				debug!("[{}] collected {} idle buckets", engine.name, removed);
			}
		}
	})
}


// vim: ts=4
