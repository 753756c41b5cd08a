//! In-process player stats cache
//!
//! Keeps the last upstream record of each player as the trusted copy, and the
//! latest accepted record (upstream or community) for reads. Community
//! submissions never replace the trusted copy, so corroboration always runs
//! against upstream data.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::prelude::*;
use levelhead_types::stats_adapter::{RecordSource, StatsCacheAdapter};

#[derive(Debug, Clone)]
pub struct CachedRecord {
	pub stats: Value,
	pub source: RecordSource,
	pub cached_at: TimestampMs,
}

#[derive(Debug, Default)]
struct Entry {
	trusted: Option<Value>,
	latest: Option<CachedRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStatsCache {
	entries: Mutex<HashMap<Box<str>, Entry>>,
}

impl MemoryStatsCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Latest accepted record of a player
	pub fn get(&self, uuid: &PlayerUuid) -> Option<CachedRecord> {
		self.entries.lock().get(uuid.as_str()).and_then(|entry| entry.latest.clone())
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn store(&self, uuid: &PlayerUuid, stats: Value, source: RecordSource) {
		let mut entries = self.entries.lock();
		let entry = entries.entry(uuid.as_str().into()).or_default();
		if source == RecordSource::Upstream {
			entry.trusted = Some(stats.clone());
		}
		entry.latest = Some(CachedRecord { stats, source, cached_at: now_ms() });
	}
}

#[async_trait]
impl StatsCacheAdapter for MemoryStatsCache {
	async fn read(&self, uuid: &PlayerUuid) -> ClResult<Option<Value>> {
		Ok(self.get(uuid).map(|record| record.stats))
	}

	async fn read_trusted(&self, uuid: &PlayerUuid) -> ClResult<Option<Value>> {
		Ok(self.entries.lock().get(uuid.as_str()).and_then(|entry| entry.trusted.clone()))
	}

	async fn write_accepted(
		&self,
		uuid: &PlayerUuid,
		stats: Value,
		source: RecordSource,
	) -> ClResult<()> {
		debug!("caching {} record for {}", source.as_str(), uuid);
		self.store(uuid, stats, source);
		Ok(())
	}
}


// vim: ts=4
