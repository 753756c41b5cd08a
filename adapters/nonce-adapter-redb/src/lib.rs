//! redb-backed nonce store.
//!
//! Nonces live in a single table mapping the nonce key to its expiry time in
//! Unix milliseconds. Set-if-absent runs inside one write transaction, and redb
//! serializes write transactions, so two racing submissions of the same nonce
//! can never both succeed. Expired entries count as absent and are removed by a
//! background purge task.

#![forbid(unsafe_code)]

mod error;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use error::Error;

use levelhead::nonce_adapter::NonceAdapter;
use levelhead::prelude::*;

/// Nonce table: key -> expiry (Unix ms)
pub const TABLE_NONCES: redb::TableDefinition<&str, u64> = redb::TableDefinition::new("nonces");

/// Adapter configuration options
#[derive(Debug, Clone)]
pub struct AdapterConfig {
	/// How often expired nonces are purged
	pub purge_interval: Duration,

	/// Enable the background purge task
	pub auto_purge: bool,
}

impl Default for AdapterConfig {
	fn default() -> Self {
		Self { purge_interval: Duration::from_secs(60), auto_purge: true }
	}
}

fn now_unix_ms() -> u64 {
	u64::try_from(now_ms()).unwrap_or_default()
}

fn duration_ms(d: Duration) -> u64 {
	u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn set_if_absent_sync(db: &redb::Database, key: &str, now: u64, ttl_ms: u64) -> Result<bool, Error> {
	use redb::ReadableTable;

	let tx = db.begin_write().map_err(error::from_redb_error)?;
	let inserted = {
		let mut table = tx.open_table(TABLE_NONCES).map_err(error::from_redb_error)?;
		let live = table
			.get(key)
			.map_err(error::from_redb_error)?
			.is_some_and(|expires_at| expires_at.value() > now);
		if !live {
			table.insert(key, now.saturating_add(ttl_ms)).map_err(error::from_redb_error)?;
		}
		!live
	};
	tx.commit().map_err(error::from_redb_error)?;
	Ok(inserted)
}

fn purge_sync(db: &redb::Database, now: u64) -> Result<usize, Error> {
	let tx = db.begin_write().map_err(error::from_redb_error)?;
	let mut removed = 0;
	{
		let mut table = tx.open_table(TABLE_NONCES).map_err(error::from_redb_error)?;
		table
			.retain(|_key, expires_at| {
				let keep = expires_at > now;
				if !keep {
					removed += 1;
				}
				keep
			})
			.map_err(error::from_redb_error)?;
	}
	tx.commit().map_err(error::from_redb_error)?;
	Ok(removed)
}

/// redb-based implementation of NonceAdapter
#[derive(Debug)]
pub struct NonceAdapterRedb {
	path: PathBuf,
	db: Arc<redb::Database>,
}

impl NonceAdapterRedb {
	/// Open or create the nonce database at `path`
	pub async fn new(path: impl Into<PathBuf>, config: AdapterConfig) -> ClResult<Self> {
		let path = path.into();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}

		let db_path = path.clone();
		let db = tokio::task::spawn_blocking(move || -> Result<redb::Database, Error> {
			let db = redb::Database::create(&db_path).map_err(error::from_redb_error)?;
			let tx = db.begin_write().map_err(error::from_redb_error)?;
			let _ = tx.open_table(TABLE_NONCES).map_err(error::from_redb_error)?;
			tx.commit().map_err(error::from_redb_error)?;
			Ok(db)
		})
		.await
		.map_err(Error::from)??;

		info!("Opened nonce store at {}", path.display());
		let adapter = Self { path, db: Arc::new(db) };

		if config.auto_purge {
			adapter.spawn_purge_task(config.purge_interval);
		}

		Ok(adapter)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Set-if-absent against an explicit clock reading (Unix ms)
	pub async fn set_if_absent_at(&self, key: &str, ttl: Duration, now: u64) -> ClResult<bool> {
		let db = Arc::clone(&self.db);
		let key = key.to_string();
		let ttl_ms = duration_ms(ttl);

		let inserted =
			tokio::task::spawn_blocking(move || set_if_absent_sync(&db, &key, now, ttl_ms))
				.await
				.map_err(Error::from)??;
		Ok(inserted)
	}

	/// Remove entries expired at `now` (Unix ms)
	pub async fn purge_expired_at(&self, now: u64) -> ClResult<usize> {
		let db = Arc::clone(&self.db);
		let removed = tokio::task::spawn_blocking(move || purge_sync(&db, now))
			.await
			.map_err(Error::from)??;
		Ok(removed)
	}

	/// Number of stored entries, expired ones included
	pub async fn len(&self) -> ClResult<u64> {
		let db = Arc::clone(&self.db);
		let len = tokio::task::spawn_blocking(move || -> Result<u64, Error> {
			use redb::{ReadableDatabase, ReadableTableMetadata};

			let tx = db.begin_read().map_err(error::from_redb_error)?;
			let table = tx.open_table(TABLE_NONCES).map_err(error::from_redb_error)?;
			table.len().map_err(error::from_redb_error)
		})
		.await
		.map_err(Error::from)??;
		Ok(len)
	}

	/// Spawn background purge task. Stops when the adapter is dropped.
	fn spawn_purge_task(&self, period: Duration) {
		let db: Weak<redb::Database> = Arc::downgrade(&self.db);

		tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			interval.tick().await;

			loop {
				interval.tick().await;
				let Some(db) = db.upgrade() else {
					break;
				};

				let now = now_unix_ms();
				match tokio::task::spawn_blocking(move || purge_sync(&db, now)).await {
					Ok(Ok(removed)) if removed > 0 => debug!("Purged {} expired nonces", removed),
					Ok(Ok(_)) => {}
					Ok(Err(err)) => warn!("Nonce purge failed: {}", err),
					Err(err) => warn!("Nonce purge task failed: {}", err),
				}
			}
		});
	}
}

#[async_trait]
impl NonceAdapter for NonceAdapterRedb {
	async fn set_if_absent(&self, key: &str, ttl: Duration) -> ClResult<bool> {
		self.set_if_absent_at(key, ttl, now_unix_ms()).await
	}
}

// vim: ts=4
