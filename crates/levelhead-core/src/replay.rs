//! Replay protection for submissions
//!
//! A submission carries a client timestamp and a nonce. The timestamp must be
//! within the submission window of the server clock, and each nonce may be used
//! once per submitter. Nonces are recorded in the shared nonce store with an
//! expiry of twice the window, so a nonce can never be replayed while its
//! timestamp would still be accepted. When the store cannot answer, the
//! submission is refused.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::prelude::*;
use crate::rate_limit::limiter::truncate_key;
use levelhead_types::nonce_adapter::NonceAdapter;

pub const DEFAULT_SUBMISSION_TTL: Duration = Duration::from_secs(5 * 60);

const NONCE_MIN_LEN: usize = 8;
const NONCE_MAX_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayConfig {
	/// Accepted distance between the submission timestamp and the server clock
	pub submission_ttl: Duration,
}

impl Default for ReplayConfig {
	fn default() -> Self {
		Self { submission_ttl: DEFAULT_SUBMISSION_TTL }
	}
}

/// `^[A-Za-z0-9_-]{8,128}$`
pub fn is_valid_nonce(nonce: &str) -> bool {
	(NONCE_MIN_LEN..=NONCE_MAX_LEN).contains(&nonce.len())
		&& nonce.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

pub fn nonce_key(key_id: &str, nonce: &str) -> String {
	format!("nonce:{}:{}", key_id, nonce)
}

// ReplayGuard //
//*************//
#[derive(Debug)]
pub struct ReplayGuard {
	config: ReplayConfig,
	store: Arc<dyn NonceAdapter>,
}

impl ReplayGuard {
	pub fn new(config: ReplayConfig, store: Arc<dyn NonceAdapter>) -> Self {
		Self { config, store }
	}

	pub fn config(&self) -> ReplayConfig {
		self.config
	}

	pub async fn check(&self, timestamp: TimestampMs, nonce: &str, key_id: &str) -> ClResult<()> {
		self.check_at(now_ms(), timestamp, nonce, key_id).await
	}

	/// Check against an explicit server clock reading
	pub async fn check_at(
		&self,
		now: TimestampMs,
		timestamp: TimestampMs,
		nonce: &str,
		key_id: &str,
	) -> ClResult<()> {
		let ttl_ms = u64::try_from(self.config.submission_ttl.as_millis()).unwrap_or(u64::MAX);
		if now.abs_diff(timestamp) > ttl_ms {
			debug!("submission timestamp {} outside window (now {})", timestamp, now);
			return Err(Error::InvalidTimestamp);
		}

		if !is_valid_nonce(nonce) {
			return Err(Error::InvalidNonce);
		}

		let key = nonce_key(key_id, nonce);
		match self.store.set_if_absent(&key, self.config.submission_ttl * 2).await {
			Ok(true) => Ok(()),
			Ok(false) => {
				warn!("replayed nonce from submitter {}", truncate_key(key_id));
				Err(Error::ReplayDetected)
			}
			Err(err) => {
				error!("nonce store unavailable, refusing submission: {}", err);
				Err(Error::ReplayStoreUnavailable)
			}
		}
	}
}

// SubmitterKeys //
//***************//
/// Derives the submitter key id nonces are scoped to
#[derive(Clone, Default)]
pub struct SubmitterKeys {
	secret: Option<Box<[u8]>>,
}

impl std::fmt::Debug for SubmitterKeys {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SubmitterKeys").field("configured", &self.secret.is_some()).finish()
	}
}

impl SubmitterKeys {
	pub fn new(secret: Option<&str>) -> Self {
		let secret = secret.map(str::trim).filter(|s| !s.is_empty()).map(|s| s.as_bytes().into());
		Self { secret }
	}

	pub fn is_configured(&self) -> bool {
		self.secret.is_some()
	}

	/// HMAC-SHA256 of the submitter address under the community secret, hex encoded
	pub fn key_id(&self, submitter: &str) -> ClResult<String> {
		let secret = self.secret.as_deref().ok_or_else(|| {
			Error::ServiceUnavailable("Player submissions are not configured on this server.".into())
		})?;
		let mut mac = Hmac::<Sha256>::new_from_slice(secret)
			.map_err(|err| Error::Internal(format!("hmac: {}", err)))?;
		mac.update(submitter.as_bytes());
		Ok(hex::encode(mac.finalize().into_bytes()))
	}
}


// vim: ts=4
