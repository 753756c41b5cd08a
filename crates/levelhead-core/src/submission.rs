//! Submission pipeline
//!
//! Runs validation, replay protection and corroboration in that order and
//! yields the accepted stats for the cache write. The first failing stage ends
//! the pipeline; nothing is partially accepted.

use serde_json::Value;

use crate::poisoning::corroborate;
use crate::prelude::*;
use crate::replay::ReplayGuard;
use crate::validation::SubmissionValidator;

/// Payload fields consumed by replay protection and never cached
const REPLAY_FIELDS: [&str; 2] = ["timestamp", "nonce"];

/// A submission that passed every stage
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedSubmission {
	pub uuid: PlayerUuid,
	pub stats: Value,
}

pub fn parse_uuid(raw: &str) -> ClResult<PlayerUuid> {
	PlayerUuid::parse(raw).ok_or_else(|| Error::BadRequest {
		code: "INVALID_UUID",
		message: "Player uuid must be 32 hex characters, dashes optional.".into(),
	})
}

/// Client timestamp in ms. Fractional or exponent-form numbers are truncated.
#[allow(clippy::cast_possible_truncation)]
fn timestamp_ms(value: &Value) -> Option<TimestampMs> {
	value.as_i64().or_else(|| value.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms.trunc() as i64))
}

#[derive(Debug)]
pub struct SubmissionPipeline {
	validator: SubmissionValidator,
	replay: ReplayGuard,
}

impl SubmissionPipeline {
	pub fn new(validator: SubmissionValidator, replay: ReplayGuard) -> Self {
		Self { validator, replay }
	}

	pub fn validator(&self) -> &SubmissionValidator {
		&self.validator
	}

	/// Check a submission for `uuid` from the submitter identified by `key_id`.
	///
	/// `trusted` is the last trusted record cached for the player.
	pub async fn process(
		&self,
		uuid: &PlayerUuid,
		payload: Value,
		key_id: &str,
		trusted: Option<&Value>,
	) -> ClResult<AcceptedSubmission> {
		self.validator.validate(&payload)?.into_result()?;

		let timestamp = payload.get("timestamp").and_then(timestamp_ms).ok_or(Error::InvalidTimestamp)?;
		let nonce = payload.get("nonce").and_then(Value::as_str).ok_or(Error::InvalidNonce)?;
		self.replay.check(timestamp, nonce, key_id).await?;

		corroborate(trusted, &payload)?;

		let mut stats = payload;
		if let Some(fields) = stats.as_object_mut() {
			for field in REPLAY_FIELDS {
				fields.remove(field);
			}
		}

		info!("accepted community submission for {}", uuid);
		Ok(AcceptedSubmission { uuid: uuid.clone(), stats })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::replay::ReplayConfig;
	use async_trait::async_trait;
	use levelhead_types::nonce_adapter::NonceAdapter;
	use parking_lot::Mutex;
	use serde_json::json;
	use std::collections::HashSet;
	use std::sync::Arc;
	use std::time::Duration;

	#[derive(Debug, Default)]
	struct MemoryNonces(Mutex<HashSet<String>>);

	#[async_trait]
	impl NonceAdapter for MemoryNonces {
		async fn set_if_absent(&self, key: &str, _ttl: Duration) -> ClResult<bool> {
			Ok(self.0.lock().insert(key.to_string()))
		}
	}

	fn pipeline() -> (SubmissionPipeline, Arc<MemoryNonces>) {
		let nonces = Arc::new(MemoryNonces::default());
		let replay = ReplayGuard::new(ReplayConfig::default(), nonces.clone());
		(SubmissionPipeline::new(SubmissionValidator::default(), replay), nonces)
	}

	fn uuid() -> PlayerUuid {
		parse_uuid("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap()
	}

	fn payload(nonce: &str, kills: u64) -> Value {
		json!({
			"bedwars_experience": 1000,
			"final_kills_bedwars": kills,
			"timestamp": now_ms(),
			"nonce": nonce,
		})
	}

	#[test]
	fn test_parse_uuid() {
		assert_eq!(uuid().as_str(), "069a79f444e94726a5befca90e38aaf5");
		assert_eq!(parse_uuid("nope").unwrap_err().code(), "INVALID_UUID");
	}

	#[tokio::test]
	async fn test_accepts_corroborated_submission() {
		let (p, _) = pipeline();
		let trusted = json!({ "bedwars_experience": 1000, "final_kills_bedwars": 50 });
		let accepted = p.process(&uuid(), payload("nonce-aaaa", 50), "kid", Some(&trusted)).await.unwrap();
		assert_eq!(accepted.stats["final_kills_bedwars"], 50);
		assert_eq!(accepted.stats["bedwars_experience"], 1000);
		assert!(accepted.stats.get("timestamp").is_none());
		assert!(accepted.stats.get("nonce").is_none());
	}

	#[tokio::test]
	async fn test_validation_runs_before_replay() {
		let (p, nonces) = pipeline();
		let mut bad = payload("nonce-bbbb", 50);
		bad["kills_bedwars"] = json!(-4);
		let err = p.process(&uuid(), bad, "kid", None).await.unwrap_err();
		assert_eq!(err.code(), "VALIDATION_FAILED");
		assert!(nonces.0.lock().is_empty());
	}

	#[tokio::test]
	async fn test_missing_timestamp_or_nonce() {
		let (p, _) = pipeline();
		let mut no_ts = payload("nonce-cccc", 50);
		no_ts.as_object_mut().unwrap().remove("timestamp");
		assert_eq!(p.process(&uuid(), no_ts, "kid", None).await.unwrap_err().code(), "INVALID_TIMESTAMP");

		let mut no_nonce = payload("nonce-cccc", 50);
		no_nonce["nonce"] = json!(12345678);
		assert_eq!(p.process(&uuid(), no_nonce, "kid", None).await.unwrap_err().code(), "INVALID_NONCE");
	}

	#[test]
	fn test_timestamp_ms() {
		assert_eq!(timestamp_ms(&json!(1_700_000_000_123_i64)), Some(1_700_000_000_123));
		assert_eq!(timestamp_ms(&json!(1_700_000_000_123.9)), Some(1_700_000_000_123));
		assert_eq!(timestamp_ms(&json!(1.7e12)), Some(1_700_000_000_000));
		assert_eq!(timestamp_ms(&json!("1700000000123")), None);
		assert_eq!(timestamp_ms(&json!(null)), None);
	}

	#[tokio::test]
	#[allow(clippy::cast_precision_loss)]
	async fn test_accepts_float_timestamp() {
		let (p, _) = pipeline();
		let trusted = json!({ "bedwars_experience": 1000, "final_kills_bedwars": 50 });
		let mut submitted = payload("nonce-eeee", 50);
		submitted["timestamp"] = json!(now_ms() as f64);
		let accepted = p.process(&uuid(), submitted, "kid", Some(&trusted)).await.unwrap();
		assert_eq!(accepted.stats["final_kills_bedwars"], 50);

		let mut stale = payload("nonce-ffff", 50);
		stale["timestamp"] = json!(1.0e3);
		let err = p.process(&uuid(), stale, "kid", Some(&trusted)).await.unwrap_err();
		assert_eq!(err.code(), "INVALID_TIMESTAMP");
	}

	#[tokio::test]
	async fn test_replay_checked_before_corroboration() {
		let (p, nonces) = pipeline();
		let trusted = json!({ "final_kills_bedwars": 50 });
		// Corroboration fails, but the nonce was already consumed
		let err = p.process(&uuid(), payload("nonce-dddd", 51), "kid", Some(&trusted)).await.unwrap_err();
		assert_eq!(err.code(), "UNVERIFIED_SUBMISSION");
		assert!(nonces.0.lock().contains("nonce:kid:nonce-dddd"));

		let err = p.process(&uuid(), payload("nonce-dddd", 50), "kid", Some(&trusted)).await.unwrap_err();
		assert_eq!(err.code(), "REPLAY_DETECTED");
	}
}

// vim: ts=4
