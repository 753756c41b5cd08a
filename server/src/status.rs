//! Public API key status endpoint

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::prelude::*;
use levelhead_core::rate_limit::extractors::presented_api_key;

const UUID_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
	pub key_hash: String,
	pub validation_status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct KeyStatusResponse {
	pub success: bool,
	pub data: KeyStatus,
}

/// Canonical 8-4-4-4-12 hex UUID
pub fn is_uuid_format(key: &str) -> bool {
	let groups: Vec<&str> = key.split('-').collect();
	groups.len() == UUID_GROUPS.len()
		&& groups
			.iter()
			.zip(UUID_GROUPS)
			.all(|(group, len)| group.len() == len && group.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// GET /api/public/apikey/status - Hash and status of the key in `X-API-Key`
///
/// Upstream validation of the key is not performed here, so the status is
/// always reported as `unchecked`.
pub async fn get_key_status(
	State(app): State<App>,
	headers: HeaderMap,
) -> ClResult<Json<KeyStatusResponse>> {
	let key = presented_api_key(&headers).ok_or_else(|| Error::BadRequest {
		code: "MISSING_KEY",
		message: "API key is required in x-api-key header.".into(),
	})?;
	if !is_uuid_format(&key) {
		return Err(Error::BadRequest {
			code: "INVALID_KEY",
			message: "API key must be a valid UUID.".into(),
		});
	}

	let key_hash = app.key_hasher.hash(&key)?;
	Ok(Json(KeyStatusResponse {
		success: true,
		data: KeyStatus { key_hash, validation_status: "unchecked" },
	}))
}


// vim: ts=4
