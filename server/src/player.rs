//! Player stats endpoints used by the mod

use axum::{
	extract::{rejection::JsonRejection, Path, State},
	http::StatusCode,
	Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::extract::ClientIp;
use crate::prelude::*;
use levelhead_core::submission::parse_uuid;
use levelhead_types::stats_adapter::RecordSource;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
	pub success: bool,
	pub message: &'static str,
}

/// GET /api/player/{uuid} - Cached stats of a player
pub async fn get_player(State(app): State<App>, Path(uuid): Path<String>) -> ClResult<Json<Value>> {
	let uuid = parse_uuid(&uuid)?;
	match app.stats_cache.read(&uuid).await? {
		Some(stats) => Ok(Json(stats)),
		None => Err(Error::NotFound),
	}
}

/// POST /api/player/submit - Community submission of player stats
///
/// Body: `{"uuid": "...", "data": {...}}`. `data` carries the stats together
/// with the `timestamp` and `nonce` used for replay protection.
pub async fn post_submit(
	State(app): State<App>,
	ClientIp(ip): ClientIp,
	body: Result<Json<Value>, JsonRejection>,
) -> ClResult<(StatusCode, Json<SubmitResponse>)> {
	let Json(mut body) = body.map_err(|rejection| {
		debug!("rejected submission body: {}", rejection.body_text());
		Error::BadRequest {
			code: "BAD_REQUEST",
			message: "Expected JSON body with uuid and data fields.".into(),
		}
	})?;

	let uuid = parse_uuid(body.get("uuid").and_then(Value::as_str).unwrap_or_default())?;

	let data = body.get_mut("data").map(Value::take).filter(Value::is_object).ok_or_else(|| {
		Error::BadRequest {
			code: "INVALID_DATA",
			message: "data must be a non-null, non-array object.".into(),
		}
	})?;

	let key_id = app.submitter_keys.key_id(&ip.to_string())?;
	let trusted = app.stats_cache.read_trusted(&uuid).await?;
	let accepted = app.pipeline.process(&uuid, data, &key_id, trusted.as_ref()).await?;

	app.stats_cache
		.write_accepted(&accepted.uuid, accepted.stats, RecordSource::CommunityVerified)
		.await?;

	Ok((
		StatusCode::ACCEPTED,
		Json(SubmitResponse { success: true, message: "Contribution accepted." }),
	))
}

// vim: ts=4
