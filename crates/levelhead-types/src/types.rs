//! Request-level identifiers shared between the core and the server.

use serde::Serialize;
use std::fmt;

/// Length of an install id and of a normalized player uuid, in hex chars
pub const HEX_ID_LENGTH: usize = 32;

/// Milliseconds since the Unix epoch
pub type TimestampMs = i64;

pub fn now_ms() -> TimestampMs {
	chrono::Utc::now().timestamp_millis()
}

fn is_hex_id(value: &str) -> bool {
	value.len() == HEX_ID_LENGTH && value.bytes().all(|b| b.is_ascii_hexdigit())
}

// InstallId //
//***********//
/// Client-generated identifier of one mod installation.
///
/// Always 32 lowercase hex characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct InstallId(Box<str>);

impl InstallId {
	/// Parse an install id, accepting upper case hex and normalizing it
	pub fn parse(raw: &str) -> Option<Self> {
		let raw = raw.trim();
		is_hex_id(raw).then(|| Self(raw.to_ascii_lowercase().into()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for InstallId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

// PlayerUuid //
//************//
/// Subject of a stats record: a Minecraft player uuid, dashes removed, lowercase
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PlayerUuid(Box<str>);

impl PlayerUuid {
	pub fn parse(raw: &str) -> Option<Self> {
		let compact: String = raw.trim().chars().filter(|c| *c != '-').collect();
		is_hex_id(&compact).then(|| Self(compact.to_ascii_lowercase().into()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PlayerUuid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}


// vim: ts=4
