//! Adapter for the player stats cache.
//!
//! The cache itself (layers, persistence, upstream refresh) lives outside the
//! admission core. The core only reads previously trusted records and hands
//! accepted submissions back for writing.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::prelude::*;
use crate::types::PlayerUuid;

/// Where an accepted record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
	/// Fetched from the upstream stats API
	Upstream,
	/// Submitted by a client and corroborated against a trusted record
	CommunityVerified,
}

impl RecordSource {
	pub fn as_str(self) -> &'static str {
		match self {
			RecordSource::Upstream => "upstream",
			RecordSource::CommunityVerified => "community_verified",
		}
	}
}

#[async_trait]
pub trait StatsCacheAdapter: Debug + Send + Sync {
	/// Read the record served to clients, if any
	async fn read(&self, uuid: &PlayerUuid) -> ClResult<Option<Value>>;

	/// Read the last trusted record for a player, if any
	async fn read_trusted(&self, uuid: &PlayerUuid) -> ClResult<Option<Value>>;

	/// Store an accepted record
	async fn write_accepted(
		&self,
		uuid: &PlayerUuid,
		stats: Value,
		source: RecordSource,
	) -> ClResult<()>;
}

// vim: ts=4
