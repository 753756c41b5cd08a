//! Privileged token guards (admin, cron, submission)
//!
//! Each guard reads a credential from its own header, falling back to
//! `Authorization: Bearer`, and checks it against an allow-list. Keys are
//! compared as SHA-256 digests in constant time, and every allowed key is
//! compared so the match position does not leak.

use std::sync::Arc;

use axum::{
	body::Body,
	extract::State,
	http::{header, HeaderMap, Request},
	middleware::Next,
	response::Response,
};
use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};

use crate::prelude::*;
use crate::rate_limit::limiter::truncate_key;

/// Token from `Authorization: Bearer <token>`, scheme matched case-insensitively
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.trim().split_once(' ')?;
	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}
	let token = token.trim();
	(!token.is_empty()).then(|| token.to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get(name)
		.and_then(|h| h.to_str().ok())
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(ToString::to_string)
}

// TokenSet //
//**********//
/// Allow-list of secret tokens, stored as digests
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
	digests: Vec<[u8; 32]>,
}

impl TokenSet {
	pub fn new<I, S>(keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let digests: Vec<[u8; 32]> = keys
			.into_iter()
			.filter_map(|key| {
				let key = key.as_ref().trim();
				(!key.is_empty()).then(|| Sha256::digest(key.as_bytes()).into())
			})
			.collect();
		Self { digests }
	}

	pub fn contains(&self, candidate: &str) -> bool {
		let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
		let mut found = Choice::from(0);
		for digest in &self.digests {
			found |= digest.as_slice().ct_eq(candidate.as_slice());
		}
		found.into()
	}

	pub fn len(&self) -> usize {
		self.digests.len()
	}

	pub fn is_empty(&self) -> bool {
		self.digests.is_empty()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
	Admin,
	Cron,
	Submit,
}

impl GuardKind {
	/// Dedicated header of the guard
	pub fn header(self) -> &'static str {
		match self {
			GuardKind::Admin => "x-admin-token",
			GuardKind::Cron => "x-cron-token",
			GuardKind::Submit => "x-api-key",
		}
	}

	fn missing(self) -> Error {
		match self {
			GuardKind::Admin => Error::Unauthorized("Missing or invalid admin API token."),
			GuardKind::Cron => Error::Unauthorized("Missing or invalid cron API token."),
			GuardKind::Submit => Error::MissingApiKey,
		}
	}

	fn invalid(self) -> Error {
		match self {
			GuardKind::Submit => Error::InvalidApiKey,
			GuardKind::Admin | GuardKind::Cron => self.missing(),
		}
	}
}

// TokenGuard //
//************//
#[derive(Debug, Clone)]
pub struct TokenGuard {
	kind: GuardKind,
	keys: TokenSet,
}

impl TokenGuard {
	pub fn new(kind: GuardKind, keys: TokenSet) -> Self {
		Self { kind, keys }
	}

	pub fn kind(&self) -> GuardKind {
		self.kind
	}

	/// Credential presented for this guard, if any
	pub fn presented(&self, headers: &HeaderMap) -> Option<String> {
		header_value(headers, self.kind.header()).or_else(|| extract_bearer(headers))
	}

	pub fn check(&self, headers: &HeaderMap) -> ClResult<()> {
		let Some(token) = self.presented(headers) else {
			return Err(self.kind.missing());
		};
		if self.keys.contains(&token) {
			Ok(())
		} else {
			debug!("{:?} guard rejected token {}", self.kind, truncate_key(&token));
			Err(self.kind.invalid())
		}
	}

	pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
		self.presented(headers).is_some_and(|token| self.keys.contains(&token))
	}
}

/// Middleware rejecting requests that fail the guard
pub async fn require_token(
	State(guard): State<Arc<TokenGuard>>,
	req: Request<Body>,
	next: Next,
) -> ClResult<Response> {
	guard.check(req.headers())?;
	Ok(next.run(req).await)
}


// vim: ts=4
