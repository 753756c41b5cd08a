//! Mod handshake and token-to-install binding
//!
//! Every request from the mod carries a `Levelhead/` user agent, an install id
//! and a proxy token. The first install id seen with a token is bound to it for
//! the lifetime of the binding store; later requests presenting the token with
//! another install id are refused.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::{
	body::Body,
	extract::{FromRequestParts, State},
	http::{header, request::Parts, HeaderMap, Request},
	middleware::Next,
	response::Response,
};
use parking_lot::Mutex;

use crate::guard::{extract_bearer, TokenSet};
use crate::prelude::*;
use crate::rate_limit::limiter::truncate_key;

pub const USER_AGENT_PREFIX: &str = "Levelhead/";
pub const INSTALL_HEADER: &str = "x-levelhead-install";

#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
	/// Accepted proxy tokens
	pub proxy_tokens: TokenSet,
}

/// Storage for token bindings.
///
/// `bind_or_get` must check and insert as one atomic step.
pub trait BindingStore: fmt::Debug + Send + Sync {
	fn get(&self, token: &str) -> Option<InstallId>;

	/// Bind `token` to `install_id` unless it is already bound.
	///
	/// Returns the install id the token is bound to afterwards.
	fn bind_or_get(&self, token: &str, install_id: &InstallId) -> InstallId;

	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

// MemoryBindingStore //
//********************//
#[derive(Debug, Default)]
pub struct MemoryBindingStore {
	bindings: Mutex<HashMap<Box<str>, InstallId>>,
}

impl MemoryBindingStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl BindingStore for MemoryBindingStore {
	fn get(&self, token: &str) -> Option<InstallId> {
		self.bindings.lock().get(token).cloned()
	}

	fn bind_or_get(&self, token: &str, install_id: &InstallId) -> InstallId {
		self.bindings.lock().entry(token.into()).or_insert_with(|| install_id.clone()).clone()
	}

	fn len(&self) -> usize {
		self.bindings.lock().len()
	}
}

// InstallCtx //
//************//
/// Identity of a request that passed the handshake
#[derive(Clone)]
pub struct InstallCtx {
	pub install_id: InstallId,
	pub token: Box<str>,
}

impl fmt::Debug for InstallCtx {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InstallCtx")
			.field("install_id", &self.install_id)
			.field("token", &truncate_key(&self.token))
			.finish()
	}
}

impl<S> FromRequestParts<S> for InstallCtx
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts.extensions.get::<InstallCtx>().cloned().ok_or(Error::InvalidInstallId)
	}
}

// InstallBinder //
//***************//
#[derive(Debug)]
pub struct InstallBinder {
	config: HandshakeConfig,
	store: Box<dyn BindingStore>,
}

impl InstallBinder {
	pub fn new(config: HandshakeConfig) -> Self {
		Self::with_store(config, Box::new(MemoryBindingStore::new()))
	}

	pub fn with_store(config: HandshakeConfig, store: Box<dyn BindingStore>) -> Self {
		Self { config, store }
	}

	/// Validate the handshake headers and bind the token on first use
	pub fn validate(&self, headers: &HeaderMap) -> ClResult<InstallCtx> {
		let user_agent = headers.get(header::USER_AGENT).and_then(|h| h.to_str().ok()).unwrap_or("");
		if !user_agent.starts_with(USER_AGENT_PREFIX) {
			return Err(Error::InvalidUserAgent);
		}

		let install_id = headers
			.get(INSTALL_HEADER)
			.and_then(|h| h.to_str().ok())
			.and_then(InstallId::parse)
			.ok_or(Error::InvalidInstallId)?;

		let token = extract_bearer(headers).ok_or(Error::MissingToken)?;
		if !self.config.proxy_tokens.contains(&token) {
			debug!("unknown proxy token {}", truncate_key(&token));
			return Err(Error::InvalidToken);
		}

		let bound = self.store.bind_or_get(&token, &install_id);
		if bound != install_id {
			warn!(
				"proxy token {} presented by install {} but bound to {}",
				truncate_key(&token),
				install_id,
				bound
			);
			return Err(Error::TokenInstallMismatch);
		}

		Ok(InstallCtx { install_id, token: token.into() })
	}

	pub fn binding_count(&self) -> usize {
		self.store.len()
	}

	pub fn bound_install(&self, token: &str) -> Option<InstallId> {
		self.store.get(token)
	}
}

/// Middleware running the handshake and attaching the `InstallCtx`
pub async fn require_install(
	State(binder): State<Arc<InstallBinder>>,
	mut req: Request<Body>,
	next: Next,
) -> ClResult<Response> {
	let ctx = binder.validate(req.headers())?;
	req.extensions_mut().insert(ctx);
	Ok(next.run(req).await)
}


// vim: ts=4
