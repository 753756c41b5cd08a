//! Access gate for operational metrics
//!
//! A request is let through when it comes from an allowed network, or carries a
//! valid admin token, or a valid cron token.

use std::sync::Arc;

use axum::{
	body::Body,
	extract::State,
	http::{Extensions, HeaderMap, Request},
	middleware::Next,
	response::Response,
};
use ipnet::IpNet;

use crate::guard::TokenGuard;
use crate::prelude::*;
use crate::rate_limit::extractors::{ip_in_cidrs, TrustedProxies};

#[derive(Debug)]
pub struct MonitoringGate {
	allowed_cidrs: Vec<IpNet>,
	proxies: Arc<TrustedProxies>,
	admin: Arc<TokenGuard>,
	cron: Arc<TokenGuard>,
}

impl MonitoringGate {
	pub fn new(
		allowed_cidrs: Vec<IpNet>,
		proxies: Arc<TrustedProxies>,
		admin: Arc<TokenGuard>,
		cron: Arc<TokenGuard>,
	) -> Self {
		Self { allowed_cidrs, proxies, admin, cron }
	}

	/// True when the client address lies in an allowed network
	pub fn is_internal(&self, headers: &HeaderMap, extensions: &Extensions) -> bool {
		match self.proxies.client_ip(headers, extensions) {
			Some(ip) => ip_in_cidrs(ip, &self.allowed_cidrs),
			None => {
				warn!("failed to resolve client IP for monitoring allowlist check");
				false
			}
		}
	}

	pub fn is_authorized(&self, headers: &HeaderMap, extensions: &Extensions) -> bool {
		self.is_internal(headers, extensions)
			|| self.admin.is_authorized(headers)
			|| self.cron.is_authorized(headers)
	}

	pub fn check(&self, headers: &HeaderMap, extensions: &Extensions) -> ClResult<()> {
		if self.is_authorized(headers, extensions) {
			Ok(())
		} else {
			Err(Error::Forbidden("Access to operational metrics is restricted."))
		}
	}
}

pub async fn require_monitoring(
	State(gate): State<Arc<MonitoringGate>>,
	req: Request<Body>,
	next: Next,
) -> ClResult<Response> {
	gate.check(req.headers(), req.extensions())?;
	Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::guard::{GuardKind, TokenSet};
	use crate::rate_limit::extractors::parse_cidr_list;
	use axum::extract::ConnectInfo;
	use axum::http::{HeaderValue, StatusCode};
	use std::net::SocketAddr;

	fn gate() -> MonitoringGate {
		MonitoringGate::new(
			parse_cidr_list("10.0.0.0/8"),
			Arc::new(TrustedProxies::default()),
			Arc::new(TokenGuard::new(GuardKind::Admin, TokenSet::new(["admin-key"]))),
			Arc::new(TokenGuard::new(GuardKind::Cron, TokenSet::new(["cron-key"]))),
		)
	}

	fn from_peer(ip: [u8; 4]) -> Extensions {
		let mut ext = Extensions::new();
		ext.insert(ConnectInfo(SocketAddr::from((ip, 1234))));
		ext
	}

	#[test]
	fn test_internal_network_allowed() {
		assert!(gate().check(&HeaderMap::new(), &from_peer([10, 1, 1, 1])).is_ok());
	}

	#[test]
	fn test_external_needs_token() {
		let g = gate();
		let ext = from_peer([203, 0, 113, 5]);

		let err = g.check(&HeaderMap::new(), &ext).unwrap_err();
		assert_eq!(err.status(), StatusCode::FORBIDDEN);
		assert_eq!(err.code(), "FORBIDDEN");

		let mut headers = HeaderMap::new();
		headers.insert("x-admin-token", HeaderValue::from_static("admin-key"));
		assert!(g.check(&headers, &ext).is_ok());

		let mut headers = HeaderMap::new();
		headers.insert("authorization", HeaderValue::from_static("Bearer cron-key"));
		assert!(g.check(&headers, &ext).is_ok());
	}

	#[test]
	fn test_unresolvable_ip_is_not_internal() {
		let g = gate();
		assert!(!g.is_internal(&HeaderMap::new(), &Extensions::new()));
		assert!(g.check(&HeaderMap::new(), &Extensions::new()).is_err());
	}
}

// vim: ts=4
