//! Client Address and Bucket Key Extractors
//!
//! Resolves the client IP (honoring forwarding headers only when the direct peer
//! is a trusted proxy) and derives the bucket key each limiter counts under.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use ipnet::IpNet;

use super::key_hash::KeyHasher;
use crate::guard::extract_bearer;
use crate::handshake::InstallCtx;
use crate::prelude::*;

/// Header carrying the API key whose status is checked
pub const API_KEY_HEADER: &str = "x-api-key";

/// Map IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) to plain IPv4
pub fn normalize_ip(ip: IpAddr) -> IpAddr {
	match ip {
		IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
		IpAddr::V4(_) => ip,
	}
}

/// True when `ip` lies in one of `cidrs`. Address families never cross-match.
pub fn ip_in_cidrs(ip: IpAddr, cidrs: &[IpNet]) -> bool {
	let ip = normalize_ip(ip);
	cidrs.iter().any(|net| net.contains(&ip))
}

/// Parse a comma separated CIDR list, skipping and logging bad entries.
///
/// A bare address is accepted as a host route.
pub fn parse_cidr_list(raw: &str) -> Vec<IpNet> {
	raw.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.filter_map(|s| {
			let parsed = s
				.parse::<IpNet>()
				.ok()
				.or_else(|| s.parse::<IpAddr>().ok().map(|ip| IpNet::from(normalize_ip(ip))));
			if parsed.is_none() {
				warn!("Ignoring invalid CIDR entry: {}", s);
			}
			parsed
		})
		.collect()
}

// TrustedProxies //
//****************//
/// Reverse proxies allowed to report the client address
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
	pub enabled: bool,
	pub cidrs: Vec<IpNet>,
}

impl TrustedProxies {
	pub fn new(enabled: bool, cidrs: Vec<IpNet>) -> Self {
		Self { enabled, cidrs }
	}

	/// Resolve the client IP of a request.
	///
	/// Forwarding headers are consulted only when the direct peer is trusted.
	pub fn client_ip(&self, headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
		let peer = extensions.get::<ConnectInfo<SocketAddr>>().map(|ci| normalize_ip(ci.0.ip()));

		if self.enabled && !self.cidrs.is_empty() {
			if let Some(peer) = peer.filter(|ip| ip_in_cidrs(*ip, &self.cidrs)) {
				let forwarded = extract_from_xff(headers)
					.or_else(|| extract_from_x_real_ip(headers))
					.or_else(|| extract_from_forwarded(headers));
				return Some(forwarded.map_or(peer, normalize_ip));
			}
		}

		peer
	}
}

/// Extract IP from X-Forwarded-For header
fn extract_from_xff(headers: &HeaderMap) -> Option<IpAddr> {
	headers
		.get("x-forwarded-for")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| {
			// "client, proxy1, proxy2": the leftmost entry is the client
			s.split(',').next().map(str::trim).and_then(|ip| ip.parse().ok())
		})
}

/// Extract IP from X-Real-IP header
fn extract_from_x_real_ip(headers: &HeaderMap) -> Option<IpAddr> {
	headers.get("x-real-ip").and_then(|h| h.to_str().ok()).and_then(|s| s.trim().parse().ok())
}

/// Extract IP from Forwarded header (RFC 7239)
fn extract_from_forwarded(headers: &HeaderMap) -> Option<IpAddr> {
	headers.get("forwarded").and_then(|h| h.to_str().ok()).and_then(|s| {
		// "for=192.0.2.60;proto=http" or "for=\"[2001:db8::1]\""
		s.split([';', ','])
			.map(str::trim)
			.find(|part| part.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("for=")))
			.and_then(|part| {
				let cleaned = part.get(4..)?.trim_matches('"').trim_start_matches('[');
				let cleaned = cleaned.split(']').next().unwrap_or(cleaned);
				cleaned.parse().ok()
			})
	})
}

// Bucket keys //
//*************//
/// Derives the bucket key of a request for one limiter
pub type KeyFn = Arc<dyn Fn(&HeaderMap, &Extensions, Option<IpAddr>) -> ClResult<String> + Send + Sync>;

fn unidentified_client() -> Error {
	Error::BadRequest {
		code: "INVALID_REQUEST",
		message: "Unable to identify client IP address".into(),
	}
}

/// Per-install key. Requires the handshake to have run first.
pub fn install_key() -> KeyFn {
	Arc::new(|_headers: &HeaderMap, extensions: &Extensions, _ip: Option<IpAddr>| {
		extensions
			.get::<InstallCtx>()
			.map(|ctx| ctx.install_id.as_str().to_string())
			.ok_or(Error::InvalidInstallId)
	})
}

/// Per-IP key for public endpoints
pub fn public_ip_key() -> KeyFn {
	Arc::new(|_headers: &HeaderMap, _extensions: &Extensions, ip: Option<IpAddr>| {
		ip.map(|ip| format!("public:{}", ip)).ok_or_else(unidentified_client)
	})
}

/// Per-IP key for admin endpoints
pub fn admin_ip_key() -> KeyFn {
	Arc::new(|_headers: &HeaderMap, _extensions: &Extensions, ip: Option<IpAddr>| {
		ip.map(|ip| format!("admin:{}", ip)).ok_or_else(unidentified_client)
	})
}

/// Per IP + API key hash, for key status checks.
///
/// The raw key never becomes part of the bucket key.
pub fn status_check_key(hasher: Arc<KeyHasher>) -> KeyFn {
	Arc::new(move |headers: &HeaderMap, _extensions: &Extensions, ip: Option<IpAddr>| {
		let ip = ip.ok_or_else(unidentified_client)?;
		let key = presented_api_key(headers).ok_or_else(|| Error::BadRequest {
			code: "MISSING_KEY",
			message: "API key is required in x-api-key header.".into(),
		})?;
		Ok(format!("status:{}:{}", ip, hasher.hash(&key)?))
	})
}

/// API key from `X-API-Key`, falling back to a bearer token
pub fn presented_api_key(headers: &HeaderMap) -> Option<String> {
	headers
		.get(API_KEY_HEADER)
		.and_then(|h| h.to_str().ok())
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(ToString::to_string)
		.or_else(|| extract_bearer(headers))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;
	use std::net::{Ipv4Addr, Ipv6Addr};

	fn with_peer(ip: IpAddr) -> Extensions {
		let mut ext = Extensions::new();
		ext.insert(ConnectInfo(SocketAddr::new(ip, 4000)));
		ext
	}

	fn proxies() -> TrustedProxies {
		TrustedProxies::new(true, parse_cidr_list("10.0.0.0/8, 127.0.0.1"))
	}

	#[test]
	fn test_ipv4_mapped_is_normalized() {
		let mapped = IpAddr::V6(Ipv4Addr::new(10, 1, 2, 3).to_ipv6_mapped());
		assert_eq!(normalize_ip(mapped), IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)));
		assert!(ip_in_cidrs(mapped, &parse_cidr_list("10.0.0.0/8")));
	}

	#[test]
	fn test_families_do_not_cross_match() {
		let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
		assert!(!ip_in_cidrs(v6, &parse_cidr_list("127.0.0.0/8")));
	}

	#[test]
	fn test_invalid_cidrs_are_skipped() {
		let list = parse_cidr_list("10.0.0.0/8,not-a-cidr,,192.168.0.0/33");
		assert_eq!(list.len(), 1);
	}

	#[test]
	fn test_xff_honored_from_trusted_peer() {
		let mut headers = HeaderMap::new();
		headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.2"));
		let ext = with_peer(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
		assert_eq!(
			proxies().client_ip(&headers, &ext),
			Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)))
		);
	}

	#[test]
	fn test_xff_ignored_from_untrusted_peer() {
		let mut headers = HeaderMap::new();
		headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
		let peer = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 9));
		assert_eq!(proxies().client_ip(&headers, &with_peer(peer)), Some(peer));
	}

	#[test]
	fn test_xff_ignored_when_disabled() {
		let mut headers = HeaderMap::new();
		headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
		let peer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
		let disabled = TrustedProxies::new(false, parse_cidr_list("10.0.0.0/8"));
		assert_eq!(disabled.client_ip(&headers, &with_peer(peer)), Some(peer));
	}

	#[test]
	fn test_forwarded_header() {
		let mut headers = HeaderMap::new();
		headers.insert("forwarded", HeaderValue::from_static("for=\"[2001:db8::1]:4711\";proto=https"));
		let ext = with_peer(IpAddr::V4(Ipv4Addr::LOCALHOST));
		assert_eq!(proxies().client_ip(&headers, &ext), "2001:db8::1".parse().ok());
	}

	#[test]
	fn test_no_peer_no_ip() {
		assert_eq!(proxies().client_ip(&HeaderMap::new(), &Extensions::new()), None);
		let err = public_ip_key()(&HeaderMap::new(), &Extensions::new(), None).unwrap_err();
		assert_eq!(err.code(), "INVALID_REQUEST");
	}

	#[test]
	fn test_prefixed_keys() {
		let ip = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
		let headers = HeaderMap::new();
		let ext = Extensions::new();
		assert_eq!(public_ip_key()(&headers, &ext, ip).unwrap(), "public:192.0.2.1");
		assert_eq!(admin_ip_key()(&headers, &ext, ip).unwrap(), "admin:192.0.2.1");
	}

	#[test]
	fn test_status_key_hides_raw_key() {
		let hasher = Arc::new(KeyHasher::new());
		let mut headers = HeaderMap::new();
		headers.insert(API_KEY_HEADER, HeaderValue::from_static("super-secret-key"));
		let ip = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
		let key = status_check_key(hasher)(&headers, &Extensions::new(), ip).unwrap();
		assert!(key.starts_with("status:192.0.2.1:"));
		assert!(!key.contains("super-secret-key"));
	}

	#[test]
	fn test_status_key_requires_api_key() {
		let hasher = Arc::new(KeyHasher::new());
		let ip = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
		let err = status_check_key(hasher)(&HeaderMap::new(), &Extensions::new(), ip).unwrap_err();
		assert_eq!(err.code(), "MISSING_KEY");
	}
}

// vim: ts=4
