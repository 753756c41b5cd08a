//! Races on the shared maps: bindings and rate buckets must serialize.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use levelhead_core::guard::TokenSet;
use levelhead_core::handshake::{HandshakeConfig, InstallBinder, INSTALL_HEADER};
use levelhead_core::rate_limit::{RateLimitConfig, RateLimitEngine};

fn handshake_headers(install: &str) -> HeaderMap {
	let mut map = HeaderMap::new();
	map.insert(header::USER_AGENT, HeaderValue::from_static("Levelhead/2.0"));
	map.insert(INSTALL_HEADER, HeaderValue::from_str(install).unwrap());
	map.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer shared-token"));
	map
}

#[test]
fn test_racing_installs_bind_exactly_once() {
	let binder = Arc::new(InstallBinder::new(HandshakeConfig {
		proxy_tokens: TokenSet::new(["shared-token"]),
	}));

	let handles: Vec<_> = (0..16)
		.map(|i| {
			let binder = binder.clone();
			thread::spawn(move || {
				let install = format!("{:032x}", i + 1);
				binder.validate(&handshake_headers(&install)).is_ok()
			})
		})
		.collect();

	let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
	assert_eq!(winners, 1);
	assert_eq!(binder.binding_count(), 1);

	// The winner keeps working, everyone else keeps failing
	let bound = binder.bound_install("shared-token").unwrap();
	assert!(binder.validate(&handshake_headers(bound.as_str())).is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_exceed_max() {
	let engine = Arc::new(RateLimitEngine::new(
		"race",
		RateLimitConfig::new(Duration::from_secs(3600), 25),
	));

	let tasks: Vec<_> = (0..100)
		.map(|_| {
			let engine = engine.clone();
			tokio::spawn(async move { engine.check("same-key").is_ok() })
		})
		.collect();

	let mut admitted = 0;
	for task in tasks {
		if task.await.unwrap() {
			admitted += 1;
		}
	}
	assert_eq!(admitted, 25);
	assert_eq!(engine.stats().total_requests_limited, 75);
}

// vim: ts=4
