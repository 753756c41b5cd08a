//! Rate Limiting Middleware
//!
//! Tower middleware layer for applying one limiter to Axum routes.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use super::extractors::{KeyFn, TrustedProxies};
use super::limiter::{Admission, RateLimitEngine};

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Rate limit middleware layer
#[derive(Clone)]
pub struct RateLimitLayer {
	engine: Arc<RateLimitEngine>,
	key_fn: KeyFn,
	proxies: Arc<TrustedProxies>,
	emit_headers: bool,
}

impl RateLimitLayer {
	pub fn new(engine: Arc<RateLimitEngine>, key_fn: KeyFn, proxies: Arc<TrustedProxies>) -> Self {
		Self { engine, key_fn, proxies, emit_headers: false }
	}

	/// Add `RateLimit-*` headers to admitted responses
	pub fn with_headers(mut self) -> Self {
		self.emit_headers = true;
		self
	}
}

impl<S> Layer<S> for RateLimitLayer {
	type Service = RateLimitService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RateLimitService {
			inner,
			engine: self.engine.clone(),
			key_fn: self.key_fn.clone(),
			proxies: self.proxies.clone(),
			emit_headers: self.emit_headers,
		}
	}
}

/// Rate limit middleware service
#[derive(Clone)]
pub struct RateLimitService<S> {
	inner: S,
	engine: Arc<RateLimitEngine>,
	key_fn: KeyFn,
	proxies: Arc<TrustedProxies>,
	emit_headers: bool,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let engine = self.engine.clone();
		let key_fn = self.key_fn.clone();
		let emit_headers = self.emit_headers;
		let client_ip = self.proxies.client_ip(req.headers(), req.extensions());
		// Take the service that was driven to readiness, leave a fresh clone behind
		let clone = self.inner.clone();
		let mut inner = std::mem::replace(&mut self.inner, clone);

		Box::pin(async move {
			let checked = key_fn(req.headers(), req.extensions(), client_ip)
				.and_then(|key| engine.check(&key));
			let admission = match checked {
				Ok(admission) => admission,
				Err(error) => return Ok(error.into_response()),
			};

			let mut response = inner.call(req).await?;
			if emit_headers {
				insert_headers(&mut response, admission);
			}
			Ok(response)
		})
	}
}

fn insert_headers(response: &mut Response, admission: Admission) {
	let reset = admission.reset_after.as_secs() + u64::from(admission.reset_after.subsec_nanos() > 0);
	let headers = response.headers_mut();
	headers.insert(RATELIMIT_LIMIT, HeaderValue::from(admission.limit));
	headers.insert(RATELIMIT_REMAINING, HeaderValue::from(admission.remaining));
	headers.insert(RATELIMIT_RESET, HeaderValue::from(reset));
}


// vim: ts=4
