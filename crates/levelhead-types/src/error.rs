//! Error type shared by every crate of the proxy.
//!
//! Each variant maps to exactly one HTTP status and one stable error code. The
//! response body always has the shape
//! `{"error": {"code": ..., "message": ..., "details": ...}}`.

use std::fmt;
use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type ClResult<T> = std::result::Result<T, Error>;

/// Realm announced in the `WWW-Authenticate` challenge
pub const AUTH_REALM: &str = "levelhead-proxy";

/// Retry hint sent when the replay-protection store cannot be reached
pub const DEPENDENCY_RETRY_AFTER: Duration = Duration::from_secs(30);

/// A single field-level validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
	pub field: Box<str>,
	pub message: String,
}

impl FieldError {
	pub fn new(field: impl Into<Box<str>>, message: impl Into<String>) -> Self {
		Self { field: field.into(), message: message.into() }
	}
}

impl fmt::Display for FieldError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.field, self.message)
	}
}

/// Coarse error classes, used for logging and by callers deciding on retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Credential missing, invalid or mismatched. Never retried.
	Authentication,
	/// Caller should retry after the advertised delay.
	RateLimit,
	/// Caller must fix the request.
	Validation,
	/// Nonce already consumed. Retrying the same nonce can never succeed.
	Replay,
	/// A dependency of the proxy itself is down. Retry later.
	DependencyUnavailable,
	/// Anything else
	Internal,
}

#[derive(Debug)]
pub enum Error {
	// Handshake
	InvalidUserAgent,
	InvalidInstallId,
	MissingToken,
	InvalidToken,
	TokenInstallMismatch,

	// Privileged tokens
	/// Admin and cron guards; carries the guard-specific message
	Unauthorized(&'static str),
	MissingApiKey,
	InvalidApiKey,
	Forbidden(&'static str),

	RateLimited {
		retry_after: Duration,
	},

	// Validation
	ValidationFailed(Vec<FieldError>),
	Unverified(String),
	InvalidTimestamp,
	InvalidNonce,
	BadRequest {
		code: &'static str,
		message: String,
	},

	ReplayDetected,

	// Dependencies
	ReplayStoreUnavailable,
	ServiceUnavailable(String),

	NotFound,
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::InvalidUserAgent
			| Error::InvalidInstallId
			| Error::MissingToken
			| Error::InvalidToken
			| Error::TokenInstallMismatch
			| Error::Unauthorized(_)
			| Error::MissingApiKey
			| Error::InvalidApiKey
			| Error::Forbidden(_) => ErrorKind::Authentication,
			Error::RateLimited { .. } => ErrorKind::RateLimit,
			Error::ValidationFailed(_)
			| Error::Unverified(_)
			| Error::InvalidTimestamp
			| Error::InvalidNonce
			| Error::BadRequest { .. }
			| Error::NotFound => ErrorKind::Validation,
			Error::ReplayDetected => ErrorKind::Replay,
			Error::ReplayStoreUnavailable | Error::ServiceUnavailable(_) => {
				ErrorKind::DependencyUnavailable
			}
			Error::Internal(_) | Error::Io(_) => ErrorKind::Internal,
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			Error::InvalidInstallId
			| Error::ValidationFailed(_)
			| Error::Unverified(_)
			| Error::InvalidTimestamp
			| Error::InvalidNonce
			| Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
			Error::MissingToken | Error::Unauthorized(_) | Error::MissingApiKey => {
				StatusCode::UNAUTHORIZED
			}
			Error::InvalidUserAgent
			| Error::InvalidToken
			| Error::TokenInstallMismatch
			| Error::InvalidApiKey
			| Error::Forbidden(_) => StatusCode::FORBIDDEN,
			Error::NotFound => StatusCode::NOT_FOUND,
			Error::ReplayDetected => StatusCode::CONFLICT,
			Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
			Error::ReplayStoreUnavailable | Error::ServiceUnavailable(_) => {
				StatusCode::SERVICE_UNAVAILABLE
			}
			Error::Internal(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn code(&self) -> &'static str {
		match self {
			Error::InvalidUserAgent => "INVALID_USER_AGENT",
			Error::InvalidInstallId => "INVALID_INSTALL_ID",
			Error::MissingToken => "MISSING_TOKEN",
			Error::InvalidToken => "INVALID_TOKEN",
			Error::TokenInstallMismatch => "TOKEN_INSTALL_MISMATCH",
			Error::Unauthorized(_) => "UNAUTHORIZED",
			Error::MissingApiKey => "MISSING_API_KEY",
			Error::InvalidApiKey => "INVALID_API_KEY",
			Error::Forbidden(_) => "FORBIDDEN",
			Error::RateLimited { .. } => "RATE_LIMIT",
			Error::ValidationFailed(_) => "VALIDATION_FAILED",
			Error::Unverified(_) => "UNVERIFIED_SUBMISSION",
			Error::InvalidTimestamp => "INVALID_TIMESTAMP",
			Error::InvalidNonce => "INVALID_NONCE",
			Error::BadRequest { code, .. } => code,
			Error::ReplayDetected => "REPLAY_DETECTED",
			Error::ReplayStoreUnavailable => "REPLAY_PROTECTION_UNAVAILABLE",
			Error::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
			Error::NotFound => "NOT_FOUND",
			Error::Internal(_) | Error::Io(_) => "INTERNAL",
		}
	}

	/// Retry-After in whole seconds, rounded up, never below one second
	pub fn retry_after_secs(&self) -> Option<u64> {
		let delay = match self {
			Error::RateLimited { retry_after } => *retry_after,
			Error::ReplayStoreUnavailable => DEPENDENCY_RETRY_AFTER,
			_ => return None,
		};
		let secs = delay.as_secs() + u64::from(delay.subsec_nanos() > 0);
		Some(secs.max(1))
	}

	fn message(&self) -> String {
		match self {
			Error::InvalidUserAgent => "Requests must originate from the Levelhead mod.".into(),
			Error::InvalidInstallId => "Missing or malformed X-Levelhead-Install header.".into(),
			Error::MissingToken => "Proxy authorization token is required.".into(),
			Error::InvalidToken => "Proxy authorization token is not recognized.".into(),
			Error::TokenInstallMismatch => {
				"Proxy authorization token is bound to a different installation.".into()
			}
			Error::Unauthorized(msg) | Error::Forbidden(msg) => (*msg).into(),
			Error::MissingApiKey => "API key is required. Provide it via Authorization: Bearer <key> or X-API-Key: <key> header.".into(),
			Error::InvalidApiKey => "The provided API key is not valid or does not have permission to submit player data.".into(),
			Error::RateLimited { .. } => format!(
				"Rate limit exceeded. Try again in {} seconds.",
				self.retry_after_secs().unwrap_or(1)
			),
			Error::ValidationFailed(errors) => {
				let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
				format!("Player data validation failed: {}", details.join("; "))
			}
			Error::Unverified(msg) => msg.clone(),
			Error::InvalidTimestamp => "Timestamp expired or too far in future.".into(),
			Error::InvalidNonce => "Invalid nonce format.".into(),
			Error::BadRequest { message, .. } => message.clone(),
			Error::ReplayDetected => "Nonce has already been used.".into(),
			Error::ReplayStoreUnavailable => {
				"Replay protection is temporarily unavailable. Please try again later.".into()
			}
			Error::ServiceUnavailable(msg) => msg.clone(),
			Error::NotFound => "Not found.".into(),
			Error::Internal(_) | Error::Io(_) => "Internal server error.".into(),
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
			_ => write!(f, "{}: {}", self.code(), self.message()),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Internal(format!("json: {}", err))
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status();
		let mut error = serde_json::json!({
			"code": self.code(),
			"message": self.message(),
		});
		match &self {
			Error::ValidationFailed(errors) => {
				error["details"] = serde_json::json!({ "errors": errors });
			}
			Error::RateLimited { .. } => {
				error["details"] = serde_json::json!({ "retryAfter": self.retry_after_secs() });
			}
			Error::Internal(msg) => tracing::error!("internal error: {}", msg),
			Error::Io(err) => tracing::error!("io error: {}", err),
			_ => {}
		}

		let mut response = (status, Json(serde_json::json!({ "error": error }))).into_response();

		if let Some(secs) = self.retry_after_secs() {
			response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
		}
		if matches!(self, Error::MissingToken) {
			if let Ok(val) = HeaderValue::from_str(&format!("Bearer realm=\"{}\"", AUTH_REALM)) {
				response.headers_mut().insert(header::WWW_AUTHENTICATE, val);
			}
		}

		response
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_code_pairs() {
		assert_eq!(Error::InvalidInstallId.status(), StatusCode::BAD_REQUEST);
		assert_eq!(Error::MissingToken.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(Error::TokenInstallMismatch.status(), StatusCode::FORBIDDEN);
		assert_eq!(Error::ReplayDetected.status(), StatusCode::CONFLICT);
		assert_eq!(Error::ReplayStoreUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(Error::InvalidApiKey.code(), "INVALID_API_KEY");
		assert_eq!(Error::Unauthorized("x").code(), "UNAUTHORIZED");
	}

	#[test]
	fn test_retry_after_rounds_up() {
		let err = Error::RateLimited { retry_after: Duration::from_millis(1500) };
		assert_eq!(err.retry_after_secs(), Some(2));

		let err = Error::RateLimited { retry_after: Duration::from_secs(3) };
		assert_eq!(err.retry_after_secs(), Some(3));

		let err = Error::RateLimited { retry_after: Duration::ZERO };
		assert_eq!(err.retry_after_secs(), Some(1));

		assert_eq!(Error::InvalidToken.retry_after_secs(), None);
	}

	#[test]
	fn test_missing_token_sets_challenge() {
		let response = Error::MissingToken.into_response();
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		let challenge = response.headers().get(header::WWW_AUTHENTICATE).unwrap();
		assert_eq!(challenge, "Bearer realm=\"levelhead-proxy\"");
	}

	#[test]
	fn test_rate_limit_sets_retry_after() {
		let response =
			Error::RateLimited { retry_after: Duration::from_secs(42) }.into_response();
		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
	}

	#[test]
	fn test_kinds() {
		assert_eq!(Error::ReplayDetected.kind(), ErrorKind::Replay);
		assert_eq!(Error::ReplayStoreUnavailable.kind(), ErrorKind::DependencyUnavailable);
		assert_eq!(Error::ValidationFailed(vec![]).kind(), ErrorKind::Validation);
		assert_eq!(Error::Forbidden("no").kind(), ErrorKind::Authentication);
	}
}

// vim: ts=4
