//! Custom extractors

use std::net::IpAddr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::prelude::*;

// ClientIp //
//**********//
/// Client address, resolved through the trusted proxy configuration
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<App> for ClientIp {
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, app: &App) -> Result<Self, Self::Rejection> {
		app.proxies.client_ip(&parts.headers, &parts.extensions).map(ClientIp).ok_or_else(|| {
			Error::BadRequest {
				code: "INVALID_REQUEST",
				message: "Unable to identify client IP address".into(),
			}
		})
	}
}

// vim: ts=4
