use axum::{
	middleware,
	routing::{get, post},
	Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::prelude::*;
use crate::{admin, player, status};
use levelhead_core::guard::require_token;
use levelhead_core::handshake::require_install;
use levelhead_core::monitoring::require_monitoring;
use levelhead_core::rate_limit::{
	admin_ip_key, install_key, public_ip_key, status_check_key, RateLimitLayer,
};

async fn health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

pub fn init(app: App) -> Router {
	let proxies = app.proxies.clone();

	// Mod traffic: handshake first, then the per-install limiter
	let player_router = Router::new()
		.route("/api/player/submit", post(player::post_submit))
		.route_layer(middleware::from_fn_with_state(app.submit_guard.clone(), require_token))
		.route("/api/player/{uuid}", get(player::get_player))
		.route_layer(
			RateLimitLayer::new(app.limiters.install.clone(), install_key(), proxies.clone())
				.with_headers(),
		)
		.route_layer(middleware::from_fn_with_state(app.binder.clone(), require_install));

	let public_router = Router::new()
		.route("/api/public/apikey/status", get(status::get_key_status))
		.route_layer(RateLimitLayer::new(
			app.limiters.status_check.clone(),
			status_check_key(app.key_hasher.clone()),
			proxies.clone(),
		))
		.route_layer(
			RateLimitLayer::new(app.limiters.public.clone(), public_ip_key(), proxies.clone())
				.with_headers(),
		);

	let admin_router = Router::new()
		.route("/api/admin/stats", get(admin::get_stats))
		.route_layer(middleware::from_fn_with_state(app.admin_guard.clone(), require_token))
		.route_layer(RateLimitLayer::new(app.limiters.admin.clone(), admin_ip_key(), proxies.clone()));

	// Operational endpoints share the admin per-IP budget
	let cron_router = Router::new()
		.route("/api/cron/sweep", post(admin::post_sweep))
		.route_layer(middleware::from_fn_with_state(app.cron_guard.clone(), require_token))
		.route_layer(RateLimitLayer::new(app.limiters.admin.clone(), admin_ip_key(), proxies.clone()));

	let monitoring_router = Router::new()
		.route("/api/monitoring/stats", get(admin::get_monitoring_stats))
		.route_layer(middleware::from_fn_with_state(app.monitoring.clone(), require_monitoring))
		.route_layer(RateLimitLayer::new(app.limiters.admin.clone(), admin_ip_key(), proxies));

	Router::new()
		.route("/health", get(health))
		.merge(player_router)
		.merge(public_router)
		.merge(admin_router)
		.merge(cron_router)
		.merge(monitoring_router)
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

// vim: ts=4
