//! Operational endpoints: admin stats, cron maintenance, monitoring

use axum::{extract::State, Json};
use serde::Serialize;

use crate::prelude::*;
use levelhead_core::app::VERSION;
use levelhead_core::rate_limit::RateLimiterStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
	pub bound_tokens: usize,
	pub rate_limiters: Vec<RateLimiterStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
	pub removed_buckets: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStats {
	pub version: &'static str,
	pub replay_protection: bool,
	pub rate_limiters: Vec<RateLimiterStats>,
}

fn limiter_stats(app: &App) -> Vec<RateLimiterStats> {
	app.limiters.all().iter().map(|engine| engine.stats()).collect()
}

/// GET /api/admin/stats
pub async fn get_stats(State(app): State<App>) -> Json<AdminStats> {
	Json(AdminStats { bound_tokens: app.binder.binding_count(), rate_limiters: limiter_stats(&app) })
}

/// POST /api/cron/sweep - One idle-bucket collection pass over every limiter
pub async fn post_sweep(State(app): State<App>) -> Json<SweepResult> {
	let removed_buckets = app.limiters.sweep_all();
	info!("cron sweep removed {} idle rate limit buckets", removed_buckets);
	Json(SweepResult { removed_buckets })
}

/// GET /api/monitoring/stats
pub async fn get_monitoring_stats(State(app): State<App>) -> Json<MonitoringStats> {
	Json(MonitoringStats {
		version: VERSION,
		replay_protection: app.submitter_keys.is_configured(),
		rate_limiters: limiter_stats(&app),
	})
}

// vim: ts=4
