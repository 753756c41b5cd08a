//! App builder - constructs and runs the proxy server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use crate::prelude::*;
use crate::routes;
use crate::stats_cache::MemoryStatsCache;
use levelhead_core::app::VERSION;
use levelhead_types::nonce_adapter::NonceAdapter;
use levelhead_types::stats_adapter::StatsCacheAdapter;

/// Install the global tracing subscriber, filtered by `RUST_LOG`
pub fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();
}

pub struct AppBuilder {
	config: Config,
	nonce_adapter: Option<Arc<dyn NonceAdapter>>,
	stats_cache: Option<Arc<dyn StatsCacheAdapter>>,
}

impl AppBuilder {
	pub fn new(config: Config) -> Self {
		AppBuilder { config, nonce_adapter: None, stats_cache: None }
	}

	// Adapters
	pub fn nonce_adapter(&mut self, nonce_adapter: Arc<dyn NonceAdapter>) -> &mut Self {
		self.nonce_adapter = Some(nonce_adapter);
		self
	}
	pub fn stats_cache(&mut self, stats_cache: Arc<dyn StatsCacheAdapter>) -> &mut Self {
		self.stats_cache = Some(stats_cache);
		self
	}

	/// Create the app state and its router without binding a listener
	pub fn build(self) -> ClResult<(App, Router)> {
		let Some(nonce_adapter) = self.nonce_adapter else {
			error!("FATAL: No nonce adapter configured");
			return Err(Error::Internal("No nonce adapter configured".to_string()));
		};
		let stats_cache = self.stats_cache.unwrap_or_else(|| Arc::new(MemoryStatsCache::new()));

		let core = self.config.core;
		if core.community_secret.is_none() {
			warn!("COMMUNITY_SUBMIT_SECRET is not set, community submissions will be refused");
		}
		if core.admin_keys.is_empty() {
			warn!("ADMIN_API_KEYS is empty, admin endpoints are unreachable");
		}
		if core.submit_keys.is_empty() {
			warn!("No submission API keys configured, community submissions will be refused");
		}
		info!(
			"Configured {} proxy tokens, {} admin keys, {} cron keys",
			core.handshake.proxy_tokens.len(),
			core.admin_keys.len(),
			core.cron_keys.len(),
		);

		let app = AppState::new(core, nonce_adapter, stats_cache);
		let router = routes::init(app.clone());
		Ok((app, router))
	}

	pub async fn run(self) -> ClResult<()> {
		info!("Levelhead proxy V{}", VERSION);

		let listen = self.config.listen.clone();
		let (app, router) = self.build()?;

		// GC tasks hold weak references and end with the app state
		let _gc_tasks = app.spawn_background_tasks();

		let listener = tokio::net::TcpListener::bind(listen.as_ref()).await.map_err(|e| {
			error!("FATAL: Cannot listen on {}: {}", listen, e);
			Error::Io(e)
		})?;
		info!("Listening on HTTP {}", listen);

		axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
			.with_graceful_shutdown(shutdown_signal())
			.await?;

		info!("Server stopped");
		Ok(())
	}
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		warn!("Cannot listen for shutdown signal: {}", e);
		std::future::pending::<()>().await;
	}
	info!("Shutdown signal received");
}

// vim: ts=4
