//! App state type

use std::sync::Arc;

use ipnet::IpNet;
use tokio::task::JoinHandle;

use crate::guard::{GuardKind, TokenGuard, TokenSet};
use crate::handshake::{HandshakeConfig, InstallBinder};
use crate::monitoring::MonitoringGate;
use crate::rate_limit::{spawn_gc_task, KeyHasher, RateLimitEngine, RateLimitTiers, TrustedProxies};
use crate::replay::{ReplayConfig, ReplayGuard, SubmitterKeys};
use crate::submission::SubmissionPipeline;
use crate::validation::SubmissionValidator;
use levelhead_types::nonce_adapter::NonceAdapter;
use levelhead_types::stats_adapter::StatsCacheAdapter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Typed configuration of the admission core
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
	pub handshake: HandshakeConfig,
	pub admin_keys: TokenSet,
	pub cron_keys: TokenSet,
	pub submit_keys: TokenSet,
	pub rate_limits: RateLimitTiers,
	pub replay: ReplayConfig,
	pub community_secret: Option<String>,
	pub monitoring_cidrs: Vec<IpNet>,
	pub trusted_proxies: TrustedProxies,
}

/// The four limiter tiers
#[derive(Debug)]
pub struct Limiters {
	pub install: Arc<RateLimitEngine>,
	pub public: Arc<RateLimitEngine>,
	pub status_check: Arc<RateLimitEngine>,
	pub admin: Arc<RateLimitEngine>,
}

impl Limiters {
	pub fn new(tiers: &RateLimitTiers) -> Self {
		Self {
			install: Arc::new(RateLimitEngine::new("install", tiers.install)),
			public: Arc::new(RateLimitEngine::new("public", tiers.public)),
			status_check: Arc::new(RateLimitEngine::new("status_check", tiers.status_check)),
			admin: Arc::new(RateLimitEngine::new("admin", tiers.admin)),
		}
	}

	pub fn all(&self) -> [&Arc<RateLimitEngine>; 4] {
		[&self.install, &self.public, &self.status_check, &self.admin]
	}

	/// One idle-bucket collection pass over every limiter
	pub fn sweep_all(&self) -> usize {
		self.all().iter().map(|engine| engine.sweep()).sum()
	}
}

pub struct AppState {
	pub binder: Arc<InstallBinder>,
	pub limiters: Limiters,
	pub key_hasher: Arc<KeyHasher>,
	pub proxies: Arc<TrustedProxies>,

	pub admin_guard: Arc<TokenGuard>,
	pub cron_guard: Arc<TokenGuard>,
	pub submit_guard: Arc<TokenGuard>,
	pub monitoring: Arc<MonitoringGate>,

	pub pipeline: SubmissionPipeline,
	pub submitter_keys: SubmitterKeys,

	pub stats_cache: Arc<dyn StatsCacheAdapter>,
}

impl AppState {
	pub fn new(
		config: CoreConfig,
		nonce_adapter: Arc<dyn NonceAdapter>,
		stats_cache: Arc<dyn StatsCacheAdapter>,
	) -> App {
		let proxies = Arc::new(config.trusted_proxies);
		let admin_guard = Arc::new(TokenGuard::new(GuardKind::Admin, config.admin_keys));
		let cron_guard = Arc::new(TokenGuard::new(GuardKind::Cron, config.cron_keys));
		let submit_guard = Arc::new(TokenGuard::new(GuardKind::Submit, config.submit_keys));
		let monitoring = Arc::new(MonitoringGate::new(
			config.monitoring_cidrs,
			proxies.clone(),
			admin_guard.clone(),
			cron_guard.clone(),
		));
		let replay = ReplayGuard::new(config.replay, nonce_adapter);

		Arc::new(AppState {
			binder: Arc::new(InstallBinder::new(config.handshake)),
			limiters: Limiters::new(&config.rate_limits),
			key_hasher: Arc::new(KeyHasher::new()),
			proxies,
			admin_guard,
			cron_guard,
			submit_guard,
			monitoring,
			pipeline: SubmissionPipeline::new(SubmissionValidator::default(), replay),
			submitter_keys: SubmitterKeys::new(config.community_secret.as_deref()),
			stats_cache,
		})
	}

	/// Start idle-bucket collection for every limiter.
	///
	/// Must be called from within a tokio runtime.
	pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
		self.limiters.all().into_iter().map(spawn_gc_task).collect()
	}
}

pub type App = Arc<AppState>;

// vim: ts=4
