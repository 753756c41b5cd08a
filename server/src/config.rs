//! Server configuration, read once from the environment at startup

use std::path::PathBuf;
use std::time::Duration;

use levelhead_core::guard::TokenSet;
use levelhead_core::handshake::HandshakeConfig;
use levelhead_core::rate_limit::extractors::parse_cidr_list;
use levelhead_core::rate_limit::{RateLimitConfig, RateLimitTiers, TrustedProxies};
use levelhead_core::replay::ReplayConfig;
use levelhead_core::CoreConfig;

use crate::prelude::*;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";
pub const DEFAULT_NONCE_DB_PATH: &str = "./data/nonces.redb";

#[derive(Debug, Clone)]
pub struct Config {
	pub listen: Box<str>,
	pub nonce_db_path: PathBuf,
	pub core: CoreConfig,
}

impl Config {
	pub fn from_env() -> ClResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Build the configuration from an arbitrary variable source
	pub fn from_lookup<F>(lookup: F) -> ClResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let env = Env(lookup);

		let proxy_tokens = env.list("PROXY_AUTH_TOKENS");
		if proxy_tokens.is_empty() {
			error!("FATAL: PROXY_AUTH_TOKENS must include at least one token");
			return Err(Error::Internal("PROXY_AUTH_TOKENS must include at least one token".into()));
		}

		let admin_keys = env.list("ADMIN_API_KEYS");
		let submit_keys = match env.var("SUBMIT_API_KEYS") {
			Some(raw) => split_list(&raw),
			None => admin_keys.clone(),
		};

		let rate_limits = RateLimitTiers {
			install: env.limit("RATE_LIMIT", RateLimitConfig::install()),
			public: env.limit("PUBLIC_RATE_LIMIT", RateLimitConfig::public()),
			status_check: env.limit("STATUS_RATE_LIMIT", RateLimitConfig::status_check()),
			admin: env.limit("ADMIN_RATE_LIMIT", RateLimitConfig::admin()),
		};

		let replay = ReplayConfig {
			submission_ttl: env.millis("SUBMISSION_TTL", ReplayConfig::default().submission_ttl),
		};

		let trusted_proxies = TrustedProxies::new(
			env.flag("TRUST_PROXY_ENABLED"),
			env.var("TRUST_PROXY_CIDRS").map(|raw| parse_cidr_list(&raw)).unwrap_or_default(),
		);

		let core = CoreConfig {
			handshake: HandshakeConfig { proxy_tokens: TokenSet::new(&proxy_tokens) },
			admin_keys: TokenSet::new(&admin_keys),
			cron_keys: TokenSet::new(env.list("CRON_API_KEYS")),
			submit_keys: TokenSet::new(&submit_keys),
			rate_limits,
			replay,
			community_secret: env.var("COMMUNITY_SUBMIT_SECRET").filter(|s| !s.trim().is_empty()),
			monitoring_cidrs: env
				.var("MONITORING_ALLOWED_CIDRS")
				.map(|raw| parse_cidr_list(&raw))
				.unwrap_or_default(),
			trusted_proxies,
		};

		Ok(Config {
			listen: env.var("LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.into()).into(),
			nonce_db_path: env
				.var("NONCE_DB_PATH")
				.map_or_else(|| PathBuf::from(DEFAULT_NONCE_DB_PATH), PathBuf::from),
			core,
		})
	}
}

fn split_list(raw: &str) -> Vec<String> {
	raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(ToString::to_string).collect()
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
	fn var(&self, name: &str) -> Option<String> {
		(self.0)(name)
	}

	fn list(&self, name: &str) -> Vec<String> {
		self.var(name).map(|raw| split_list(&raw)).unwrap_or_default()
	}

	fn flag(&self, name: &str) -> bool {
		self.var(name)
			.is_some_and(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
	}

	fn u64(&self, name: &str, default: u64) -> u64 {
		let Some(raw) = self.var(name) else {
			return default;
		};
		raw.trim().parse().unwrap_or_else(|_| {
			warn!("Ignoring non-numeric {}={:?}, using {}", name, raw, default);
			default
		})
	}

	fn millis(&self, prefix: &str, default: Duration) -> Duration {
		let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
		Duration::from_millis(self.u64(&format!("{}_MS", prefix), default_ms))
	}

	/// `{PREFIX}_WINDOW_MS` and `{PREFIX}_MAX`
	fn limit(&self, prefix: &str, default: RateLimitConfig) -> RateLimitConfig {
		let window = self.millis(&format!("{}_WINDOW", prefix), default.window);
		let max = u32::try_from(self.u64(&format!("{}_MAX", prefix), u64::from(default.max)))
			.unwrap_or(u32::MAX);
		RateLimitConfig::new(window, max)
	}
}


// vim: ts=4
