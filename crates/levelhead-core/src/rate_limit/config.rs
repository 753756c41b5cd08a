//! Rate Limit Configuration
//!
//! Window length and maximum count for each of the limiter tiers.

use std::time::Duration;

/// Limits of one fixed-window limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
	/// Length of one counting window
	pub window: Duration,
	/// Maximum admitted requests per key and window
	pub max: u32,
}

impl RateLimitConfig {
	pub const fn new(window: Duration, max: u32) -> Self {
		Self { window, max }
	}

	/// Per-install limit on authenticated mod traffic (300 per 5 minutes)
	pub const fn install() -> Self {
		Self::new(Duration::from_secs(5 * 60), 300)
	}

	/// Per-IP limit on unauthenticated public endpoints (60 per minute)
	pub const fn public() -> Self {
		Self::new(Duration::from_secs(60), 60)
	}

	/// Per IP + key hash limit on key status checks (10 per minute)
	pub const fn status_check() -> Self {
		Self::new(Duration::from_secs(60), 10)
	}

	/// Per-IP limit on admin endpoints (30 per minute)
	pub const fn admin() -> Self {
		Self::new(Duration::from_secs(60), 30)
	}
}

/// All limiter tiers of the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitTiers {
	pub install: RateLimitConfig,
	pub public: RateLimitConfig,
	pub status_check: RateLimitConfig,
	pub admin: RateLimitConfig,
}

impl Default for RateLimitTiers {
	fn default() -> Self {
		Self {
			install: RateLimitConfig::install(),
			public: RateLimitConfig::public(),
			status_check: RateLimitConfig::status_check(),
			admin: RateLimitConfig::admin(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_tiers() {
		let tiers = RateLimitTiers::default();
		assert_eq!(tiers.install.max, 300);
		assert_eq!(tiers.install.window, Duration::from_secs(300));
		assert_eq!(tiers.public.max, 60);
		assert_eq!(tiers.admin.max, 30);
		// Status checks are stricter than general public traffic
		assert!(tiers.status_check.max < tiers.public.max);
	}
}

// vim: ts=4
