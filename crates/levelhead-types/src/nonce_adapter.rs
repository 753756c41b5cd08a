//! Adapter for the shared key-value store used for replay protection.
//!
//! The only operation the proxy needs is an atomic "set if absent, with expiry".
//! A check-then-set built from two calls would reopen the replay race, so
//! implementations must perform both steps as one atomic operation.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

use crate::prelude::*;

#[async_trait]
pub trait NonceAdapter: Debug + Send + Sync {
	/// Record `key` with the given time to live unless a live entry already exists.
	///
	/// Returns `Ok(true)` when the key was newly recorded and `Ok(false)` when it
	/// was already present. Any error means the store could not answer.
	async fn set_if_absent(&self, key: &str, ttl: Duration) -> ClResult<bool>;
}

// vim: ts=4
