use levelhead::nonce_adapter::NonceAdapter;
use levelhead_nonce_adapter_redb::{AdapterConfig, NonceAdapterRedb};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(600);
const T0: u64 = 1_700_000_000_000;

/// Helper to create a temporary adapter for testing
async fn create_test_adapter() -> (NonceAdapterRedb, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let config = AdapterConfig { auto_purge: false, ..AdapterConfig::default() };

	let adapter = NonceAdapterRedb::new(temp_dir.path().join("nonces.redb"), config)
		.await
		.expect("Failed to create adapter");

	(adapter, temp_dir)
}

#[tokio::test]
async fn test_first_use_wins() {
	let (adapter, _temp) = create_test_adapter().await;

	assert!(adapter.set_if_absent_at("nonce:k:abc", TTL, T0).await.expect("set"));
	assert!(!adapter.set_if_absent_at("nonce:k:abc", TTL, T0 + 1).await.expect("set"));
	assert!(adapter.set_if_absent_at("nonce:k:def", TTL, T0 + 1).await.expect("set"));
}

#[tokio::test]
async fn test_expired_entry_counts_as_absent() {
	let (adapter, _temp) = create_test_adapter().await;
	let ttl_ms = 600_000;

	assert!(adapter.set_if_absent_at("nonce:k:abc", TTL, T0).await.expect("set"));
	assert!(!adapter.set_if_absent_at("nonce:k:abc", TTL, T0 + ttl_ms - 1).await.expect("set"));
	assert!(adapter.set_if_absent_at("nonce:k:abc", TTL, T0 + ttl_ms).await.expect("set"));
}

#[tokio::test]
async fn test_purge_removes_only_expired() {
	let (adapter, _temp) = create_test_adapter().await;

	adapter.set_if_absent_at("short", Duration::from_secs(1), T0).await.expect("set");
	adapter.set_if_absent_at("long", TTL, T0).await.expect("set");
	assert_eq!(adapter.len().await.expect("len"), 2);

	let removed = adapter.purge_expired_at(T0 + 5_000).await.expect("purge");
	assert_eq!(removed, 1);
	assert_eq!(adapter.len().await.expect("len"), 1);
	assert!(!adapter.set_if_absent_at("long", TTL, T0 + 5_000).await.expect("set"));
}

#[tokio::test]
async fn test_entries_survive_reopen() {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let path = temp_dir.path().join("nested").join("nonces.redb");
	let config = AdapterConfig { auto_purge: false, ..AdapterConfig::default() };

	{
		let adapter = NonceAdapterRedb::new(path.clone(), config.clone()).await.expect("open");
		assert!(adapter.set_if_absent("nonce:k:persist", TTL).await.expect("set"));
	}

	let adapter = NonceAdapterRedb::new(path, config).await.expect("reopen");
	assert!(!adapter.set_if_absent("nonce:k:persist", TTL).await.expect("set"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_set_if_absent_admits_one() {
	let (adapter, _temp) = create_test_adapter().await;
	let adapter = Arc::new(adapter);

	let mut handles = Vec::new();
	for _ in 0..32 {
		let adapter = Arc::clone(&adapter);
		handles.push(tokio::spawn(async move {
			adapter.set_if_absent("nonce:k:race", TTL).await.expect("set")
		}));
	}

	let mut winners = 0;
	for handle in handles {
		if handle.await.expect("join") {
			winners += 1;
		}
	}
	assert_eq!(winners, 1);
}

// vim: ts=4
