use std::process::ExitCode;
use std::sync::Arc;

use levelhead_nonce_adapter_redb::{AdapterConfig, NonceAdapterRedb};
use levelhead_server::app::init_tracing;
use levelhead_server::prelude::*;
use levelhead_server::{AppBuilder, Config};

async fn run() -> ClResult<()> {
	let config = Config::from_env()?;
	let nonce_adapter =
		NonceAdapterRedb::new(config.nonce_db_path.clone(), AdapterConfig::default()).await?;

	let mut builder = AppBuilder::new(config);
	builder.nonce_adapter(Arc::new(nonce_adapter));
	builder.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
	init_tracing();

	match run().await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("FATAL: {}", e);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
