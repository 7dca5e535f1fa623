use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use newsrec_engine::config::CliArgs;
use newsrec_engine::registry::ModelRegistry;
use newsrec_engine::server::{NewsServer, ServerConfig};
use newsrec_engine::transport::NdjsonTransport;

fn main() -> Result<()> {
	let args = CliArgs::parse();

	// Logs go to stderr; stdout carries the JSON-RPC stream.
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
		)
		.init();

	let config = args.model_config();
	config.validate()?;

	let registry = Arc::new(ModelRegistry::new());

	// Initial generation. A failed build leaves the server up and reporting
	// ModelNotLoaded until `model/build` succeeds.
	if let Some(corpus) = &args.corpus {
		tracing::info!(corpus = %corpus.display(), preset = ?args.preset, "Building initial model");
		if let Err(e) = registry.try_begin_build()?.run_from_path(corpus, &config) {
			tracing::error!(code = e.code(), "Initial model build failed: {}", e);
		}
	} else {
		tracing::warn!("No corpus configured; waiting for model/build");
	}

	let server_config = ServerConfig {
		corpus: args.corpus.clone(),
		model: config,
	};
	let transport = NdjsonTransport::stdout();
	let mut server = NewsServer::new(server_config, registry, transport);

	tracing::info!("newsrec-engine ready");
	server.run()?;
	Ok(())
}
