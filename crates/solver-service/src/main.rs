use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solver_config::{Config, ConfigLoader};
use solver_core::{SolverBuilder, SolverEngine};
use solver_types::{DeliveryEvent, ListenerEvent, OrderEvent, SolverEvent};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hyperlane7683-solver")]
#[command(about = "Hyperlane7683 cross-chain intent solver", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", env = "SOLVER_CONFIG", default_value = "config/solver.toml")]
	config: PathBuf,

	#[arg(long, env = "SOLVER_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the solver
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level);

	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn load_config(cli: &Cli) -> Result<Config> {
	info!("Loading configuration from: {:?}", cli.config);
	ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn start_service(cli: Cli) -> Result<()> {
	let config = load_config(&cli).await?;
	info!("Solver name: {}", config.solver.name);

	let engine = SolverBuilder::new(config)
		.build()
		.context("Failed to build solver")?;

	let events = tokio::spawn(log_events(engine.event_bus().subscribe()));

	if let Err(e) = engine.start().await {
		shutdown(&engine).await;
		events.abort();
		return Err(e).context("Failed to start solver");
	}

	wait_for_shutdown_signal().await;
	info!("Shutdown signal received, stopping listeners...");

	shutdown(&engine).await;
	events.abort();

	for (chain, block) in engine.progress() {
		info!(chain = %chain, block, "Last processed block");
	}
	info!("Solver stopped");
	Ok(())
}

async fn shutdown(engine: &SolverEngine) {
	if let Err(e) = engine.shutdown().await {
		error!("Shutdown did not complete cleanly: {}", e);
	}
}

async fn validate_config(cli: Cli) -> Result<()> {
	let config = load_config(&cli).await?;

	info!("Configuration is valid");
	info!("Solver name: {}", config.solver.name);
	info!("Storage backend: {}", config.storage.backend);
	for network in &config.networks {
		info!(
			"  Network: {} (chain {}, {}, domain {}, listener {})",
			network.name,
			network.chain_id,
			network.family,
			network.domain,
			if network.listener.enabled { "enabled" } else { "disabled" }
		);
	}
	if !config.rules.is_empty() {
		info!(
			"  Rules: {} allow, {} block entries",
			config.rules.allow_list.len(),
			config.rules.block_list.len()
		);
	}

	Ok(())
}

/// Logs order lifecycle transitions until the channel closes.
async fn log_events(mut receiver: broadcast::Receiver<SolverEvent>) {
	loop {
		let event = match receiver.recv().await {
			Ok(event) => event,
			Err(broadcast::error::RecvError::Lagged(skipped)) => {
				warn!(skipped, "Event log fell behind");
				continue;
			}
			Err(broadcast::error::RecvError::Closed) => break,
		};

		match event {
			SolverEvent::Order(OrderEvent::Discovered {
				order_id,
				origin_chain_id,
			}) => info!(order_id = %order_id, origin_chain_id, "Order discovered"),
			SolverEvent::Order(OrderEvent::Rejected { order_id, reason }) => {
				info!(order_id = %order_id, reason = %reason, "Order rejected")
			}
			SolverEvent::Order(OrderEvent::Skipped { order_id, reason }) => {
				info!(order_id = %order_id, reason = %reason, "Order skipped")
			}
			SolverEvent::Order(OrderEvent::Failed { order_id, error }) => {
				error!(order_id = %order_id, error = %error, "Order failed")
			}
			SolverEvent::Delivery(DeliveryEvent::Filled {
				order_id,
				chain_id,
				tx_hash,
			}) => info!(order_id = %order_id, chain_id, tx_hash = %tx_hash, "Order filled"),
			SolverEvent::Delivery(DeliveryEvent::Settled {
				order_id,
				chain_id,
				tx_hash,
			}) => info!(order_id = %order_id, chain_id, tx_hash = %tx_hash, "Order settled"),
			SolverEvent::Listener(ListenerEvent::RangeCommitted {
				chain_name,
				from,
				to,
			}) => tracing::debug!(chain = %chain_name, from, to, "Range committed"),
			SolverEvent::Listener(ListenerEvent::BackfillGaveUp {
				chain_name,
				from,
				to,
			}) => warn!(chain = %chain_name, from, to, "Backfill gave up, resuming in poll loop"),
		}
	}
}

fn setup_tracing(log_level: &str) {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();
}

async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
