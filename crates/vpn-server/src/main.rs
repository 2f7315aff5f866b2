// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! VPN subscription backend server binary.

use anyhow::Context;
use axum::http::Method;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
	cors::{Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vpn_server::version;
use vpn_server::{create_app_state, create_router};
use vpn_server_config::{LogFormat, ServerConfig, WgBackendKind};
use vpn_server_db::ServerRepository;
use vpn_server_wgtunnel::{
	DeviceBackend, ManagedServer, NewServer, ServerDirectory, SyncOutcome, WireGuardDevice,
};

/// VPN server - subscription backend for WireGuard clients.
#[derive(Parser, Debug)]
#[command(name = "vpn-server", about = "VPN subscription backend", version)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/vpn/server.toml)
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP server (default)
	Serve,
	/// Register a VPN server in the directory
	AddServer {
		#[arg(long)]
		name: String,
		#[arg(long)]
		location: String,
		/// Public host name or address clients connect to
		#[arg(long)]
		endpoint: String,
		#[arg(long, default_value_t = 51820)]
		port: u16,
		/// Existing base64 public key; a key pair is generated when omitted
		#[arg(long)]
		public_key: Option<String>,
	},
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => vpn_server_config::load_config_with_file(path)?,
		None => vpn_server_config::load_config()?,
	};

	init_tracing(&config);

	match args.command {
		Some(Command::AddServer {
			name,
			location,
			endpoint,
			port,
			public_key,
		}) => {
			let pool = open_database(&config).await?;
			let directory = ServerDirectory::new(Arc::new(ServerRepository::new(pool)));
			let server = directory
				.create_server(&NewServer {
					id: None,
					name,
					location,
					endpoint,
					port,
					public_key,
				})
				.await?;
			println!("{}\t{}\t{}", server.id, server.location, server.public_key);
			Ok(())
		}
		Some(Command::Serve) | None => serve(config).await,
		Some(Command::Version) => Ok(()),
	}
}

fn init_tracing(config: &ServerConfig) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);
	match config.logging.format {
		LogFormat::Json => registry.with(fmt::layer().json()).init(),
		LogFormat::Pretty => registry.with(fmt::layer()).init(),
	}
}

async fn open_database(config: &ServerConfig) -> anyhow::Result<SqlitePool> {
	let pool = vpn_server_db::create_pool(
		&config.database.url,
		config.database.max_connections,
		config.database.acquire_timeout(),
	)
	.await
	.context("failed to open database")?;
	vpn_server_db::run_migrations(&pool)
		.await
		.context("failed to run migrations")?;
	Ok(pool)
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
	let pool = open_database(&config).await?;
	let wg = &config.wireguard;

	let backend = match wg.backend {
		WgBackendKind::Kernel => DeviceBackend::Kernel,
		WgBackendKind::Userspace => DeviceBackend::Userspace,
	};
	let device = Arc::new(
		WireGuardDevice::new(&wg.interface, backend)
			.context("failed to open WireGuard interface")?
			.with_deadline(wg.device_timeout()),
	);

	let state = create_app_state(pool, &config, device);

	if wg.bootstrap {
		let created = state
			.wg
			.directory
			.ensure_managed_server(&ManagedServer {
				id: wg.server_id,
				name: wg.server_name.clone(),
				location: wg.server_location.clone(),
				endpoint: wg.endpoint.clone(),
				port: wg.listen_port,
			})
			.await?;
		if created {
			tracing::info!(server_id = %wg.server_id, "managed server record created");
		}
	}

	let outcome = state
		.wg
		.directory
		.sync_public_key_with_retry(
			&wg.public_key_file,
			wg.server_id,
			wg.sync_attempts,
			wg.sync_retry_interval(),
		)
		.await
		.context("server public key synchronization failed")?;
	match outcome {
		SyncOutcome::Updated => tracing::info!(server_id = %wg.server_id, "server public key updated"),
		SyncOutcome::Unchanged => tracing::debug!(server_id = %wg.server_id, "server public key unchanged"),
	}

	let tasks = state.tasks.clone();
	let app = create_router(state)
		.layer(TimeoutLayer::new(config.http.request_timeout()))
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
				.allow_headers(Any),
		);

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!("listening on {}", addr);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tasks.close();
	let grace = config.http.shutdown_grace();
	if tokio::time::timeout(grace, tasks.wait()).await.is_err() {
		tracing::warn!(
			pending = tasks.len(),
			"shutdown grace period elapsed with workflows still running"
		);
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "failed to listen for ctrl-c");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				tracing::error!(error = %e, "failed to listen for SIGTERM");
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

	tracing::info!("Received shutdown signal");
}
