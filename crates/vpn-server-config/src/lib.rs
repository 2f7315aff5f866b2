// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the VPN backend server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`VPN_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use vpn_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}:{}", config.http.host, config.http.port);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub auth: AuthConfig,
	pub wireguard: WireGuardConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`VPN_SERVER_*`)
/// 2. Config file (`/etc/vpn/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Resolve a merged layer into a validated configuration.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize()?;
	let wireguard = layer.wireguard.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&auth, &wireguard)?;

	info!(
		host = %http.host,
		port = http.port,
		database = %database.url,
		environment = %auth.environment,
		interface = %wireguard.interface,
		server_id = %wireguard.server_id,
		bootstrap = wireguard.bootstrap,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		auth,
		wireguard,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(auth: &AuthConfig, wireguard: &WireGuardConfig) -> Result<(), ConfigError> {
	if auth.is_production() && auth.jwt_secret.expose().len() < MIN_PRODUCTION_SECRET_LEN {
		return Err(ConfigError::Rejected(format!(
			"{JWT_SECRET_ENV} must be at least {MIN_PRODUCTION_SECRET_LEN} bytes when \
			 VPN_SERVER_ENV=production"
		)));
	}

	if wireguard.sync_attempts == 0 {
		return Err(ConfigError::Rejected(
			"VPN_SERVER_WG_SYNC_ATTEMPTS must be at least 1".to_string(),
		));
	}

	if wireguard.device_timeout_secs == 0 {
		return Err(ConfigError::Rejected(
			"VPN_SERVER_WG_DEVICE_TIMEOUT_SECS must be at least 1".to_string(),
		));
	}

	Ok(())
}
