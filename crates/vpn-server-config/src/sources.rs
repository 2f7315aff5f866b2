// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};
use uuid::Uuid;
use vpn_common_secret::load_secret_env;

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuthConfigLayer, DatabaseConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer,
	WgBackendKind, WireGuardConfigLayer, JWT_SECRET_ENV,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/vpn/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: VPN_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			database: Some(load_database_from_env()?),
			auth: Some(load_auth_from_env()?),
			wireguard: Some(load_wireguard_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u32 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_parsed<T>(name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => parse(&v).map(Some).ok_or_else(|| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("unrecognized value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("VPN_SERVER_HOST"),
		port: env_u16("VPN_SERVER_PORT")?,
		shutdown_grace_secs: env_u64("VPN_SERVER_SHUTDOWN_GRACE_SECS")?,
		request_timeout_secs: env_u64("VPN_SERVER_REQUEST_TIMEOUT_SECS")?,
	})
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("VPN_SERVER_DATABASE_URL"),
		max_connections: env_u32("VPN_SERVER_DATABASE_MAX_CONNECTIONS")?,
		acquire_timeout_secs: env_u64("VPN_SERVER_DATABASE_ACQUIRE_TIMEOUT_SECS")?,
	})
}

fn load_auth_from_env() -> Result<AuthConfigLayer, ConfigError> {
	Ok(AuthConfigLayer {
		environment: env_var("VPN_SERVER_ENV"),
		jwt_secret: load_secret_env(JWT_SECRET_ENV)?,
		jwt_ttl_secs: env_u64("VPN_SERVER_JWT_TTL_SECS")?,
		jwt_issuer: env_var("VPN_SERVER_JWT_ISSUER"),
	})
}

fn load_wireguard_from_env() -> Result<WireGuardConfigLayer, ConfigError> {
	Ok(WireGuardConfigLayer {
		interface: env_var("VPN_SERVER_WG_INTERFACE"),
		backend: env_parsed("VPN_SERVER_WG_BACKEND", WgBackendKind::parse)?,
		public_key_file: env_var("VPN_SERVER_WG_PUBLIC_KEY_FILE").map(PathBuf::from),
		server_id: env_parsed("VPN_SERVER_WG_SERVER_ID", |v| Uuid::parse_str(v).ok())?,
		sync_attempts: env_u32("VPN_SERVER_WG_SYNC_ATTEMPTS")?,
		sync_retry_secs: env_u64("VPN_SERVER_WG_SYNC_RETRY_SECS")?,
		device_timeout_secs: env_u64("VPN_SERVER_WG_DEVICE_TIMEOUT_SECS")?,
		bootstrap: env_bool("VPN_SERVER_WG_BOOTSTRAP"),
		server_name: env_var("VPN_SERVER_WG_SERVER_NAME"),
		server_location: env_var("VPN_SERVER_WG_SERVER_LOCATION"),
		endpoint: env_var("VPN_SERVER_WG_ENDPOINT"),
		listen_port: env_u16("VPN_SERVER_WG_LISTEN_PORT")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var("VPN_SERVER_LOG_LEVEL"),
		format: env_parsed("VPN_SERVER_LOG_FORMAT", LogFormat::parse)?,
	})
}
