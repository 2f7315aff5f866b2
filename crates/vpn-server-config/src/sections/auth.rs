// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication configuration: environment name and token signing.

use std::time::Duration;

use serde::Deserialize;
use vpn_common_secret::SecretString;

use crate::error::ConfigError;

pub const JWT_SECRET_ENV: &str = "VPN_SERVER_JWT_SECRET";
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_JWT_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_JWT_ISSUER: &str = "vpn-service";

#[derive(Debug, Clone)]
pub struct AuthConfig {
	pub environment: String,
	pub jwt_secret: SecretString,
	pub jwt_ttl_secs: u64,
	pub jwt_issuer: String,
}

impl AuthConfig {
	pub fn is_production(&self) -> bool {
		self.environment.eq_ignore_ascii_case("production")
	}

	pub fn jwt_ttl(&self) -> Duration {
		Duration::from_secs(self.jwt_ttl_secs)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub jwt_secret: Option<SecretString>,
	#[serde(default)]
	pub jwt_ttl_secs: Option<u64>,
	#[serde(default)]
	pub jwt_issuer: Option<String>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.environment.is_some() {
			self.environment = other.environment;
		}
		if other.jwt_secret.is_some() {
			self.jwt_secret = other.jwt_secret;
		}
		if other.jwt_ttl_secs.is_some() {
			self.jwt_ttl_secs = other.jwt_ttl_secs;
		}
		if other.jwt_issuer.is_some() {
			self.jwt_issuer = other.jwt_issuer;
		}
	}

	pub fn finalize(self) -> Result<AuthConfig, ConfigError> {
		let jwt_secret = self
			.jwt_secret
			.filter(|s| !s.expose().is_empty())
			.ok_or_else(|| ConfigError::MissingEnvVar(JWT_SECRET_ENV.to_string()))?;

		Ok(AuthConfig {
			environment: self
				.environment
				.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
			jwt_secret,
			jwt_ttl_secs: self.jwt_ttl_secs.unwrap_or(DEFAULT_JWT_TTL_SECS),
			jwt_issuer: self
				.jwt_issuer
				.unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use vpn_common_secret::Secret;

	#[test]
	fn test_missing_secret_is_error() {
		let err = AuthConfigLayer::default().finalize().unwrap_err();
		assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == JWT_SECRET_ENV));
	}

	#[test]
	fn test_defaults_with_secret() {
		let config = AuthConfigLayer {
			jwt_secret: Some(Secret::new("dev-secret".to_string())),
			..Default::default()
		}
		.finalize()
		.unwrap();

		assert_eq!(config.environment, "development");
		assert!(!config.is_production());
		assert_eq!(config.jwt_ttl(), Duration::from_secs(86400));
		assert_eq!(config.jwt_issuer, "vpn-service");
	}

	#[test]
	fn test_secret_is_redacted_in_debug() {
		let config = AuthConfigLayer {
			jwt_secret: Some(Secret::new("super-sensitive".to_string())),
			..Default::default()
		}
		.finalize()
		.unwrap();
		assert!(!format!("{config:?}").contains("super-sensitive"));
	}
}
