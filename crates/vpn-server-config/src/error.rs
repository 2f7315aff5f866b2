// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Errors raised while loading and checking the server configuration.

use std::path::PathBuf;
use vpn_common_secret::SecretEnvError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// A required setting has no value in any source.
	#[error("{0} is not set; export it or point {0}_FILE at a file holding it")]
	MissingEnvVar(String),

	#[error("{key} has an unusable value: {message}")]
	InvalidValue { key: String, message: String },

	#[error("cannot read {}: {source}", path.display())]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{} is not valid TOML: {source}", path.display())]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// Settings that load fine but must not be run with.
	#[error("configuration rejected: {0}")]
	Rejected(String),

	#[error(transparent)]
	Secret(#[from] SecretEnvError),
}
