// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::keys::{validate_public_key, KeyError, WgPublicKey};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum KeyFileError {
	#[error("failed to read key file: {0}")]
	Read(#[from] std::io::Error),

	#[error("key file is empty")]
	Empty,

	#[error("invalid key format: {0}")]
	InvalidFormat(#[from] KeyError),
}

impl KeyFileError {
	/// True when the file simply has not been written yet.
	pub fn is_missing(&self) -> bool {
		matches!(self, KeyFileError::Read(e) if e.kind() == std::io::ErrorKind::NotFound)
			|| matches!(self, KeyFileError::Empty)
	}
}

pub type Result<T> = std::result::Result<T, KeyFileError>;

/// Read the public key a device bootstrap process wrote as plain text.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_public_key_file(path: impl AsRef<Path>) -> Result<WgPublicKey> {
	let content = fs::read_to_string(path.as_ref()).await?;
	let trimmed = content.trim();
	if trimmed.is_empty() {
		return Err(KeyFileError::Empty);
	}
	Ok(validate_public_key(trimmed)?)
}
