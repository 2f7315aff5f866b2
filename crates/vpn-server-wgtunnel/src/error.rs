// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::device::DeviceError;
use vpn_server_db::DbError;
use vpn_wgtunnel_common::{KeyFileError, PoolError};

#[derive(Debug, thiserror::Error)]
pub enum WgError {
	#[error("invalid public key: {0}")]
	InvalidPublicKey(String),

	#[error("validation failed: {0}")]
	Validation(String),

	#[error("server not found")]
	ServerNotFound,

	#[error("no active authorization for this server")]
	AuthorizationNotFound,

	#[error("public key is already authorized for another account or server")]
	KeyInUse,

	#[error("address pool exhausted ({active} active peers)")]
	PoolExhausted { active: u32 },

	#[error("device error: {0}")]
	Device(#[from] DeviceError),

	#[error("persistence error: {0}")]
	Persistence(#[from] DbError),

	#[error("server key file: {0}")]
	KeyFile(#[from] KeyFileError),

	#[error("key generation failed: {0}")]
	KeyGeneration(String),

	#[error("startup aborted: {0}")]
	StartupFatal(String),

	#[error("internal error: {0}")]
	Internal(String),
}

/// Coarse classification callers map to responses and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Validation,
	NotFound,
	Conflict,
	ResourceExhausted,
	Device,
	Persistence,
	StartupFatal,
	Internal,
}

impl WgError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			WgError::InvalidPublicKey(_) | WgError::Validation(_) => ErrorKind::Validation,
			WgError::ServerNotFound | WgError::AuthorizationNotFound => ErrorKind::NotFound,
			WgError::KeyInUse | WgError::Persistence(DbError::Conflict(_)) => ErrorKind::Conflict,
			WgError::PoolExhausted { .. } => ErrorKind::ResourceExhausted,
			WgError::Device(_) => ErrorKind::Device,
			WgError::Persistence(_) => ErrorKind::Persistence,
			WgError::StartupFatal(_) => ErrorKind::StartupFatal,
			WgError::KeyFile(_) | WgError::KeyGeneration(_) | WgError::Internal(_) => {
				ErrorKind::Internal
			}
		}
	}
}

impl From<PoolError> for WgError {
	fn from(e: PoolError) -> Self {
		match e {
			PoolError::Exhausted { active } => WgError::PoolExhausted { active },
			other => WgError::Internal(other.to_string()),
		}
	}
}

pub type Result<T> = std::result::Result<T, WgError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pool_exhaustion_is_resource_exhausted() {
		let err: WgError = PoolError::Exhausted { active: 253 }.into();
		assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
	}

	#[test]
	fn other_pool_errors_are_internal() {
		let err: WgError = PoolError::HostOutOfRange(1).into();
		assert_eq!(err.kind(), ErrorKind::Internal);
	}

	#[test]
	fn registry_conflicts_are_conflicts() {
		let err: WgError = DbError::Conflict("address in use".to_string()).into();
		assert_eq!(err.kind(), ErrorKind::Conflict);
		assert_eq!(WgError::KeyInUse.kind(), ErrorKind::Conflict);
	}

	#[test]
	fn other_registry_failures_are_persistence() {
		let err: WgError = DbError::Internal("disk full".to_string()).into();
		assert_eq!(err.kind(), ErrorKind::Persistence);
	}

	#[test]
	fn device_failures_keep_their_kind() {
		let err: WgError = DeviceError::Unavailable("wg0 missing".to_string()).into();
		assert_eq!(err.kind(), ErrorKind::Device);
	}
}
