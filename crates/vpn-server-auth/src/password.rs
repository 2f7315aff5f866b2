// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use argon2::password_hash::{
	rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use tracing::instrument;

use crate::argon2_config::argon2_instance;
use crate::error::{AuthError, Result};

/// Hash a password into an Argon2id PHC string.
#[instrument(level = "debug", skip_all)]
pub fn hash_password(password: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Constant-time check of `password` against a stored PHC string.
///
/// A malformed stored hash verifies as `false`.
#[instrument(level = "debug", skip_all)]
pub fn verify_password(password: &str, hash: &str) -> bool {
	let parsed_hash = match PasswordHash::new(hash) {
		Ok(h) => h,
		Err(_) => return false,
	};
	argon2_instance()
		.verify_password(password.as_bytes(), &parsed_hash)
		.is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hash_then_verify() {
		let hash = hash_password("SecurePass1").unwrap();
		assert!(hash.starts_with("$argon2id$"));
		assert!(verify_password("SecurePass1", &hash));
		assert!(!verify_password("securepass1", &hash));
	}

	#[test]
	fn same_password_gets_different_salts() {
		let a = hash_password("SecurePass1").unwrap();
		let b = hash_password("SecurePass1").unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn malformed_hash_never_verifies() {
		assert!(!verify_password("SecurePass1", "not-a-phc-string"));
		assert!(!verify_password("SecurePass1", ""));
	}
}
