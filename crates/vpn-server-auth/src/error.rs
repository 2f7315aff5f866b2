// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
	/// No bearer token on the request.
	#[error("authentication required")]
	AuthenticationRequired,

	/// Unknown email or wrong password. Deliberately indistinguishable.
	#[error("invalid credentials")]
	InvalidCredentials,

	#[error("invalid token")]
	InvalidToken,

	#[error("token expired")]
	TokenExpired,

	/// The token was valid but its user no longer exists or is inactive.
	#[error("user not found")]
	UserNotFound,

	#[error("password hashing failed: {0}")]
	PasswordHash(String),

	#[error("token encoding failed: {0}")]
	TokenEncoding(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
