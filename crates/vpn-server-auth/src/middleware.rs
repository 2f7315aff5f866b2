// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bearer-token extraction for authenticated routes.
//!
//! Token values are never logged.

use http::header::AUTHORIZATION;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AuthError, Result};
use crate::jwt::{Claims, JwtManager};
use crate::types::{User, UserId};

/// The authenticated caller, resolved from a validated token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
	pub user: User,
}

impl CurrentUser {
	pub fn new(user: User) -> Self {
		Self { user }
	}

	pub fn id(&self) -> UserId {
		self.user.id
	}
}

#[instrument(level = "trace", skip_all)]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
	let auth_header = headers.get(AUTHORIZATION)?;
	let auth_str = auth_header.to_str().ok()?;
	auth_str
		.strip_prefix("Bearer ")
		.map(str::trim)
		.filter(|token| !token.is_empty())
		.map(|token| token.to_string())
}

/// Extract and validate the bearer token on a request.
pub fn authenticate_headers(headers: &HeaderMap, jwt: &JwtManager) -> Result<Claims> {
	let token = extract_bearer_token(headers).ok_or(AuthError::AuthenticationRequired)?;
	jwt.validate(&token)
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::HeaderValue;

	#[test]
	fn extracts_bearer_token() {
		let mut headers = HeaderMap::new();
		headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
		assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
	}

	#[test]
	fn ignores_other_schemes_and_empty_tokens() {
		let mut headers = HeaderMap::new();
		assert!(extract_bearer_token(&headers).is_none());

		headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
		assert!(extract_bearer_token(&headers).is_none());

		headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
		assert!(extract_bearer_token(&headers).is_none());
	}

	#[test]
	fn missing_header_requires_authentication() {
		let jwt = JwtManager::new(
			&vpn_common_secret::Secret::new("0123456789abcdef0123456789abcdef".to_string()),
			"vpn-service",
			crate::jwt::DEFAULT_TOKEN_TTL,
		);
		let err = authenticate_headers(&HeaderMap::new(), &jwt).unwrap_err();
		assert!(matches!(err, AuthError::AuthenticationRequired));
	}
}
