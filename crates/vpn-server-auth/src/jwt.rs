// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HS256 bearer tokens issued at register/login.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use vpn_common_secret::SecretString;

use crate::error::{AuthError, Result};
use crate::types::{User, UserId};

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	pub sub: String,
	pub user_id: UserId,
	pub email: String,
	pub iss: String,
	pub iat: i64,
	pub exp: i64,
}

/// Signs and validates tokens with a shared HMAC secret.
pub struct JwtManager {
	encoding_key: EncodingKey,
	decoding_key: DecodingKey,
	issuer: String,
	ttl: Duration,
}

impl std::fmt::Debug for JwtManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JwtManager")
			.field("issuer", &self.issuer)
			.field("ttl", &self.ttl)
			.finish_non_exhaustive()
	}
}

impl JwtManager {
	pub fn new(secret: &SecretString, issuer: impl Into<String>, ttl: Duration) -> Self {
		let bytes = secret.expose().as_bytes();
		Self {
			encoding_key: EncodingKey::from_secret(bytes),
			decoding_key: DecodingKey::from_secret(bytes),
			issuer: issuer.into(),
			ttl,
		}
	}

	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	#[instrument(skip(self, user), fields(user_id = %user.id))]
	pub fn issue(&self, user: &User) -> Result<String> {
		let now = Utc::now().timestamp();
		let claims = Claims {
			sub: user.id.to_string(),
			user_id: user.id,
			email: user.email.clone(),
			iss: self.issuer.clone(),
			iat: now,
			exp: now + self.ttl.as_secs() as i64,
		};

		let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
			.map_err(|e| AuthError::TokenEncoding(e.to_string()))?;

		debug!(exp = claims.exp, "issued bearer token");
		Ok(token)
	}

	#[instrument(level = "debug", skip_all)]
	pub fn validate(&self, token: &str) -> Result<Claims> {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.set_issuer(&[self.issuer.as_str()]);
		validation.set_required_spec_claims(&["exp", "iss", "sub"]);

		decode::<Claims>(token, &self.decoding_key, &validation)
			.map(|data| data.claims)
			.map_err(|e| match e.kind() {
				ErrorKind::ExpiredSignature => AuthError::TokenExpired,
				_ => AuthError::InvalidToken,
			})
	}
}
