// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use vpn_server_auth::AuthError;
use vpn_server_db::DbError;
use vpn_server_wgtunnel::{ErrorKind, WgError};

use crate::api_response::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("unauthorized: {0}")]
	Unauthorized(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("bad gateway: {0}")]
	BadGateway(String),

	#[error("service unavailable: {0}")]
	ServiceUnavailable(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl ServerError {
	pub fn status(&self) -> StatusCode {
		match self {
			ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			ServerError::NotFound(_) => StatusCode::NOT_FOUND,
			ServerError::Conflict(_) => StatusCode::CONFLICT,
			ServerError::BadGateway(_) => StatusCode::BAD_GATEWAY,
			ServerError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn public_message(&self) -> &str {
		match self {
			ServerError::BadRequest(m)
			| ServerError::Unauthorized(m)
			| ServerError::NotFound(m)
			| ServerError::Conflict(m)
			| ServerError::BadGateway(m)
			| ServerError::ServiceUnavailable(m) => m,
			ServerError::Internal(_) => "Internal server error",
		}
	}
}

impl From<WgError> for ServerError {
	fn from(e: WgError) -> Self {
		match e.kind() {
			ErrorKind::Validation => ServerError::BadRequest(e.to_string()),
			ErrorKind::NotFound => ServerError::NotFound(match e {
				WgError::ServerNotFound => "Server not found".to_string(),
				_ => "No active configuration for this server".to_string(),
			}),
			ErrorKind::Conflict => {
				tracing::warn!(error = %e, "authorization conflict");
				ServerError::Conflict(match e {
					WgError::KeyInUse => "Public key is already in use".to_string(),
					_ => "Conflicting authorization, retry the request".to_string(),
				})
			}
			ErrorKind::ResourceExhausted => {
				tracing::warn!(error = %e, "address pool exhausted");
				ServerError::ServiceUnavailable("Server is at capacity".to_string())
			}
			ErrorKind::Device => {
				tracing::error!(error = %e, "tunnel device failure");
				ServerError::BadGateway("VPN device unavailable".to_string())
			}
			ErrorKind::Persistence | ErrorKind::StartupFatal | ErrorKind::Internal => {
				ServerError::Internal(e.to_string())
			}
		}
	}
}

impl From<DbError> for ServerError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Conflict(msg) => ServerError::Conflict(msg),
			DbError::NotFound(msg) => ServerError::NotFound(msg),
			other => ServerError::Internal(other.to_string()),
		}
	}
}

impl From<AuthError> for ServerError {
	fn from(e: AuthError) -> Self {
		match e {
			AuthError::AuthenticationRequired => {
				ServerError::Unauthorized("Authorization header required".to_string())
			}
			AuthError::InvalidCredentials => ServerError::Unauthorized("Invalid credentials".to_string()),
			AuthError::InvalidToken => ServerError::Unauthorized("Invalid token".to_string()),
			AuthError::TokenExpired => ServerError::Unauthorized("Token expired".to_string()),
			AuthError::UserNotFound => ServerError::Unauthorized("User not found or inactive".to_string()),
			AuthError::PasswordHash(_) | AuthError::TokenEncoding(_) => {
				ServerError::Internal(e.to_string())
			}
		}
	}
}

impl From<JsonRejection> for ServerError {
	fn from(e: JsonRejection) -> Self {
		ServerError::BadRequest(e.body_text())
	}
}

impl From<tokio::task::JoinError> for ServerError {
	fn from(e: tokio::task::JoinError) -> Self {
		ServerError::Internal(format!("background task failed: {e}"))
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = self.status();
		if let ServerError::Internal(detail) = &self {
			tracing::error!(error = %detail, "request failed");
		}
		(status, Json(ErrorBody::new(self.public_message()))).into_response()
	}
}
