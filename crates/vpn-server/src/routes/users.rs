// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registration and login handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vpn_server_auth::{hash_password, verify_password, AuthError, User, UserId, UserResponse};

use crate::api::AppState;
use crate::api_response::{created, ok};
use crate::error::ServerError;
use crate::validation::{sanitize_email, validate_login, validate_registration};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
	pub user: UserResponse,
	pub token: String,
}

/// POST /api/users/register
#[tracing::instrument(skip_all)]
pub async fn register(
	State(state): State<AppState>,
	payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
	let Json(req) = payload?;
	let email = sanitize_email(&req.email);
	validate_registration(&email, &req.password).map_err(ServerError::BadRequest)?;

	if state.user_repo.email_exists(&email).await? {
		return Err(ServerError::Conflict(
			"User with this email already exists".to_string(),
		));
	}

	let password = req.password;
	let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

	let now = Utc::now();
	let user = User {
		id: UserId::generate(),
		email,
		password_hash,
		created_at: now,
		updated_at: now,
		is_active: true,
	};
	// The unique index still arbitrates a concurrent registration.
	state.user_repo.create_user(&user).await?;

	let token = state.jwt.issue(&user)?;
	tracing::info!(user_id = %user.id, "user registered");

	Ok(created(AuthResponse {
		user: UserResponse::from(&user),
		token,
	}))
}

/// POST /api/users/login
#[tracing::instrument(skip_all)]
pub async fn login(
	State(state): State<AppState>,
	payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
	let Json(req) = payload?;
	let email = sanitize_email(&req.email);
	validate_login(&email, &req.password).map_err(ServerError::BadRequest)?;

	let user = state
		.user_repo
		.get_active_user_by_email(&email)
		.await?
		.ok_or(AuthError::InvalidCredentials)?;

	let password = req.password;
	let hash = user.password_hash.clone();
	let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;
	if !verified {
		tracing::debug!(user_id = %user.id, "password mismatch");
		return Err(AuthError::InvalidCredentials.into());
	}

	let token = state.jwt.issue(&user)?;
	tracing::info!(user_id = %user.id, "user logged in");

	Ok(ok(AuthResponse {
		user: UserResponse::from(&user),
		token,
	}))
}
