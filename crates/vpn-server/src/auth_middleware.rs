// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication extractor for protected routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::instrument;
use vpn_server_auth::{authenticate_headers, AuthError, CurrentUser};

use crate::api::AppState;
use crate::error::ServerError;

/// Extractor that requires a valid bearer token for an active user.
///
/// Rejects with 401 when the header is missing, the token does not validate,
/// or the user has since been deactivated.
///
/// ```ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     user.user.email
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
	type Rejection = ServerError;

	#[instrument(name = "RequireAuth::from_request_parts", skip_all)]
	async fn from_request_parts(
		parts: &mut Parts,
		state: &AppState,
	) -> Result<Self, Self::Rejection> {
		let claims = authenticate_headers(&parts.headers, &state.jwt).map_err(|e| {
			tracing::debug!(error = %e, "authentication failed");
			ServerError::from(e)
		})?;

		let user = state
			.user_repo
			.get_active_user_by_id(&claims.user_id)
			.await?
			.ok_or(AuthError::UserNotFound)?;

		tracing::debug!(user_id = %user.id, "authenticated");
		Ok(RequireAuth(CurrentUser::new(user)))
	}
}
