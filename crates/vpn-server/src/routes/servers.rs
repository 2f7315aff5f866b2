// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::extract::State;
use axum::response::Response;
use vpn_server_wgtunnel::ServerResponse;

use crate::api::AppState;
use crate::api_response::ok;
use crate::auth_middleware::RequireAuth;
use crate::error::ServerError;

/// GET /api/servers/locations
#[tracing::instrument(skip_all)]
pub async fn list_locations(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
) -> Result<Response, ServerError> {
	let servers = state.wg.directory.list_active_servers().await?;
	tracing::debug!(user_id = %current_user.id(), count = servers.len(), "listed servers");
	let body: Vec<ServerResponse> = servers.iter().map(ServerResponse::from).collect();
	Ok(ok(body))
}
