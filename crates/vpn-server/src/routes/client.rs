// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client tunnel configuration handlers.
//!
//! Both handlers hand the authorization workflow to the state's task tracker,
//! so the device and database steps finish even if the client disconnects.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use vpn_server_wgtunnel::{render_config, ClientConfig, ServerResponse, CLIENT_PRIVATE_KEY_PLACEHOLDER};

use crate::api::AppState;
use crate::api_response::ok;
use crate::auth_middleware::RequireAuth;
use crate::error::ServerError;
use crate::validation::parse_server_id;

#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
	#[serde(default)]
	pub public_key: String,
	#[serde(default)]
	pub server_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
	/// The rendered configuration file.
	pub config: String,
	#[serde(flatten)]
	pub document: ClientConfig,
	pub server: ServerResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeResponse {
	pub server_id: String,
	pub revoked: bool,
}

/// GET|POST /api/client/config
#[tracing::instrument(skip_all)]
pub async fn get_config(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
	payload: Result<Json<ConfigRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
	let Json(req) = payload?;
	if req.public_key.trim().is_empty() {
		return Err(ServerError::BadRequest("Public key is required".to_string()));
	}
	let server_id = parse_server_id(&req.server_id).map_err(ServerError::BadRequest)?;
	let user_id = current_user.id().into_inner();

	let server = state.wg.directory.get_active_server(server_id).await?;

	let authorizations = state.wg.authorizations.clone();
	let public_key = req.public_key;
	let authorization = state
		.tasks
		.spawn(async move {
			authorizations
				.authorize(user_id, server_id, &public_key)
				.await
		})
		.await??;

	let document = render_config(&server, authorization.address, CLIENT_PRIVATE_KEY_PLACEHOLDER);
	tracing::info!(
		%user_id,
		%server_id,
		address = %authorization.address,
		"client configuration issued"
	);

	Ok(ok(ConfigResponse {
		config: document.to_string(),
		document,
		server: ServerResponse::from(&server),
	}))
}

/// DELETE /api/client/config/{server_id}
#[tracing::instrument(skip_all)]
pub async fn revoke_config(
	RequireAuth(current_user): RequireAuth,
	State(state): State<AppState>,
	Path(raw_server_id): Path<String>,
) -> Result<Response, ServerError> {
	let server_id = parse_server_id(&raw_server_id).map_err(ServerError::BadRequest)?;
	let user_id = current_user.id().into_inner();

	let authorizations = state.wg.authorizations.clone();
	state
		.tasks
		.spawn(async move { authorizations.deauthorize(user_id, server_id).await })
		.await??;

	tracing::info!(%user_id, %server_id, "client configuration revoked");
	Ok(ok(RevokeResponse {
		server_id: server_id.to_string(),
		revoked: true,
	}))
}
