// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and route table.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tower_http::set_header::SetResponseHeaderLayer;
use vpn_server_auth::JwtManager;
use vpn_server_config::ServerConfig;
use vpn_server_db::{UserRepository, UserStore};
use vpn_server_wgtunnel::{PeerDevice, WgTunnelServices};

use crate::routes;

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub user_repo: Arc<dyn UserStore>,
	pub jwt: Arc<JwtManager>,
	pub wg: WgTunnelServices,
	/// Authorization workflows run here so a dropped connection cannot cut
	/// them short. Drained on shutdown.
	pub tasks: TaskTracker,
}

impl AppState {
	pub fn new(pool: SqlitePool, jwt: JwtManager, wg: WgTunnelServices) -> Self {
		Self {
			user_repo: Arc::new(UserRepository::new(pool.clone())),
			pool,
			jwt: Arc::new(jwt),
			wg,
			tasks: TaskTracker::new(),
		}
	}
}

pub fn create_app_state(
	pool: SqlitePool,
	config: &ServerConfig,
	device: Arc<dyn PeerDevice>,
) -> AppState {
	let jwt = JwtManager::new(
		&config.auth.jwt_secret,
		config.auth.jwt_issuer.clone(),
		config.auth.jwt_ttl(),
	);
	let wg = WgTunnelServices::new(pool.clone(), device);
	AppState::new(pool, jwt, wg)
}

/// Build the API router. Tracing, CORS and the request timeout are layered on
/// by the binary.
pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/api/health", get(routes::health::health_check))
		.route("/api/users/register", post(routes::users::register))
		.route("/api/users/login", post(routes::users::login))
		.route(
			"/api/client/config",
			get(routes::client::get_config).post(routes::client::get_config),
		)
		.route(
			"/api/client/config/{server_id}",
			delete(routes::client::revoke_config),
		)
		.route("/api/servers/locations", get(routes::servers::list_locations))
		.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
		.layer(SetResponseHeaderLayer::if_not_present(
			header::X_CONTENT_TYPE_OPTIONS,
			HeaderValue::from_static("nosniff"),
		))
		.layer(SetResponseHeaderLayer::if_not_present(
			header::X_FRAME_OPTIONS,
			HeaderValue::from_static("DENY"),
		))
		.layer(SetResponseHeaderLayer::if_not_present(
			header::REFERRER_POLICY,
			HeaderValue::from_static("strict-origin-when-cross-origin"),
		))
		.layer(SetResponseHeaderLayer::if_not_present(
			header::STRICT_TRANSPORT_SECURITY,
			HeaderValue::from_static("max-age=31536000; includeSubDomains"),
		))
		.with_state(state)
}
