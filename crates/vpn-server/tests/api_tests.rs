// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end tests driving the router with an in-memory database and a
//! recording tunnel device.

use async_trait::async_trait;
use axum::{
	body::Body,
	http::{header, Method, Request, StatusCode},
	Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use vpn_common_secret::SecretString;
use vpn_server::{create_router, AppState};
use vpn_server_auth::JwtManager;
use vpn_server_db::testing::{create_test_pool, seed_server};
use vpn_server_db::{
	ActiveAddressRow, DbError, PeerRepository, PeerRowTuple, PeerStore, ServerRepository,
};
use vpn_server_wgtunnel::testing::RecordingDevice;
use vpn_server_wgtunnel::WgTunnelServices;
use vpn_wgtunnel_common::{WgKeyPair, WgPublicKey};

const PASSWORD: &str = "SecurePass1";

/// Delegates to the real registry but refuses every upsert.
struct FailingUpserts(PeerRepository);

#[async_trait]
impl PeerStore for FailingUpserts {
	async fn get_active(
		&self,
		user_id: Uuid,
		server_id: Uuid,
	) -> Result<Option<PeerRowTuple>, DbError> {
		self.0.get_active(user_id, server_id).await
	}

	async fn count_active_for_server(&self, server_id: Uuid) -> Result<i64, DbError> {
		self.0.count_active_for_server(server_id).await
	}

	async fn list_active_addresses(
		&self,
		server_id: Uuid,
	) -> Result<Vec<ActiveAddressRow>, DbError> {
		self.0.list_active_addresses(server_id).await
	}

	async fn find_active_by_public_key(
		&self,
		public_key: &str,
	) -> Result<Option<PeerRowTuple>, DbError> {
		self.0.find_active_by_public_key(public_key).await
	}

	async fn upsert(
		&self,
		_user_id: Uuid,
		_server_id: Uuid,
		_public_key: &str,
		_allowed_ips: &str,
	) -> Result<PeerRowTuple, DbError> {
		Err(DbError::Internal("registry offline".to_string()))
	}

	async fn deactivate(&self, user_id: Uuid, server_id: Uuid) -> Result<bool, DbError> {
		self.0.deactivate(user_id, server_id).await
	}
}

struct TestApp {
	app: Router,
	pool: SqlitePool,
	device: Arc<RecordingDevice>,
	server_id: Uuid,
}

fn jwt() -> JwtManager {
	JwtManager::new(
		&SecretString::new("integration-test-secret-of-32-bytes!".to_string()),
		"vpn-service",
		Duration::from_secs(3600),
	)
}

fn client_key() -> WgPublicKey {
	*WgKeyPair::generate().unwrap().public_key()
}

async fn setup_app() -> TestApp {
	setup_with(|pool| Arc::new(PeerRepository::new(pool))).await
}

async fn setup_with(peers: impl FnOnce(SqlitePool) -> Arc<dyn PeerStore>) -> TestApp {
	let pool = create_test_pool().await.unwrap();
	let server_key = client_key().to_base64();
	let server_id = seed_server(&pool, &server_key).await.unwrap();
	let device = Arc::new(RecordingDevice::new());

	let wg = WgTunnelServices::with_stores(
		peers(pool.clone()),
		Arc::new(ServerRepository::new(pool.clone())),
		device.clone(),
	);
	let state = AppState::new(pool.clone(), jwt(), wg);

	TestApp {
		app: create_router(state),
		pool,
		device,
		server_id,
	}
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let body = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	let json = if body.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&body).unwrap()
	};
	(status, json)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
	let mut builder = Request::builder()
		.method(method)
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/json");
	if let Some(token) = token {
		builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
	}
	builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
	let mut builder = Request::builder().method(method).uri(uri);
	if let Some(token) = token {
		builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
	}
	builder.body(Body::empty()).unwrap()
}

async fn register(app: &Router, email: &str) -> String {
	let (status, body) = send(
		app,
		json_request(
			Method::POST,
			"/api/users/register",
			None,
			json!({ "email": email, "password": PASSWORD }),
		),
	)
	.await;
	assert_eq!(status, StatusCode::CREATED, "{body}");
	body["data"]["token"].as_str().unwrap().to_string()
}

async fn request_config(
	app: &Router,
	token: &str,
	server_id: &str,
	public_key: &str,
) -> (StatusCode, Value) {
	send(
		app,
		json_request(
			Method::POST,
			"/api/client/config",
			Some(token),
			json!({ "public_key": public_key, "server_id": server_id }),
		),
	)
	.await
}

#[tokio::test]
async fn register_login_and_fetch_config() {
	let t = setup_app().await;
	register(&t.app, "a@example.com").await;

	let (status, body) = send(
		&t.app,
		json_request(
			Method::POST,
			"/api/users/login",
			None,
			json!({ "email": "A@Example.com ", "password": PASSWORD }),
		),
	)
	.await;
	assert_eq!(status, StatusCode::OK, "{body}");
	assert_eq!(body["success"], true);
	assert_eq!(body["data"]["user"]["email"], "a@example.com");
	let token = body["data"]["token"].as_str().unwrap().to_string();

	let key = client_key();
	let (status, body) =
		request_config(&t.app, &token, &t.server_id.to_string(), &key.to_base64()).await;
	assert_eq!(status, StatusCode::OK, "{body}");

	let config = body["data"]["config"].as_str().unwrap();
	assert!(config.contains("Endpoint = vpn.example.com:51820"), "{config}");
	assert!(config.contains("PrivateKey = [CLIENT_PRIVATE_KEY]"));

	let address = body["data"]["interface"]["address"].as_str().unwrap();
	let host: u8 = address
		.strip_prefix("10.0.0.")
		.and_then(|rest| rest.strip_suffix("/32"))
		.and_then(|h| h.parse().ok())
		.unwrap_or_else(|| panic!("unexpected address {address}"));
	assert!((2..=254).contains(&host));
	assert_eq!(body["data"]["peer"]["persistent_keepalive"], 25);
	assert_eq!(body["data"]["server"]["port"], 51820);

	assert_eq!(t.device.peer_count(), 1);
	assert!(t.device.address_of(&key).is_some());
}

#[tokio::test]
async fn get_with_body_is_accepted() {
	let t = setup_app().await;
	let token = register(&t.app, "get@example.com").await;

	let (status, body) = send(
		&t.app,
		json_request(
			Method::GET,
			"/api/client/config",
			Some(&token),
			json!({ "public_key": client_key().to_base64(), "server_id": t.server_id.to_string() }),
		),
	)
	.await;
	assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
	let t = setup_app().await;
	register(&t.app, "dup@example.com").await;

	let (status, body) = send(
		&t.app,
		json_request(
			Method::POST,
			"/api/users/register",
			None,
			json!({ "email": "DUP@example.com", "password": PASSWORD }),
		),
	)
	.await;
	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(body["error"], true);
}

#[tokio::test]
async fn weak_password_is_rejected() {
	let t = setup_app().await;
	let (status, body) = send(
		&t.app,
		json_request(
			Method::POST,
			"/api/users/register",
			None,
			json!({ "email": "weak@example.com", "password": "password" }),
		),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["message"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
	let t = setup_app().await;
	let request = Request::builder()
		.method(Method::POST)
		.uri("/api/users/login")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from("{not json"))
		.unwrap();
	let (status, body) = send(&t.app, request).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], true);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
	let t = setup_app().await;
	register(&t.app, "b@example.com").await;

	for (email, password) in [("b@example.com", "WrongPass1"), ("nobody@example.com", PASSWORD)] {
		let (status, body) = send(
			&t.app,
			json_request(
				Method::POST,
				"/api/users/login",
				None,
				json!({ "email": email, "password": password }),
			),
		)
		.await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["message"], "Invalid credentials");
	}
}

#[tokio::test]
async fn protected_routes_require_a_token() {
	let t = setup_app().await;

	let (status, _) = send(&t.app, empty_request(Method::GET, "/api/servers/locations", None)).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let (status, _) = send(
		&t.app,
		empty_request(Method::GET, "/api/servers/locations", Some("not-a-token")),
	)
	.await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let (status, _) = request_config(&t.app, "", &t.server_id.to_string(), &client_key().to_base64()).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(t.device.peer_count(), 0);
}

#[tokio::test]
async fn lists_server_locations_without_private_keys() {
	let t = setup_app().await;
	let token = register(&t.app, "list@example.com").await;

	let (status, body) = send(
		&t.app,
		empty_request(Method::GET, "/api/servers/locations", Some(&token)),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	let servers = body["data"].as_array().unwrap();
	assert_eq!(servers.len(), 1);
	assert_eq!(servers[0]["id"], t.server_id.to_string());
	assert!(servers[0].get("private_key").is_none());
}

#[tokio::test]
async fn config_input_errors() {
	let t = setup_app().await;
	let token = register(&t.app, "input@example.com").await;
	let key = client_key().to_base64();

	let (status, body) = request_config(&t.app, &token, "server-1", &key).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "Invalid server ID");

	let (status, _) = request_config(&t.app, &token, &Uuid::new_v4().to_string(), &key).await;
	assert_eq!(status, StatusCode::NOT_FOUND);

	let (status, _) = request_config(&t.app, &token, &t.server_id.to_string(), "c2hvcnQ=").await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _) = request_config(&t.app, &token, &t.server_id.to_string(), "").await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	assert_eq!(t.device.peer_count(), 0);
}

#[tokio::test]
async fn reauthorizing_keeps_one_peer() {
	let t = setup_app().await;
	let token = register(&t.app, "again@example.com").await;
	let key = client_key().to_base64();

	for _ in 0..2 {
		let (status, _) = request_config(&t.app, &token, &t.server_id.to_string(), &key).await;
		assert_eq!(status, StatusCode::OK);
	}
	assert_eq!(t.device.peer_count(), 1);

	let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_keys WHERE is_active = 1")
		.fetch_one(&t.pool)
		.await
		.unwrap();
	assert_eq!(count, 1);
}

#[tokio::test]
async fn distinct_users_get_distinct_addresses() {
	let t = setup_app().await;
	let mut addresses = Vec::new();
	for email in ["one@example.com", "two@example.com", "three@example.com"] {
		let token = register(&t.app, email).await;
		let (status, body) = request_config(
			&t.app,
			&token,
			&t.server_id.to_string(),
			&client_key().to_base64(),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		addresses.push(body["data"]["interface"]["address"].as_str().unwrap().to_string());
	}
	assert_eq!(addresses, ["10.0.0.2/32", "10.0.0.3/32", "10.0.0.4/32"]);
}

#[tokio::test]
async fn key_claimed_by_another_account_conflicts() {
	let t = setup_app().await;
	let owner = register(&t.app, "owner@example.com").await;
	let other = register(&t.app, "other@example.com").await;
	let key = client_key();
	let server_id = t.server_id.to_string();

	let (status, _) = request_config(&t.app, &owner, &server_id, &key.to_base64()).await;
	assert_eq!(status, StatusCode::OK);
	let owner_address = t.device.address_of(&key);

	let (status, body) = request_config(&t.app, &other, &server_id, &key.to_base64()).await;
	assert_eq!(status, StatusCode::CONFLICT, "{body}");
	assert_eq!(body["error"], true);
	assert_eq!(body["message"], "Public key is already in use");

	let uri = format!("/api/client/config/{server_id}");
	let (status, _) = send(&t.app, empty_request(Method::DELETE, &uri, Some(&other))).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(t.device.address_of(&key), owner_address);
	assert_eq!(t.device.peer_count(), 1);
}

#[tokio::test]
async fn revoke_removes_peer_then_reports_not_found() {
	let t = setup_app().await;
	let token = register(&t.app, "revoke@example.com").await;
	let (status, _) = request_config(
		&t.app,
		&token,
		&t.server_id.to_string(),
		&client_key().to_base64(),
	)
	.await;
	assert_eq!(status, StatusCode::OK);

	let uri = format!("/api/client/config/{}", t.server_id);
	let (status, body) = send(&t.app, empty_request(Method::DELETE, &uri, Some(&token))).await;
	assert_eq!(status, StatusCode::OK, "{body}");
	assert_eq!(body["data"]["revoked"], true);
	assert_eq!(t.device.peer_count(), 0);

	t.device.set_unavailable(true);
	let (status, _) = send(&t.app, empty_request(Method::DELETE, &uri, Some(&token))).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn device_failure_is_bad_gateway() {
	let t = setup_app().await;
	let token = register(&t.app, "gateway@example.com").await;
	t.device.fail_authorize(true);

	let (status, body) = request_config(
		&t.app,
		&token,
		&t.server_id.to_string(),
		&client_key().to_base64(),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_GATEWAY);
	assert_eq!(body["message"], "VPN device unavailable");
}

#[tokio::test]
async fn failed_registry_write_rolls_back_device() {
	let t = setup_with(|pool| Arc::new(FailingUpserts(PeerRepository::new(pool)))).await;
	let token = register(&t.app, "rollback@example.com").await;
	let key = client_key();

	let (status, body) =
		request_config(&t.app, &token, &t.server_id.to_string(), &key.to_base64()).await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["message"], "Internal server error");
	assert_eq!(t.device.peer_count(), 0);
	assert!(t.device.address_of(&key).is_none());
}

#[tokio::test]
async fn health_reports_components() {
	let t = setup_app().await;

	let (status, body) = send(&t.app, empty_request(Method::GET, "/api/health", None)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "healthy");
	assert_eq!(body["service"], "vpn-api");
	assert_eq!(body["components"]["database"]["status"], "healthy");
	assert_eq!(body["components"]["device"]["peers"], 0);

	t.device.set_unavailable(true);
	let (status, body) = send(&t.app, empty_request(Method::GET, "/api/health", None)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "degraded");

	t.pool.close().await;
	let (status, body) = send(&t.app, empty_request(Method::GET, "/api/health", None)).await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn responses_carry_security_headers() {
	let t = setup_app().await;
	let response = t
		.app
		.clone()
		.oneshot(empty_request(Method::GET, "/api/health", None))
		.await
		.unwrap();
	let headers = response.headers();
	assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
	assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
	assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
	assert!(headers.contains_key(header::REFERRER_POLICY));
}
