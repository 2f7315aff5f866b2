// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::api::AppState;
use crate::health::{self, HealthComponents, HealthResponse, HealthStatus};

pub const SERVICE_NAME: &str = "vpn-api";

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let overall_start = tokio::time::Instant::now();

	let (database, device) = tokio::join!(
		health::check_database(&state.pool),
		health::check_device(&state.wg.authorizations),
	);

	let components = HealthComponents { database, device };
	let status = health::aggregate_status(&components);

	let response = HealthResponse {
		status,
		service: SERVICE_NAME.to_string(),
		timestamp: chrono::Utc::now().to_rfc3339(),
		duration_ms: overall_start.elapsed().as_millis() as u64,
		components,
	};

	let http_status = match status {
		HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};

	(http_status, Json(response))
}
