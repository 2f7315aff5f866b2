// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Component health checks.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::time::Instant;
use vpn_server_wgtunnel::PeerAuthorizationService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
	pub status: HealthStatus,
	pub latency_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceHealth {
	pub status: HealthStatus,
	pub latency_ms: u64,
	pub interface: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub peers: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthComponents {
	pub database: ComponentHealth,
	pub device: DeviceHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub service: String,
	pub timestamp: String,
	pub duration_ms: u64,
	pub components: HealthComponents,
}

pub async fn check_database(pool: &SqlitePool) -> ComponentHealth {
	let start = Instant::now();
	match vpn_server_db::ping(pool).await {
		Ok(()) => ComponentHealth {
			status: HealthStatus::Healthy,
			latency_ms: start.elapsed().as_millis() as u64,
			message: None,
		},
		Err(e) => {
			tracing::warn!(error = %e, "database health check failed");
			ComponentHealth {
				status: HealthStatus::Unhealthy,
				latency_ms: start.elapsed().as_millis() as u64,
				message: Some("database unreachable".to_string()),
			}
		}
	}
}

pub async fn check_device(authorizations: &PeerAuthorizationService) -> DeviceHealth {
	let start = Instant::now();
	let interface = authorizations.device().interface().to_string();
	match authorizations.list_authorized_peers().await {
		Ok(peers) => DeviceHealth {
			status: HealthStatus::Healthy,
			latency_ms: start.elapsed().as_millis() as u64,
			interface,
			peers: Some(peers.len()),
			message: None,
		},
		Err(e) => {
			tracing::warn!(error = %e, "device health check failed");
			DeviceHealth {
				status: HealthStatus::Degraded,
				latency_ms: start.elapsed().as_millis() as u64,
				interface,
				peers: None,
				message: Some("device unavailable".to_string()),
			}
		}
	}
}

/// The database is required; a missing device only degrades service.
pub fn aggregate_status(components: &HealthComponents) -> HealthStatus {
	if components.database.status == HealthStatus::Unhealthy {
		HealthStatus::Unhealthy
	} else if components.device.status != HealthStatus::Healthy {
		HealthStatus::Degraded
	} else {
		HealthStatus::Healthy
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn component(status: HealthStatus) -> ComponentHealth {
		ComponentHealth {
			status,
			latency_ms: 0,
			message: None,
		}
	}

	fn device(status: HealthStatus) -> DeviceHealth {
		DeviceHealth {
			status,
			latency_ms: 0,
			interface: "wg0".to_string(),
			peers: None,
			message: None,
		}
	}

	#[test]
	fn database_failure_is_unhealthy() {
		let components = HealthComponents {
			database: component(HealthStatus::Unhealthy),
			device: device(HealthStatus::Healthy),
		};
		assert_eq!(aggregate_status(&components), HealthStatus::Unhealthy);
	}

	#[test]
	fn device_failure_is_degraded() {
		let components = HealthComponents {
			database: component(HealthStatus::Healthy),
			device: device(HealthStatus::Degraded),
		};
		assert_eq!(aggregate_status(&components), HealthStatus::Degraded);
	}

	#[test]
	fn status_serializes_lowercase() {
		let json = serde_json::to_string(&HealthStatus::Degraded).unwrap();
		assert_eq!(json, "\"degraded\"");
	}

	#[tokio::test]
	async fn closed_pool_reports_unhealthy() {
		let pool = vpn_server_db::testing::create_test_pool().await.unwrap();
		pool.close().await;
		let health = check_database(&pool).await;
		assert_eq!(health.status, HealthStatus::Unhealthy);
	}
}
