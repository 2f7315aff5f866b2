// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::{Result, WgError};
use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vpn_server_db::{PeerRowTuple, ServerRowTuple};
use vpn_wgtunnel_common::WgPublicKey;

/// An exit server as seen by the rest of the system. The private key never
/// leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
	pub id: Uuid,
	pub name: String,
	pub location: String,
	pub endpoint: String,
	pub port: u16,
	pub public_key: String,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerResponse {
	pub id: Uuid,
	pub name: String,
	pub location: String,
	pub endpoint: String,
	pub port: u16,
	pub public_key: String,
	pub is_active: bool,
}

impl From<&Server> for ServerResponse {
	fn from(server: &Server) -> Self {
		Self {
			id: server.id,
			name: server.name.clone(),
			location: server.location.clone(),
			endpoint: server.endpoint.clone(),
			port: server.port,
			public_key: server.public_key.clone(),
			is_active: server.is_active,
		}
	}
}

/// Input for provisioning a server. Without a public key a key pair is
/// generated and the private half stored alongside.
#[derive(Debug, Clone)]
pub struct NewServer {
	pub id: Option<Uuid>,
	pub name: String,
	pub location: String,
	pub endpoint: String,
	pub port: u16,
	pub public_key: Option<String>,
}

/// The server whose tunnel device this instance drives.
#[derive(Debug, Clone)]
pub struct ManagedServer {
	pub id: Uuid,
	pub name: String,
	pub location: String,
	pub endpoint: String,
	pub port: u16,
}

/// One active (or formerly active) client key on a server.
#[derive(Debug, Clone, Serialize)]
pub struct PeerAuthorization {
	pub id: Uuid,
	pub user_id: Uuid,
	pub server_id: Uuid,
	pub public_key: WgPublicKey,
	pub address: Ipv4Net,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub is_active: bool,
}

impl TryFrom<ServerRowTuple> for Server {
	type Error = WgError;

	fn try_from(row: ServerRowTuple) -> Result<Self> {
		let (id, name, location, endpoint, port, public_key, is_active, created_at, updated_at) = row;
		Ok(Server {
			id: parse_uuid(&id, "server id")?,
			name,
			location,
			endpoint,
			port: u16::try_from(port)
				.map_err(|_| WgError::Internal(format!("invalid server port: {port}")))?,
			public_key,
			is_active: is_active != 0,
			created_at: parse_datetime(&created_at)?,
			updated_at: parse_datetime(&updated_at)?,
		})
	}
}

impl TryFrom<PeerRowTuple> for PeerAuthorization {
	type Error = WgError;

	fn try_from(row: PeerRowTuple) -> Result<Self> {
		let (id, user_id, server_id, public_key, allowed_ips, created_at, updated_at, is_active) = row;
		Ok(PeerAuthorization {
			id: parse_uuid(&id, "authorization id")?,
			user_id: parse_uuid(&user_id, "user id")?,
			server_id: parse_uuid(&server_id, "server id")?,
			public_key: WgPublicKey::from_base64(&public_key)
				.map_err(|e| WgError::Internal(format!("stored public key is invalid: {e}")))?,
			address: allowed_ips
				.parse()
				.map_err(|_| WgError::Internal(format!("invalid stored address: {allowed_ips}")))?,
			created_at: parse_datetime(&created_at)?,
			updated_at: parse_datetime(&updated_at)?,
			is_active: is_active != 0,
		})
	}
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid> {
	s.parse()
		.map_err(|_| WgError::Internal(format!("invalid {what}: {s}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(s)
		.map(|dt| dt.with_timezone(&Utc))
		.or_else(|_| {
			chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
				.map(|ndt| ndt.and_utc())
				.map_err(|_| WgError::Internal(format!("invalid datetime: {s}")))
		})
}
