// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer registry persistence (`user_keys`).
//!
//! At most one row exists per (user, server); re-authorization overwrites it
//! and flips it back to active. Two partial unique indexes over active rows
//! surface as [`DbError::Conflict`]: `(server_id, allowed_ips)` rejects two
//! peers on the same tunnel address, and `public_key` rejects one key held by
//! two authorizations on any server.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::error::{conflict_on_unique, DbError};

/// `(id, user_id, server_id, public_key, allowed_ips, created_at, updated_at, is_active)`
pub type PeerRowTuple = (String, String, String, String, String, String, String, i64);

/// `(user_id, allowed_ips)` of an active authorization.
pub type ActiveAddressRow = (String, String);

const PEER_COLUMNS: &str =
	"id, user_id, server_id, public_key, allowed_ips, created_at, updated_at, is_active";

#[async_trait]
pub trait PeerStore: Send + Sync {
	async fn get_active(&self, user_id: Uuid, server_id: Uuid)
		-> Result<Option<PeerRowTuple>, DbError>;
	async fn count_active_for_server(&self, server_id: Uuid) -> Result<i64, DbError>;
	async fn list_active_addresses(&self, server_id: Uuid) -> Result<Vec<ActiveAddressRow>, DbError>;
	/// The active authorization holding `public_key` on any server.
	async fn find_active_by_public_key(
		&self,
		public_key: &str,
	) -> Result<Option<PeerRowTuple>, DbError>;
	async fn upsert(
		&self,
		user_id: Uuid,
		server_id: Uuid,
		public_key: &str,
		allowed_ips: &str,
	) -> Result<PeerRowTuple, DbError>;
	async fn deactivate(&self, user_id: Uuid, server_id: Uuid) -> Result<bool, DbError>;
}

#[derive(Clone)]
pub struct PeerRepository {
	pool: SqlitePool,
}

impl PeerRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(%user_id, %server_id))]
	pub async fn get_active(
		&self,
		user_id: Uuid,
		server_id: Uuid,
	) -> Result<Option<PeerRowTuple>, DbError> {
		let row: Option<PeerRowTuple> = sqlx::query_as(&format!(
			"SELECT {PEER_COLUMNS} FROM user_keys
			 WHERE user_id = ? AND server_id = ? AND is_active = 1"
		))
		.bind(user_id.to_string())
		.bind(server_id.to_string())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row)
	}

	#[tracing::instrument(skip(self), fields(%server_id))]
	pub async fn count_active_for_server(&self, server_id: Uuid) -> Result<i64, DbError> {
		let count: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM user_keys WHERE server_id = ? AND is_active = 1",
		)
		.bind(server_id.to_string())
		.fetch_one(&self.pool)
		.await?;
		Ok(count)
	}

	#[tracing::instrument(skip(self), fields(%server_id))]
	pub async fn list_active_addresses(
		&self,
		server_id: Uuid,
	) -> Result<Vec<ActiveAddressRow>, DbError> {
		let rows: Vec<ActiveAddressRow> = sqlx::query_as(
			"SELECT user_id, allowed_ips FROM user_keys WHERE server_id = ? AND is_active = 1",
		)
		.bind(server_id.to_string())
		.fetch_all(&self.pool)
		.await?;
		Ok(rows)
	}

	#[tracing::instrument(skip(self, public_key))]
	pub async fn find_active_by_public_key(
		&self,
		public_key: &str,
	) -> Result<Option<PeerRowTuple>, DbError> {
		let row: Option<PeerRowTuple> = sqlx::query_as(&format!(
			"SELECT {PEER_COLUMNS} FROM user_keys WHERE public_key = ? AND is_active = 1"
		))
		.bind(public_key)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row)
	}

	/// Insert or overwrite the (user, server) authorization and mark it active.
	///
	/// # Errors
	/// `DbError::Conflict` when another active peer already holds `allowed_ips`
	/// or `public_key`.
	#[tracing::instrument(skip(self, public_key), fields(%user_id, %server_id, %allowed_ips))]
	pub async fn upsert(
		&self,
		user_id: Uuid,
		server_id: Uuid,
		public_key: &str,
		allowed_ips: &str,
	) -> Result<PeerRowTuple, DbError> {
		let now = Utc::now().to_rfc3339();
		let row: PeerRowTuple = sqlx::query_as(&format!(
			r#"
			INSERT INTO user_keys (
				id, user_id, server_id, public_key, allowed_ips, created_at, updated_at, is_active
			) VALUES (?, ?, ?, ?, ?, ?, ?, 1)
			ON CONFLICT (user_id, server_id) DO UPDATE SET
				public_key = excluded.public_key,
				allowed_ips = excluded.allowed_ips,
				updated_at = excluded.updated_at,
				is_active = 1
			RETURNING {PEER_COLUMNS}
			"#
		))
		.bind(Uuid::new_v4().to_string())
		.bind(user_id.to_string())
		.bind(server_id.to_string())
		.bind(public_key)
		.bind(allowed_ips)
		.bind(&now)
		.bind(&now)
		.fetch_one(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, "tunnel address or public key already in use"))?;

		tracing::debug!("peer authorization stored");
		Ok(row)
	}

	/// Soft-deactivate the (user, server) authorization. Returns false if none was active.
	#[tracing::instrument(skip(self), fields(%user_id, %server_id))]
	pub async fn deactivate(&self, user_id: Uuid, server_id: Uuid) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE user_keys SET is_active = 0, updated_at = ?
			WHERE user_id = ? AND server_id = ? AND is_active = 1
			"#,
		)
		.bind(Utc::now().to_rfc3339())
		.bind(user_id.to_string())
		.bind(server_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl PeerStore for PeerRepository {
	async fn get_active(
		&self,
		user_id: Uuid,
		server_id: Uuid,
	) -> Result<Option<PeerRowTuple>, DbError> {
		self.get_active(user_id, server_id).await
	}

	async fn count_active_for_server(&self, server_id: Uuid) -> Result<i64, DbError> {
		self.count_active_for_server(server_id).await
	}

	async fn list_active_addresses(&self, server_id: Uuid) -> Result<Vec<ActiveAddressRow>, DbError> {
		self.list_active_addresses(server_id).await
	}

	async fn find_active_by_public_key(
		&self,
		public_key: &str,
	) -> Result<Option<PeerRowTuple>, DbError> {
		self.find_active_by_public_key(public_key).await
	}

	async fn upsert(
		&self,
		user_id: Uuid,
		server_id: Uuid,
		public_key: &str,
		allowed_ips: &str,
	) -> Result<PeerRowTuple, DbError> {
		self.upsert(user_id, server_id, public_key, allowed_ips).await
	}

	async fn deactivate(&self, user_id: Uuid, server_id: Uuid) -> Result<bool, DbError> {
		self.deactivate(user_id, server_id).await
	}
}
