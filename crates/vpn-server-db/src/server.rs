// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exit-server directory persistence.
//!
//! Rows are returned as tuples; the tunnel service converts them into its
//! domain type. `private_key` is only set for servers whose key pair this
//! system generated and is never selected by the listing queries.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::error::{conflict_on_unique, DbError};

/// `(id, name, location, endpoint, port, public_key, is_active, created_at, updated_at)`
pub type ServerRowTuple = (String, String, String, String, i64, String, i64, String, String);

pub struct CreateServerParams<'a> {
	pub id: Uuid,
	pub name: &'a str,
	pub location: &'a str,
	pub endpoint: &'a str,
	pub port: u16,
	pub public_key: &'a str,
	pub private_key: Option<&'a str>,
}

const SERVER_COLUMNS: &str =
	"id, name, location, endpoint, port, public_key, is_active, created_at, updated_at";

#[async_trait]
pub trait ServerStore: Send + Sync {
	async fn create_server(&self, params: &CreateServerParams<'_>) -> Result<(), DbError>;
	async fn get_server(&self, id: Uuid) -> Result<Option<ServerRowTuple>, DbError>;
	async fn get_active_server(&self, id: Uuid) -> Result<Option<ServerRowTuple>, DbError>;
	async fn list_active_servers(&self) -> Result<Vec<ServerRowTuple>, DbError>;
	async fn has_private_key(&self, id: Uuid) -> Result<bool, DbError>;
	async fn update_public_key_if_changed(&self, id: Uuid, public_key: &str)
		-> Result<u64, DbError>;
}

#[derive(Clone)]
pub struct ServerRepository {
	pool: SqlitePool,
}

impl ServerRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, params), fields(server_id = %params.id, name = %params.name))]
	pub async fn create_server(&self, params: &CreateServerParams<'_>) -> Result<(), DbError> {
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			r#"
			INSERT INTO servers (
				id, name, location, endpoint, port, public_key, private_key,
				is_active, created_at, updated_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
			"#,
		)
		.bind(params.id.to_string())
		.bind(params.name)
		.bind(params.location)
		.bind(params.endpoint)
		.bind(params.port as i64)
		.bind(params.public_key)
		.bind(params.private_key)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, "server already exists"))?;

		tracing::debug!(server_id = %params.id, "server created");
		Ok(())
	}

	/// Fetch a server regardless of its active flag.
	#[tracing::instrument(skip(self), fields(server_id = %id))]
	pub async fn get_server(&self, id: Uuid) -> Result<Option<ServerRowTuple>, DbError> {
		let row: Option<ServerRowTuple> =
			sqlx::query_as(&format!("SELECT {SERVER_COLUMNS} FROM servers WHERE id = ?"))
				.bind(id.to_string())
				.fetch_optional(&self.pool)
				.await?;
		Ok(row)
	}

	#[tracing::instrument(skip(self), fields(server_id = %id))]
	pub async fn get_active_server(&self, id: Uuid) -> Result<Option<ServerRowTuple>, DbError> {
		let row: Option<ServerRowTuple> = sqlx::query_as(&format!(
			"SELECT {SERVER_COLUMNS} FROM servers WHERE id = ? AND is_active = 1"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_active_servers(&self) -> Result<Vec<ServerRowTuple>, DbError> {
		let rows: Vec<ServerRowTuple> = sqlx::query_as(&format!(
			"SELECT {SERVER_COLUMNS} FROM servers WHERE is_active = 1 ORDER BY location, name"
		))
		.fetch_all(&self.pool)
		.await?;
		Ok(rows)
	}

	#[tracing::instrument(skip(self), fields(server_id = %id))]
	pub async fn has_private_key(&self, id: Uuid) -> Result<bool, DbError> {
		let count: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM servers WHERE id = ? AND private_key IS NOT NULL",
		)
		.bind(id.to_string())
		.fetch_one(&self.pool)
		.await?;
		Ok(count > 0)
	}

	/// Replace the stored public key only when it differs.
	///
	/// A replaced key invalidates any stored private key, which is cleared in
	/// the same statement. Returns the number of rows changed (0 or 1).
	#[tracing::instrument(skip(self, public_key), fields(server_id = %id))]
	pub async fn update_public_key_if_changed(
		&self,
		id: Uuid,
		public_key: &str,
	) -> Result<u64, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE servers
			SET public_key = ?, private_key = NULL, updated_at = ?
			WHERE id = ? AND (public_key IS NULL OR public_key <> ?)
			"#,
		)
		.bind(public_key)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.bind(public_key)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}
}

#[async_trait]
impl ServerStore for ServerRepository {
	async fn create_server(&self, params: &CreateServerParams<'_>) -> Result<(), DbError> {
		self.create_server(params).await
	}

	async fn get_server(&self, id: Uuid) -> Result<Option<ServerRowTuple>, DbError> {
		self.get_server(id).await
	}

	async fn get_active_server(&self, id: Uuid) -> Result<Option<ServerRowTuple>, DbError> {
		self.get_active_server(id).await
	}

	async fn list_active_servers(&self) -> Result<Vec<ServerRowTuple>, DbError> {
		self.list_active_servers().await
	}

	async fn has_private_key(&self, id: Uuid) -> Result<bool, DbError> {
		self.has_private_key(id).await
	}

	async fn update_public_key_if_changed(
		&self,
		id: Uuid,
		public_key: &str,
	) -> Result<u64, DbError> {
		self.update_public_key_if_changed(id, public_key).await
	}
}
