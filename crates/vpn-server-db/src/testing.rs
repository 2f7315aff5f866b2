// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory databases and row seeding for tests in this and downstream crates.

use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use uuid::Uuid;
use vpn_server_auth::{User, UserId};

use crate::error::DbError;
use crate::migrations::run_migrations;
use crate::server::{CreateServerParams, ServerRepository};
use crate::user::UserRepository;

/// A single-connection in-memory database with the full schema applied.
pub async fn create_test_pool() -> Result<SqlitePool, DbError> {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect("sqlite::memory:")
		.await?;
	run_migrations(&pool).await?;
	Ok(pool)
}

/// Insert an active user with a placeholder password hash.
pub async fn seed_user(pool: &SqlitePool, email: &str) -> Result<Uuid, DbError> {
	let now = Utc::now();
	let user = User {
		id: UserId::generate(),
		email: email.to_string(),
		password_hash: "not-a-real-hash".to_string(),
		created_at: now,
		updated_at: now,
		is_active: true,
	};
	UserRepository::new(pool.clone()).create_user(&user).await?;
	Ok(user.id.into_inner())
}

/// Insert an active server without a stored private key.
pub async fn seed_server(pool: &SqlitePool, public_key: &str) -> Result<Uuid, DbError> {
	let id = Uuid::new_v4();
	ServerRepository::new(pool.clone())
		.create_server(&CreateServerParams {
			id,
			name: "test",
			location: "Test",
			endpoint: "vpn.example.com",
			port: 51820,
			public_key,
			private_key: None,
		})
		.await?;
	Ok(id)
}
