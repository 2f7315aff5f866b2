// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User repository for database operations.
//!
//! Emails are stored exactly as given; callers sanitize (trim, lower-case)
//! before insert and lookup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;
use vpn_server_auth::{User, UserId};

use crate::error::{conflict_on_unique, DbError};

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn create_user(&self, user: &User) -> Result<(), DbError>;
	async fn get_active_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
	async fn get_active_user_by_id(&self, id: &UserId) -> Result<Option<User>, DbError>;
	async fn email_exists(&self, email: &str) -> Result<bool, DbError>;
}

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a new user.
	///
	/// # Errors
	/// Returns `DbError::Conflict` when the email is already registered.
	#[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
	pub async fn create_user(&self, user: &User) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO users (id, email, password_hash, created_at, updated_at, is_active)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.email)
		.bind(&user.password_hash)
		.bind(user.created_at.to_rfc3339())
		.bind(user.updated_at.to_rfc3339())
		.bind(user.is_active as i32)
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, "email already registered"))?;

		tracing::debug!(user_id = %user.id, "user created");
		Ok(())
	}

	#[tracing::instrument(skip(self, email))]
	pub async fn get_active_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, email, password_hash, created_at, updated_at, is_active
			FROM users
			WHERE email = ? AND is_active = 1
			"#,
		)
		.bind(email)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_user(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_active_user_by_id(&self, id: &UserId) -> Result<Option<User>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, email, password_hash, created_at, updated_at, is_active
			FROM users
			WHERE id = ? AND is_active = 1
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_user(&r)).transpose()
	}

	/// True if any user, active or not, holds this email.
	#[tracing::instrument(skip(self, email))]
	pub async fn email_exists(&self, email: &str) -> Result<bool, DbError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
			.bind(email)
			.fetch_one(&self.pool)
			.await?;
		Ok(count > 0)
	}
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {field}: {e}")))
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, DbError> {
	let id_str: String = row.get("id");
	let id =
		Uuid::parse_str(&id_str).map_err(|e| DbError::Internal(format!("Invalid user ID: {e}")))?;

	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let is_active: i32 = row.get("is_active");

	Ok(User {
		id: UserId::new(id),
		email: row.get("email"),
		password_hash: row.get("password_hash"),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
		is_active: is_active != 0,
	})
}

#[async_trait]
impl UserStore for UserRepository {
	async fn create_user(&self, user: &User) -> Result<(), DbError> {
		self.create_user(user).await
	}

	async fn get_active_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
		self.get_active_user_by_email(email).await
	}

	async fn get_active_user_by_id(&self, id: &UserId) -> Result<Option<User>, DbError> {
		self.get_active_user_by_id(id).await
	}

	async fn email_exists(&self, email: &str) -> Result<bool, DbError> {
		self.email_exists(email).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	fn make_user(email: &str) -> User {
		let now = Utc::now();
		User {
			id: UserId::generate(),
			email: email.to_string(),
			password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
			created_at: now,
			updated_at: now,
			is_active: true,
		}
	}

	#[tokio::test]
	async fn create_and_fetch_user() {
		let repo = UserRepository::new(create_test_pool().await.unwrap());
		let user = make_user("a@example.com");
		repo.create_user(&user).await.unwrap();

		let by_email = repo
			.get_active_user_by_email("a@example.com")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(by_email.id, user.id);
		assert_eq!(by_email.password_hash, user.password_hash);

		let by_id = repo.get_active_user_by_id(&user.id).await.unwrap().unwrap();
		assert_eq!(by_id.email, "a@example.com");
		assert!(repo.email_exists("a@example.com").await.unwrap());
		assert!(!repo.email_exists("b@example.com").await.unwrap());
	}

	#[tokio::test]
	async fn duplicate_email_is_conflict() {
		let repo = UserRepository::new(create_test_pool().await.unwrap());
		repo.create_user(&make_user("dup@example.com")).await.unwrap();

		let err = repo
			.create_user(&make_user("dup@example.com"))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn inactive_users_are_invisible_to_lookups() {
		let repo = UserRepository::new(create_test_pool().await.unwrap());
		let mut user = make_user("gone@example.com");
		user.is_active = false;
		repo.create_user(&user).await.unwrap();

		assert!(repo
			.get_active_user_by_email("gone@example.com")
			.await
			.unwrap()
			.is_none());
		assert!(repo.get_active_user_by_id(&user.id).await.unwrap().is_none());
		assert!(repo.email_exists("gone@example.com").await.unwrap());
	}
}
