// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Turn a unique-constraint violation into [`DbError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> DbError {
	match &e {
		sqlx::Error::Database(db) if db.is_unique_violation() => {
			DbError::Conflict(format!("{what}: {}", db.message()))
		}
		_ => DbError::Sqlx(e),
	}
}
