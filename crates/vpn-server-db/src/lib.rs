// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # vpn-server-db
//!
//! Persistence for the VPN backend using SQLite via sqlx.
//!
//! ## Repository Pattern
//!
//! Each record type has two components:
//! - **`*Store` trait**: the interface services depend on (`UserStore`,
//!   `ServerStore`, `PeerStore`)
//! - **`*Repository` struct**: the SQLite implementation holding a `SqlitePool`
//!
//! Services hold `Arc<dyn *Store>` so tests can substitute failing or
//! recording stores.
//!
//! ## Error Handling
//!
//! | Variant | When |
//! |---------|------|
//! | `Conflict` | Unique constraint violation (duplicate email, address in use) |
//! | `Sqlx` | Unexpected database errors, propagated via `?` |
//! | `Internal` | Invalid stored data or connection settings |
//!
//! Lookups where absence is normal return `Result<Option<T>>`.

mod error;
pub mod migrations;
pub mod peer;
pub mod pool;
pub mod server;
pub mod testing;
pub mod user;

pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use peer::{ActiveAddressRow, PeerRepository, PeerRowTuple, PeerStore};
pub use pool::create_pool;
pub use server::{CreateServerParams, ServerRepository, ServerRowTuple, ServerStore};
pub use user::{UserRepository, UserStore};

/// Cheap connectivity check used by health checks.
#[tracing::instrument(skip(pool))]
pub async fn ping(pool: &sqlx::SqlitePool) -> Result<()> {
	sqlx::query("SELECT 1").execute(pool).await?;
	Ok(())
}
