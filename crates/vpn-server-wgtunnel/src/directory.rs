// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exit-server catalog, provisioning and startup key synchronization.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;
use vpn_server_db::{CreateServerParams, ServerStore};
use vpn_wgtunnel_common::{load_public_key_file, validate_public_key, WgKeyPair};

use crate::error::{Result, WgError};
use crate::types::{ManagedServer, NewServer, Server};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
	Updated,
	Unchanged,
}

#[derive(Clone)]
pub struct ServerDirectory {
	servers: Arc<dyn ServerStore>,
}

impl ServerDirectory {
	pub fn new(servers: Arc<dyn ServerStore>) -> Self {
		Self { servers }
	}

	/// Active servers ordered by location, then name.
	#[instrument(skip(self))]
	pub async fn list_active_servers(&self) -> Result<Vec<Server>> {
		self
			.servers
			.list_active_servers()
			.await?
			.into_iter()
			.map(Server::try_from)
			.collect()
	}

	#[instrument(skip(self), fields(%server_id))]
	pub async fn get_active_server(&self, server_id: Uuid) -> Result<Server> {
		self
			.servers
			.get_active_server(server_id)
			.await?
			.ok_or(WgError::ServerNotFound)?
			.try_into()
	}

	/// Provision a server. A supplied public key is validated and stored
	/// alone; otherwise a key pair is generated and both halves stored.
	#[instrument(skip(self, new), fields(name = %new.name, location = %new.location))]
	pub async fn create_server(&self, new: &NewServer) -> Result<Server> {
		for (field, value) in [
			("name", &new.name),
			("location", &new.location),
			("endpoint", &new.endpoint),
		] {
			if value.trim().is_empty() {
				return Err(WgError::Validation(format!("{field} is required")));
			}
		}
		if new.port == 0 {
			return Err(WgError::Validation("port must be non-zero".to_string()));
		}

		let id = new.id.unwrap_or_else(Uuid::new_v4);
		match &new.public_key {
			Some(supplied) => {
				let public_key = validate_public_key(supplied.trim())
					.map_err(|e| WgError::InvalidPublicKey(e.to_string()))?;
				self
					.insert(id, new, &public_key.to_base64(), None)
					.await?;
			}
			None => {
				let pair = WgKeyPair::generate().map_err(|e| WgError::KeyGeneration(e.to_string()))?;
				let private_key = pair.private_key().to_base64();
				self
					.insert(
						id,
						new,
						&pair.public_key().to_base64(),
						Some(private_key.expose().as_str()),
					)
					.await?;
			}
		}

		tracing::info!(server_id = %id, "server provisioned");
		self
			.servers
			.get_server(id)
			.await?
			.ok_or(WgError::ServerNotFound)?
			.try_into()
	}

	async fn insert(
		&self,
		id: Uuid,
		new: &NewServer,
		public_key: &str,
		private_key: Option<&str>,
	) -> Result<()> {
		self
			.servers
			.create_server(&CreateServerParams {
				id,
				name: new.name.trim(),
				location: new.location.trim(),
				endpoint: new.endpoint.trim(),
				port: new.port,
				public_key,
				private_key,
			})
			.await?;
		Ok(())
	}

	/// Create the instance's own server record on first start. Returns true
	/// when a record was created.
	#[instrument(skip(self, managed), fields(server_id = %managed.id))]
	pub async fn ensure_managed_server(&self, managed: &ManagedServer) -> Result<bool> {
		if self.servers.get_server(managed.id).await?.is_some() {
			return Ok(false);
		}

		self
			.create_server(&NewServer {
				id: Some(managed.id),
				name: managed.name.clone(),
				location: managed.location.clone(),
				endpoint: managed.endpoint.clone(),
				port: managed.port,
				public_key: None,
			})
			.await?;
		tracing::info!("managed server bootstrapped with a generated key pair");
		Ok(true)
	}

	/// Make the stored public key match the one in `key_file`.
	#[instrument(skip(self, key_file), fields(%server_id, key_file = %key_file.as_ref().display()))]
	pub async fn sync_public_key(
		&self,
		key_file: impl AsRef<Path>,
		server_id: Uuid,
	) -> Result<SyncOutcome> {
		let public_key = load_public_key_file(key_file.as_ref()).await?;

		let changed = self
			.servers
			.update_public_key_if_changed(server_id, &public_key.to_base64())
			.await?;
		if changed > 0 {
			tracing::info!(public_key = %public_key.prefix(), "server public key updated from key file");
			return Ok(SyncOutcome::Updated);
		}

		if self.servers.get_server(server_id).await?.is_none() {
			return Err(WgError::ServerNotFound);
		}
		Ok(SyncOutcome::Unchanged)
	}

	/// [`Self::sync_public_key`] with a fixed retry interval. Running out of
	/// attempts is fatal.
	#[instrument(skip(self, key_file), fields(%server_id))]
	pub async fn sync_public_key_with_retry(
		&self,
		key_file: impl AsRef<Path>,
		server_id: Uuid,
		attempts: u32,
		retry_interval: Duration,
	) -> Result<SyncOutcome> {
		let key_file = key_file.as_ref();
		let mut last_error = None;

		for attempt in 1..=attempts {
			match self.sync_public_key(key_file, server_id).await {
				Ok(outcome) => {
					tracing::info!(attempt, ?outcome, "server public key synchronized");
					return Ok(outcome);
				}
				Err(e) => {
					tracing::warn!(
						attempt,
						attempts,
						error = %e,
						retry_in_secs = retry_interval.as_secs_f64(),
						"server public key sync failed"
					);
					last_error = Some(e);
					if attempt < attempts {
						tokio::time::sleep(retry_interval).await;
					}
				}
			}
		}

		let reason = last_error
			.map(|e| e.to_string())
			.unwrap_or_else(|| "no attempts made".to_string());
		Err(WgError::StartupFatal(format!(
			"public key for server {server_id} not synchronized after {attempts} attempts: {reason}"
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use tempfile::TempDir;
	use vpn_server_db::testing::create_test_pool;
	use vpn_server_db::ServerRepository;

	async fn directory() -> (ServerDirectory, Arc<ServerRepository>) {
		let repo = Arc::new(ServerRepository::new(create_test_pool().await.unwrap()));
		(ServerDirectory::new(repo.clone()), repo)
	}

	fn new_server(name: &str, location: &str, public_key: Option<String>) -> NewServer {
		NewServer {
			id: None,
			name: name.to_string(),
			location: location.to_string(),
			endpoint: "vpn.example.com".to_string(),
			port: 51820,
			public_key,
		}
	}

	fn managed(id: Uuid) -> ManagedServer {
		ManagedServer {
			id,
			name: "Primary".to_string(),
			location: "Default".to_string(),
			endpoint: "127.0.0.1".to_string(),
			port: 51820,
		}
	}

	#[tokio::test]
	async fn generated_servers_keep_their_private_key() {
		let (dir, repo) = directory().await;
		let server = dir.create_server(&new_server("a", "Oslo", None)).await.unwrap();

		assert!(validate_public_key(&server.public_key).is_ok());
		assert!(repo.has_private_key(server.id).await.unwrap());
	}

	#[tokio::test]
	async fn supplied_keys_are_validated_and_stored_without_private_key() {
		let (dir, repo) = directory().await;
		let key = WgKeyPair::generate().unwrap().public_key().to_base64();
		let server = dir
			.create_server(&new_server("a", "Oslo", Some(key.clone())))
			.await
			.unwrap();
		assert_eq!(server.public_key, key);
		assert!(!repo.has_private_key(server.id).await.unwrap());

		let err = dir
			.create_server(&new_server("b", "Oslo", Some("not-a-key".to_string())))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Validation);
	}

	#[tokio::test]
	async fn blank_fields_are_rejected() {
		let (dir, _) = directory().await;
		let err = dir.create_server(&new_server(" ", "Oslo", None)).await.unwrap_err();
		assert!(matches!(err, WgError::Validation(_)));
	}

	#[tokio::test]
	async fn listing_orders_by_location_then_name() {
		let (dir, _) = directory().await;
		dir.create_server(&new_server("b", "Zurich", None)).await.unwrap();
		dir.create_server(&new_server("a", "Zurich", None)).await.unwrap();
		dir.create_server(&new_server("c", "Amsterdam", None)).await.unwrap();

		let names: Vec<String> = dir
			.list_active_servers()
			.await
			.unwrap()
			.into_iter()
			.map(|s| s.name)
			.collect();
		assert_eq!(names, vec!["c", "a", "b"]);
	}

	#[tokio::test]
	async fn unknown_server_is_not_found() {
		let (dir, _) = directory().await;
		let err = dir.get_active_server(Uuid::new_v4()).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
	}

	#[tokio::test]
	async fn managed_server_is_created_once() {
		let (dir, _) = directory().await;
		let id = Uuid::new_v4();
		assert!(dir.ensure_managed_server(&managed(id)).await.unwrap());
		assert!(!dir.ensure_managed_server(&managed(id)).await.unwrap());
		assert_eq!(dir.get_active_server(id).await.unwrap().name, "Primary");
	}

	#[tokio::test]
	async fn sync_updates_only_on_mismatch() {
		let (dir, repo) = directory().await;
		let id = Uuid::new_v4();
		dir.ensure_managed_server(&managed(id)).await.unwrap();

		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("publickey");
		let device_key = WgKeyPair::generate().unwrap().public_key().to_base64();
		tokio::fs::write(&path, format!("{device_key}\n")).await.unwrap();

		assert_eq!(dir.sync_public_key(&path, id).await.unwrap(), SyncOutcome::Updated);
		assert_eq!(dir.get_active_server(id).await.unwrap().public_key, device_key);
		assert!(!repo.has_private_key(id).await.unwrap());

		assert_eq!(dir.sync_public_key(&path, id).await.unwrap(), SyncOutcome::Unchanged);
	}

	#[tokio::test]
	async fn sync_for_unknown_server_is_not_found() {
		let (dir, _) = directory().await;
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("publickey");
		let key = WgKeyPair::generate().unwrap().public_key().to_base64();
		tokio::fs::write(&path, key).await.unwrap();

		let err = dir.sync_public_key(&path, Uuid::new_v4()).await.unwrap_err();
		assert!(matches!(err, WgError::ServerNotFound));
	}

	#[tokio::test]
	async fn retry_waits_for_the_key_file() {
		let (dir, _) = directory().await;
		let id = Uuid::new_v4();
		dir.ensure_managed_server(&managed(id)).await.unwrap();

		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("publickey");
		let key = WgKeyPair::generate().unwrap().public_key().to_base64();

		let writer = {
			let path = path.clone();
			let key = key.clone();
			tokio::spawn(async move {
				tokio::time::sleep(Duration::from_millis(50)).await;
				tokio::fs::write(&path, key).await.unwrap();
			})
		};

		let outcome = dir
			.sync_public_key_with_retry(&path, id, 50, Duration::from_millis(20))
			.await
			.unwrap();
		writer.await.unwrap();
		assert_eq!(outcome, SyncOutcome::Updated);
		assert_eq!(dir.get_active_server(id).await.unwrap().public_key, key);
	}

	#[tokio::test]
	async fn exhausted_retries_are_fatal() {
		let (dir, _) = directory().await;
		let id = Uuid::new_v4();
		dir.ensure_managed_server(&managed(id)).await.unwrap();
		let tmp = TempDir::new().unwrap();

		let err = dir
			.sync_public_key_with_retry(tmp.path().join("missing"), id, 3, Duration::from_millis(1))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::StartupFatal);
	}
}
