// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer authorization: the device write and the registry write as one unit.
//!
//! The live device has no rollback of its own, so a registry failure after a
//! successful device write is undone by calling the device again with the
//! inverse change. That undo is best-effort; when it fails the drift is
//! logged and the caller only sees the registry failure.
//!
//! All work for a server happens under its [`ServerLease`](crate::allocator::ServerLease).

use ipnet::Ipv4Net;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use vpn_server_db::{DbError, PeerStore, ServerStore};
use vpn_wgtunnel_common::{validate_public_key, WgPublicKey};

use crate::allocator::AddressAllocator;
use crate::device::{DevicePeer, PeerDevice};
use crate::error::{Result, WgError};
use crate::types::PeerAuthorization;

#[derive(Clone)]
pub struct PeerAuthorizationService {
	peers: Arc<dyn PeerStore>,
	servers: Arc<dyn ServerStore>,
	allocator: Arc<AddressAllocator>,
	device: Arc<dyn PeerDevice>,
}

impl PeerAuthorizationService {
	pub fn new(
		peers: Arc<dyn PeerStore>,
		servers: Arc<dyn ServerStore>,
		allocator: Arc<AddressAllocator>,
		device: Arc<dyn PeerDevice>,
	) -> Self {
		Self {
			peers,
			servers,
			allocator,
			device,
		}
	}

	/// Authorize `client_public_key` for `user_id` on `server_id`.
	///
	/// Re-authorizing overwrites the existing record. A different previous key
	/// is removed from the device once the new one is recorded. A key already
	/// active for another user or server is refused with [`WgError::KeyInUse`],
	/// since the device knows peers only by key.
	#[instrument(skip(self, client_public_key), fields(%user_id, %server_id))]
	pub async fn authorize(
		&self,
		user_id: Uuid,
		server_id: Uuid,
		client_public_key: &str,
	) -> Result<PeerAuthorization> {
		let public_key = validate_public_key(client_public_key.trim())
			.map_err(|e| WgError::InvalidPublicKey(e.to_string()))?;

		if self.servers.get_active_server(server_id).await?.is_none() {
			return Err(WgError::ServerNotFound);
		}

		let lease = self.allocator.lock_server(server_id).await;

		if let Some(holder) = self.active_holder_of(&public_key).await? {
			if holder.user_id != user_id || holder.server_id != server_id {
				tracing::warn!(
					public_key = %public_key.prefix(),
					holder_server_id = %holder.server_id,
					"public key already authorized elsewhere"
				);
				return Err(WgError::KeyInUse);
			}
		}

		let previous = self
			.peers
			.get_active(user_id, server_id)
			.await?
			.map(PeerAuthorization::try_from)
			.transpose()?;

		let address = lease.allocate(user_id).await?;

		self.device.authorize_peer(&public_key, address).await?;

		let row = match self
			.peers
			.upsert(
				user_id,
				server_id,
				&public_key.to_base64(),
				&address.to_string(),
			)
			.await
		{
			Ok(row) => row,
			Err(e) => {
				self
					.roll_back_device(&public_key, address, previous.as_ref(), &e)
					.await;
				return Err(e.into());
			}
		};

		if let Some(previous) = previous.filter(|p| p.public_key != public_key) {
			if let Err(e) = self.device.revoke_peer(&previous.public_key).await {
				tracing::warn!(
					drift = true,
					public_key = %previous.public_key.prefix(),
					error = %e,
					"failed to remove replaced key from device"
				);
			}
		}

		let authorization = PeerAuthorization::try_from(row)?;
		tracing::info!(
			public_key = %public_key.prefix(),
			address = %authorization.address,
			"peer authorized"
		);
		Ok(authorization)
	}

	async fn active_holder_of(&self, public_key: &WgPublicKey) -> Result<Option<PeerAuthorization>> {
		self
			.peers
			.find_active_by_public_key(&public_key.to_base64())
			.await?
			.map(PeerAuthorization::try_from)
			.transpose()
	}

	/// Undo a device write whose registry write failed: restore the address
	/// the registry still records for the key, otherwise remove the key.
	async fn roll_back_device(
		&self,
		public_key: &WgPublicKey,
		address: Ipv4Net,
		previous: Option<&PeerAuthorization>,
		cause: &DbError,
	) {
		let restore = match previous {
			Some(prev) if prev.public_key == *public_key => Some(prev.address),
			// another authorization may have claimed the key since the check
			_ => match self.active_holder_of(public_key).await {
				Ok(holder) => holder.map(|h| h.address),
				Err(e) => {
					tracing::warn!(error = %e, "key holder lookup failed during rollback");
					None
				}
			},
		};
		let rollback = match restore {
			Some(prior) => self.device.authorize_peer(public_key, prior).await,
			None => self.device.revoke_peer(public_key).await,
		};

		match rollback {
			Ok(()) => tracing::warn!(
				public_key = %public_key.prefix(),
				%address,
				error = %cause,
				"registry write failed, device change rolled back"
			),
			Err(rollback_error) => tracing::error!(
				drift = true,
				public_key = %public_key.prefix(),
				%address,
				error = %cause,
				compensation_error = %rollback_error,
				"registry write failed and device rollback failed; device and registry disagree"
			),
		}
	}

	/// Revoke the user's authorization on `server_id`.
	///
	/// The device removal is best-effort; the record is deactivated either way.
	#[instrument(skip(self), fields(%user_id, %server_id))]
	pub async fn deauthorize(&self, user_id: Uuid, server_id: Uuid) -> Result<()> {
		if self.peers.get_active(user_id, server_id).await?.is_none() {
			return Err(WgError::AuthorizationNotFound);
		}

		let _lease = self.allocator.lock_server(server_id).await;

		let current: PeerAuthorization = self
			.peers
			.get_active(user_id, server_id)
			.await?
			.ok_or(WgError::AuthorizationNotFound)?
			.try_into()?;

		if let Err(e) = self.device.revoke_peer(&current.public_key).await {
			tracing::warn!(
				drift = true,
				public_key = %current.public_key.prefix(),
				error = %e,
				"device revoke failed, deactivating record anyway"
			);
		}

		if !self.peers.deactivate(user_id, server_id).await? {
			return Err(WgError::AuthorizationNotFound);
		}

		tracing::info!(public_key = %current.public_key.prefix(), "peer deauthorized");
		Ok(())
	}

	#[instrument(skip(self), fields(%user_id, %server_id))]
	pub async fn get_authorization(
		&self,
		user_id: Uuid,
		server_id: Uuid,
	) -> Result<Option<PeerAuthorization>> {
		self
			.peers
			.get_active(user_id, server_id)
			.await?
			.map(PeerAuthorization::try_from)
			.transpose()
	}

	/// Peers currently configured on the live device.
	pub async fn list_authorized_peers(&self) -> Result<Vec<DevicePeer>> {
		Ok(self.device.list_peers().await?)
	}

	pub fn device(&self) -> &Arc<dyn PeerDevice> {
		&self.device
	}
}
