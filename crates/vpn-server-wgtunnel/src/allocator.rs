// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tunnel address allocation.
//!
//! A server with N active authorizations hands out host `N + 2` of its `/24`.
//! When a deactivation has left a hole and that host is still held by
//! another active peer, the allocator walks forward (wrapping inside the peer
//! range) to the first free host.
//!
//! Counting and claiming are only consistent while the server's lock is
//! held, so allocation is only reachable through a [`ServerLease`].

use ipnet::Ipv4Net;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::instrument;
use uuid::Uuid;
use vpn_server_db::PeerStore;
use vpn_wgtunnel_common::{host_address, host_number, initial_host, next_host, PoolError, POOL_CEILING};

use crate::error::{Result, WgError};

type LockMap = Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>;

pub struct AddressAllocator {
	peers: Arc<dyn PeerStore>,
	locks: LockMap,
}

impl AddressAllocator {
	pub fn new(peers: Arc<dyn PeerStore>) -> Self {
		Self {
			peers,
			locks: Arc::default(),
		}
	}

	/// Wait for exclusive use of `server_id`'s address space.
	pub async fn lock_server(&self, server_id: Uuid) -> ServerLease {
		let lock = {
			let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
			locks.entry(server_id).or_default().clone()
		};
		let guard = lock.lock_owned().await;
		ServerLease {
			server_id,
			peers: self.peers.clone(),
			locks: self.locks.clone(),
			guard,
		}
	}

	/// Servers with a live lock entry.
	pub fn tracked_servers(&self) -> usize {
		self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
	}
}

/// Exclusive hold on one server's address space. Dropping it releases the
/// server and forgets its lock once nobody else is waiting on it.
pub struct ServerLease {
	server_id: Uuid,
	peers: Arc<dyn PeerStore>,
	locks: LockMap,
	guard: OwnedMutexGuard<()>,
}

impl Drop for ServerLease {
	fn drop(&mut self) {
		let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
		// the map and this guard are the only owners; waiters clone under `locks`
		if Arc::strong_count(OwnedMutexGuard::mutex(&self.guard)) == 2 {
			locks.remove(&self.server_id);
		}
	}
}

impl ServerLease {
	pub fn server_id(&self) -> Uuid {
		self.server_id
	}

	/// Pick the address `user_id` should hold on this server.
	///
	/// The user's own current address never counts as taken.
	#[instrument(skip(self), fields(server_id = %self.server_id, %user_id))]
	pub async fn allocate(&self, user_id: Uuid) -> Result<Ipv4Net> {
		let active = self.peers.count_active_for_server(self.server_id).await?;
		let active = u32::try_from(active)
			.map_err(|_| WgError::Internal(format!("negative peer count: {active}")))?;

		let owner = user_id.to_string();
		let held: HashSet<u8> = self
			.peers
			.list_active_addresses(self.server_id)
			.await?
			.into_iter()
			.filter(|(holder, _)| *holder != owner)
			.filter_map(|(_, allowed_ips)| match host_number(&allowed_ips) {
				Ok(host) => Some(host),
				Err(e) => {
					tracing::warn!(%allowed_ips, error = %e, "ignoring unparseable stored address");
					None
				}
			})
			.collect();

		let host = pick_host(active, &held)?;
		let address = host_address(host)?;
		tracing::debug!(active, %address, "address allocated");
		Ok(address)
	}
}

/// Start at the host implied by `active` and take the first one not in `held`.
fn pick_host(active: u32, held: &HashSet<u8>) -> std::result::Result<u8, PoolError> {
	let mut host = initial_host(active)?;
	for _ in 0..POOL_CEILING {
		if !held.contains(&host) {
			return Ok(host);
		}
		host = next_host(host);
	}
	Err(PoolError::Exhausted { active })
}
