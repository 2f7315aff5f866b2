// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod allocator;
pub mod authorization;
pub mod device;
pub mod directory;
pub mod error;
pub mod render;
pub mod testing;
pub mod types;

pub use allocator::{AddressAllocator, ServerLease};
pub use authorization::PeerAuthorizationService;
pub use device::{
	DeviceBackend, DeviceError, DevicePeer, PeerDevice, WireGuardDevice, DEFAULT_DEVICE_DEADLINE,
	PERSISTENT_KEEPALIVE_SECS,
};
pub use directory::{ServerDirectory, SyncOutcome};
pub use error::{ErrorKind, Result, WgError};
pub use render::{render_config, ClientConfig, InterfaceSection, PeerSection, CLIENT_PRIVATE_KEY_PLACEHOLDER};
pub use types::{ManagedServer, NewServer, PeerAuthorization, Server, ServerResponse};

use sqlx::SqlitePool;
use std::sync::Arc;
use vpn_server_db::{PeerRepository, PeerStore, ServerRepository, ServerStore};

#[derive(Clone)]
pub struct WgTunnelServices {
	pub directory: ServerDirectory,
	pub authorizations: PeerAuthorizationService,
}

impl WgTunnelServices {
	pub fn new(db: SqlitePool, device: Arc<dyn PeerDevice>) -> Self {
		Self::with_stores(
			Arc::new(PeerRepository::new(db.clone())),
			Arc::new(ServerRepository::new(db)),
			device,
		)
	}

	pub fn with_stores(
		peers: Arc<dyn PeerStore>,
		servers: Arc<dyn ServerStore>,
		device: Arc<dyn PeerDevice>,
	) -> Self {
		let allocator = Arc::new(AddressAllocator::new(peers.clone()));

		Self {
			directory: ServerDirectory::new(servers.clone()),
			authorizations: PeerAuthorizationService::new(peers, servers, allocator, device),
		}
	}

	pub fn device(&self) -> &Arc<dyn PeerDevice> {
		self.authorizations.device()
	}
}
