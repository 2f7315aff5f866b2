// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! An in-memory [`PeerDevice`] for tests in this and downstream crates.

use async_trait::async_trait;
use ipnet::{IpNet, Ipv4Net};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use vpn_wgtunnel_common::WgPublicKey;

use crate::device::{DeviceError, DevicePeer, PeerDevice, PERSISTENT_KEEPALIVE_SECS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
	Authorize(WgPublicKey, Ipv4Net),
	Revoke(WgPublicKey),
}

/// Records every call and keeps a peer table the way a real device would.
#[derive(Default)]
pub struct RecordingDevice {
	peers: Mutex<HashMap<WgPublicKey, Ipv4Net>>,
	calls: Mutex<Vec<DeviceCall>>,
	fail_authorize: AtomicBool,
	fail_revoke: AtomicBool,
	unavailable: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
	m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingDevice {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail_authorize(&self, fail: bool) {
		self.fail_authorize.store(fail, Ordering::SeqCst);
	}

	pub fn fail_revoke(&self, fail: bool) {
		self.fail_revoke.store(fail, Ordering::SeqCst);
	}

	/// Make every call, including listing, fail as if the interface were gone.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	pub fn address_of(&self, public_key: &WgPublicKey) -> Option<Ipv4Net> {
		lock(&self.peers).get(public_key).copied()
	}

	pub fn peer_count(&self) -> usize {
		lock(&self.peers).len()
	}

	pub fn calls(&self) -> Vec<DeviceCall> {
		lock(&self.calls).clone()
	}

	fn check_available(&self) -> Result<(), DeviceError> {
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(DeviceError::Unavailable("recording device offline".to_string()));
		}
		Ok(())
	}
}

#[async_trait]
impl PeerDevice for RecordingDevice {
	fn interface(&self) -> &str {
		"wg-test"
	}

	async fn authorize_peer(
		&self,
		public_key: &WgPublicKey,
		address: Ipv4Net,
	) -> Result<(), DeviceError> {
		lock(&self.calls).push(DeviceCall::Authorize(*public_key, address));
		self.check_available()?;
		if self.fail_authorize.load(Ordering::SeqCst) {
			return Err(DeviceError::Rejected("authorize refused".to_string()));
		}
		lock(&self.peers).insert(*public_key, address);
		Ok(())
	}

	async fn revoke_peer(&self, public_key: &WgPublicKey) -> Result<(), DeviceError> {
		lock(&self.calls).push(DeviceCall::Revoke(*public_key));
		self.check_available()?;
		if self.fail_revoke.load(Ordering::SeqCst) {
			return Err(DeviceError::Unavailable("revoke refused".to_string()));
		}
		lock(&self.peers).remove(public_key);
		Ok(())
	}

	async fn list_peers(&self) -> Result<Vec<DevicePeer>, DeviceError> {
		self.check_available()?;
		Ok(lock(&self.peers)
			.iter()
			.map(|(key, address)| DevicePeer {
				public_key: *key,
				allowed_ips: vec![IpNet::V4(*address)],
				persistent_keepalive: Some(PERSISTENT_KEEPALIVE_SECS),
				last_handshake: None,
			})
			.collect())
	}
}
