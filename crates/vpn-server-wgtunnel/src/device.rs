// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Live tunnel device access.
//!
//! Every change to the running interface goes through [`PeerDevice`]. The
//! production implementation drives a WireGuard interface through
//! `wireguard-control`; its netlink/UAPI calls block, so each one runs on the
//! blocking pool under a deadline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipnet::{IpNet, Ipv4Net};
use serde::Serialize;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use tracing::instrument;
use vpn_wgtunnel_common::WgPublicKey;
use wireguard_control::{Backend, Device, DeviceUpdate, InterfaceName, Key, PeerConfigBuilder};

/// Keepalive pushed with every authorized peer, in seconds.
pub const PERSISTENT_KEEPALIVE_SECS: u16 = 25;

pub const DEFAULT_DEVICE_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
	#[error("device unavailable: {0}")]
	Unavailable(String),

	#[error("device rejected configuration: {0}")]
	Rejected(String),

	#[error("invalid interface name: {0}")]
	InvalidInterface(String),

	#[error("backend not supported on this platform: {0}")]
	UnsupportedBackend(String),

	#[error("device task failed: {0}")]
	Task(String),
}

/// A peer as currently configured on the live device.
#[derive(Debug, Clone, Serialize)]
pub struct DevicePeer {
	pub public_key: WgPublicKey,
	pub allowed_ips: Vec<IpNet>,
	pub persistent_keepalive: Option<u16>,
	pub last_handshake: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PeerDevice: Send + Sync {
	/// Interface name, for logs and health output.
	fn interface(&self) -> &str;

	/// Add the peer or replace its allowed-address set with `address`.
	async fn authorize_peer(&self, public_key: &WgPublicKey, address: Ipv4Net)
		-> Result<(), DeviceError>;

	/// Remove the peer. Removing an absent peer succeeds.
	async fn revoke_peer(&self, public_key: &WgPublicKey) -> Result<(), DeviceError>;

	async fn list_peers(&self) -> Result<Vec<DevicePeer>, DeviceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceBackend {
	Kernel,
	Userspace,
}

/// The local WireGuard interface.
#[derive(Clone)]
pub struct WireGuardDevice {
	name: String,
	interface: InterfaceName,
	backend: Backend,
	deadline: Duration,
}

impl std::fmt::Debug for WireGuardDevice {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WireGuardDevice")
			.field("interface", &self.name)
			.field("backend", &self.backend)
			.field("deadline", &self.deadline)
			.finish()
	}
}

impl WireGuardDevice {
	pub fn new(interface: &str, backend: DeviceBackend) -> Result<Self, DeviceError> {
		let parsed: InterfaceName = interface
			.parse()
			.map_err(|e| DeviceError::InvalidInterface(format!("{interface}: {e}")))?;

		let backend = match backend {
			#[cfg(target_os = "linux")]
			DeviceBackend::Kernel => Backend::Kernel,
			#[cfg(not(target_os = "linux"))]
			DeviceBackend::Kernel => {
				return Err(DeviceError::UnsupportedBackend("kernel".to_string()));
			}
			DeviceBackend::Userspace => Backend::Userspace,
		};

		Ok(Self {
			name: interface.to_string(),
			interface: parsed,
			backend,
			deadline: DEFAULT_DEVICE_DEADLINE,
		})
	}

	/// Bound each configure or query call. A call that overruns is reported
	/// as [`DeviceError::Unavailable`].
	pub fn with_deadline(mut self, deadline: Duration) -> Self {
		self.deadline = deadline;
		self
	}

	async fn run_blocking<T, F>(&self, op: F) -> Result<T, DeviceError>
	where
		T: Send + 'static,
		F: FnOnce(InterfaceName, Backend) -> Result<T, DeviceError> + Send + 'static,
	{
		let interface = self.interface;
		let backend = self.backend;
		run_with_deadline(self.deadline, move || op(interface, backend)).await
	}
}

/// Run a blocking device call on the blocking pool, giving up after
/// `deadline`. The abandoned call keeps its thread until it returns.
async fn run_with_deadline<T, F>(deadline: Duration, op: F) -> Result<T, DeviceError>
where
	T: Send + 'static,
	F: FnOnce() -> Result<T, DeviceError> + Send + 'static,
{
	match tokio::time::timeout(deadline, tokio::task::spawn_blocking(op)).await {
		Ok(joined) => joined.map_err(|e| DeviceError::Task(e.to_string()))?,
		Err(_) => {
			tracing::warn!(?deadline, "device call timed out");
			Err(DeviceError::Unavailable(format!(
				"no response within {}ms",
				deadline.as_millis()
			)))
		}
	}
}

#[async_trait]
impl PeerDevice for WireGuardDevice {
	fn interface(&self) -> &str {
		&self.name
	}

	#[instrument(skip(self, public_key), fields(interface = %self.name, public_key = %public_key.prefix(), %address))]
	async fn authorize_peer(
		&self,
		public_key: &WgPublicKey,
		address: Ipv4Net,
	) -> Result<(), DeviceError> {
		let key = to_device_key(public_key)?;
		self.run_blocking(move |interface, backend| {
			let peer = PeerConfigBuilder::new(&key)
				.replace_allowed_ips()
				.add_allowed_ip(IpAddr::V4(address.addr()), address.prefix_len())
				.set_persistent_keepalive_interval(PERSISTENT_KEEPALIVE_SECS);
			DeviceUpdate::new()
				.add_peer(peer)
				.apply(&interface, backend)
				.map_err(classify_io_error)
		})
		.await?;

		tracing::debug!("peer authorized on device");
		Ok(())
	}

	#[instrument(skip(self, public_key), fields(interface = %self.name, public_key = %public_key.prefix()))]
	async fn revoke_peer(&self, public_key: &WgPublicKey) -> Result<(), DeviceError> {
		let key = to_device_key(public_key)?;
		self.run_blocking(move |interface, backend| {
			DeviceUpdate::new()
				.remove_peer_by_key(&key)
				.apply(&interface, backend)
				.map_err(classify_io_error)
		})
		.await?;

		tracing::debug!("peer revoked on device");
		Ok(())
	}

	#[instrument(skip(self), fields(interface = %self.name))]
	async fn list_peers(&self) -> Result<Vec<DevicePeer>, DeviceError> {
		self.run_blocking(|interface, backend| {
			let device = Device::get(&interface, backend).map_err(classify_io_error)?;
			Ok(device
				.peers
				.into_iter()
				.filter_map(|peer| {
					let public_key = WgPublicKey::from_base64(&peer.config.public_key.to_base64()).ok()?;
					let allowed_ips = peer
						.config
						.allowed_ips
						.iter()
						.filter_map(|ip| IpNet::new(ip.address, ip.cidr).ok())
						.collect();
					Some(DevicePeer {
						public_key,
						allowed_ips,
						persistent_keepalive: peer.config.persistent_keepalive_interval,
						last_handshake: peer.stats.last_handshake_time.map(DateTime::<Utc>::from),
					})
				})
				.collect())
		})
		.await
	}
}

fn to_device_key(public_key: &WgPublicKey) -> Result<Key, DeviceError> {
	Key::from_base64(&public_key.to_base64())
		.map_err(|_| DeviceError::Rejected(format!("unusable key {}", public_key.prefix())))
}

fn classify_io_error(e: io::Error) -> DeviceError {
	match e.kind() {
		io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => DeviceError::Rejected(e.to_string()),
		_ => DeviceError::Unavailable(e.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overlong_interface_name_is_rejected() {
		let err = WireGuardDevice::new("this-interface-name-is-too-long", DeviceBackend::Userspace)
			.unwrap_err();
		assert!(matches!(err, DeviceError::InvalidInterface(_)));
	}

	#[test]
	fn userspace_backend_constructs_without_touching_the_device() {
		let device = WireGuardDevice::new("wg-test0", DeviceBackend::Userspace).unwrap();
		assert_eq!(device.interface(), "wg-test0");
	}

	#[test]
	fn io_errors_are_classified() {
		assert!(matches!(
			classify_io_error(io::Error::from(io::ErrorKind::InvalidInput)),
			DeviceError::Rejected(_)
		));
		assert!(matches!(
			classify_io_error(io::Error::from(io::ErrorKind::NotFound)),
			DeviceError::Unavailable(_)
		));
		assert!(matches!(
			classify_io_error(io::Error::from(io::ErrorKind::PermissionDenied)),
			DeviceError::Unavailable(_)
		));
	}

	#[test]
	fn deadline_is_configurable() {
		let device = WireGuardDevice::new("wg-test0", DeviceBackend::Userspace)
			.unwrap()
			.with_deadline(Duration::from_millis(250));
		assert_eq!(device.deadline, Duration::from_millis(250));
	}

	#[tokio::test]
	async fn hung_device_call_times_out_as_unavailable() {
		let started = std::time::Instant::now();
		let result: Result<(), DeviceError> = run_with_deadline(Duration::from_millis(20), || {
			std::thread::sleep(Duration::from_millis(300));
			Ok(())
		})
		.await;
		assert!(matches!(result, Err(DeviceError::Unavailable(_))));
		assert!(started.elapsed() < Duration::from_millis(250));
	}

	#[tokio::test]
	async fn prompt_device_call_returns_its_result() {
		let value = run_with_deadline(Duration::from_secs(1), || Ok(7u8)).await.unwrap();
		assert_eq!(value, 7);

		let err = run_with_deadline::<(), _>(Duration::from_secs(1), || {
			Err(DeviceError::Rejected("bad peer".to_string()))
		})
		.await
		.unwrap_err();
		assert!(matches!(err, DeviceError::Rejected(_)));
	}

	#[test]
	fn public_keys_convert_to_device_keys() {
		let key = vpn_wgtunnel_common::WgKeyPair::generate().unwrap();
		let device_key = to_device_key(key.public_key()).unwrap();
		assert_eq!(device_key.to_base64(), key.public_key().to_base64());
	}
}
