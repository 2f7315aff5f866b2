// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local WireGuard device and managed-server settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

pub const DEFAULT_INTERFACE: &str = "wg0";
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "/etc/wireguard/publickey";
pub const DEFAULT_SERVER_ID: Uuid = Uuid::from_u128(0xa7f4c3d6_1b3c_4e8b_9f0e_1d2c3b4a5e6f);
pub const DEFAULT_LISTEN_PORT: u16 = 51820;

const DEFAULT_SYNC_ATTEMPTS: u32 = 10;
const DEFAULT_SYNC_RETRY_SECS: u64 = 5;
const DEFAULT_DEVICE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SERVER_NAME: &str = "Primary";
const DEFAULT_SERVER_LOCATION: &str = "Default";
const DEFAULT_ENDPOINT: &str = "127.0.0.1";

/// Which WireGuard implementation drives the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WgBackendKind {
	Kernel,
	Userspace,
}

impl WgBackendKind {
	pub fn parse(s: &str) -> Option<Self> {
		match s.to_ascii_lowercase().as_str() {
			"kernel" => Some(WgBackendKind::Kernel),
			"userspace" => Some(WgBackendKind::Userspace),
			_ => None,
		}
	}
}

impl Default for WgBackendKind {
	fn default() -> Self {
		if cfg!(target_os = "linux") {
			WgBackendKind::Kernel
		} else {
			WgBackendKind::Userspace
		}
	}
}

#[derive(Debug, Clone)]
pub struct WireGuardConfig {
	pub interface: String,
	pub backend: WgBackendKind,
	/// Plain-text public key written by the device bootstrap process.
	pub public_key_file: PathBuf,
	/// Directory row this instance's device serves.
	pub server_id: Uuid,
	pub sync_attempts: u32,
	pub sync_retry_secs: u64,
	/// Upper bound on a single configure or query call against the interface.
	pub device_timeout_secs: u64,
	/// Create the managed server row at startup when it is missing.
	pub bootstrap: bool,
	pub server_name: String,
	pub server_location: String,
	pub endpoint: String,
	pub listen_port: u16,
}

impl WireGuardConfig {
	pub fn sync_retry_interval(&self) -> Duration {
		Duration::from_secs(self.sync_retry_secs)
	}

	pub fn device_timeout(&self) -> Duration {
		Duration::from_secs(self.device_timeout_secs)
	}
}

impl Default for WireGuardConfig {
	fn default() -> Self {
		WireGuardConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireGuardConfigLayer {
	#[serde(default)]
	pub interface: Option<String>,
	#[serde(default)]
	pub backend: Option<WgBackendKind>,
	#[serde(default)]
	pub public_key_file: Option<PathBuf>,
	#[serde(default)]
	pub server_id: Option<Uuid>,
	#[serde(default)]
	pub sync_attempts: Option<u32>,
	#[serde(default)]
	pub sync_retry_secs: Option<u64>,
	#[serde(default)]
	pub device_timeout_secs: Option<u64>,
	#[serde(default)]
	pub bootstrap: Option<bool>,
	#[serde(default)]
	pub server_name: Option<String>,
	#[serde(default)]
	pub server_location: Option<String>,
	#[serde(default)]
	pub endpoint: Option<String>,
	#[serde(default)]
	pub listen_port: Option<u16>,
}

macro_rules! overlay {
	($self:ident, $other:ident, $($field:ident),+ $(,)?) => {
		$(
			if $other.$field.is_some() {
				$self.$field = $other.$field;
			}
		)+
	};
}

impl WireGuardConfigLayer {
	pub fn merge(&mut self, other: WireGuardConfigLayer) {
		overlay!(
			self,
			other,
			interface,
			backend,
			public_key_file,
			server_id,
			sync_attempts,
			sync_retry_secs,
			device_timeout_secs,
			bootstrap,
			server_name,
			server_location,
			endpoint,
			listen_port,
		);
	}

	pub fn finalize(self) -> WireGuardConfig {
		WireGuardConfig {
			interface: self
				.interface
				.unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
			backend: self.backend.unwrap_or_default(),
			public_key_file: self
				.public_key_file
				.unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_KEY_FILE)),
			server_id: self.server_id.unwrap_or(DEFAULT_SERVER_ID),
			sync_attempts: self.sync_attempts.unwrap_or(DEFAULT_SYNC_ATTEMPTS),
			sync_retry_secs: self.sync_retry_secs.unwrap_or(DEFAULT_SYNC_RETRY_SECS),
			device_timeout_secs: self
				.device_timeout_secs
				.unwrap_or(DEFAULT_DEVICE_TIMEOUT_SECS),
			bootstrap: self.bootstrap.unwrap_or(true),
			server_name: self
				.server_name
				.unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
			server_location: self
				.server_location
				.unwrap_or_else(|| DEFAULT_SERVER_LOCATION.to_string()),
			endpoint: self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
			listen_port: self.listen_port.unwrap_or(DEFAULT_LISTEN_PORT),
		}
	}
}
