// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration documents.

use ipnet::Ipv4Net;
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::device::PERSISTENT_KEEPALIVE_SECS;
use crate::types::Server;

/// Stands in for the client's private key, which the server never sees.
pub const CLIENT_PRIVATE_KEY_PLACEHOLDER: &str = "[CLIENT_PRIVATE_KEY]";
pub const CLIENT_DNS: &str = "1.1.1.1, 8.8.8.8";
pub const CLIENT_ALLOWED_IPS: &str = "0.0.0.0/0, ::/0";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InterfaceSection {
	pub private_key: String,
	pub address: String,
	pub dns: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PeerSection {
	pub public_key: String,
	pub endpoint: String,
	pub allowed_ips: String,
	pub persistent_keepalive: u16,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientConfig {
	pub interface: InterfaceSection,
	pub peer: PeerSection,
}

/// Compose the client's tunnel configuration. Pure; `private_key` is copied
/// through verbatim.
pub fn render_config(server: &Server, address: Ipv4Net, private_key: &str) -> ClientConfig {
	ClientConfig {
		interface: InterfaceSection {
			private_key: private_key.to_string(),
			address: address.to_string(),
			dns: CLIENT_DNS.to_string(),
		},
		peer: PeerSection {
			public_key: server.public_key.clone(),
			endpoint: endpoint(&server.endpoint, server.port),
			allowed_ips: CLIENT_ALLOWED_IPS.to_string(),
			persistent_keepalive: PERSISTENT_KEEPALIVE_SECS,
		},
	}
}

/// `host:port`, bracketing a bare IPv6 literal host.
fn endpoint(host: &str, port: u16) -> String {
	match host.parse::<IpAddr>() {
		Ok(IpAddr::V6(v6)) => SocketAddr::from((v6, port)).to_string(),
		_ => format!("{host}:{port}"),
	}
}

impl fmt::Display for ClientConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "[Interface]")?;
		writeln!(f, "PrivateKey = {}", self.interface.private_key)?;
		writeln!(f, "Address = {}", self.interface.address)?;
		writeln!(f, "DNS = {}", self.interface.dns)?;
		writeln!(f)?;
		writeln!(f, "[Peer]")?;
		writeln!(f, "PublicKey = {}", self.peer.public_key)?;
		writeln!(f, "Endpoint = {}", self.peer.endpoint)?;
		writeln!(f, "AllowedIPs = {}", self.peer.allowed_ips)?;
		writeln!(f, "PersistentKeepalive = {}", self.peer.persistent_keepalive)
	}
}
