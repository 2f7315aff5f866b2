// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tunnel address arithmetic for the per-server `/24` pool.
//!
//! Host `.1` belongs to the server itself, `.0` and `.255` are never handed
//! out, leaving hosts `.2` through `.254` for peers.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use thiserror::Error;

pub const POOL_BASE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 0);
pub const POOL_PREFIX_LEN: u8 = 24;
pub const SERVER_HOST: u8 = 1;
pub const FIRST_PEER_HOST: u8 = 2;
pub const LAST_PEER_HOST: u8 = 254;

/// Number of peer addresses a single server can hold.
pub const POOL_CEILING: u32 = (LAST_PEER_HOST - FIRST_PEER_HOST + 1) as u32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
	#[error("address pool exhausted: {active} active peers")]
	Exhausted { active: u32 },

	#[error("host {0} is outside the peer range")]
	HostOutOfRange(u8),

	#[error("address {0} is not a peer address in the tunnel pool")]
	NotInPool(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;

pub fn pool_network() -> Ipv4Net {
	// prefix length is a constant below 32
	Ipv4Net::new(POOL_BASE, POOL_PREFIX_LEN).unwrap_or_else(|_| Ipv4Net::from(POOL_BASE))
}

pub fn server_address() -> Ipv4Net {
	host_ip(SERVER_HOST).into()
}

fn host_ip(host: u8) -> Ipv4Addr {
	let [a, b, c, _] = POOL_BASE.octets();
	Ipv4Addr::new(a, b, c, host)
}

/// Single-host network for a peer host number.
pub fn host_address(host: u8) -> Result<Ipv4Net> {
	if !(FIRST_PEER_HOST..=LAST_PEER_HOST).contains(&host) {
		return Err(PoolError::HostOutOfRange(host));
	}
	Ok(host_ip(host).into())
}

/// First candidate host for a server with `active` authorizations.
pub fn initial_host(active: u32) -> Result<u8> {
	if active >= POOL_CEILING {
		return Err(PoolError::Exhausted { active });
	}
	Ok(FIRST_PEER_HOST + active as u8)
}

/// The host after `host`, wrapping from `.254` back to `.2`.
pub fn next_host(host: u8) -> u8 {
	if host >= LAST_PEER_HOST {
		FIRST_PEER_HOST
	} else {
		host + 1
	}
}

/// Parse a stored allowed-ips value (`10.0.0.7/32` or `10.0.0.7`) back to a host number.
pub fn host_number(allowed_ips: &str) -> Result<u8> {
	let net: Ipv4Net = match allowed_ips.parse::<Ipv4Net>() {
		Ok(net) => net,
		Err(_) => allowed_ips
			.parse::<Ipv4Addr>()
			.map(Ipv4Net::from)
			.map_err(|_| PoolError::NotInPool(allowed_ips.to_string()))?,
	};

	if net.prefix_len() != 32 || !pool_network().contains(&net.addr()) {
		return Err(PoolError::NotInPool(allowed_ips.to_string()));
	}

	let host = net.addr().octets()[3];
	if !(FIRST_PEER_HOST..=LAST_PEER_HOST).contains(&host) {
		return Err(PoolError::NotInPool(allowed_ips.to_string()));
	}
	Ok(host)
}
