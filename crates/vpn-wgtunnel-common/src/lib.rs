// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod keys;
pub mod keys_file;
pub mod pool;

pub use keys::{
	generate_key_pair, validate_public_key, KeyError, WgKeyPair, WgPrivateKey, WgPublicKey, KEY_LEN,
};
pub use keys_file::{load_public_key_file, KeyFileError};
pub use pool::{
	host_address, host_number, initial_host, next_host, pool_network, server_address, PoolError,
	POOL_CEILING,
};
