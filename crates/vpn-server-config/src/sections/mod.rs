// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod auth;
mod database;
mod http;
mod logging;
mod wireguard;

pub use auth::{AuthConfig, AuthConfigLayer, JWT_SECRET_ENV, MIN_PRODUCTION_SECRET_LEN};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use wireguard::{
	WgBackendKind, WireGuardConfig, WireGuardConfigLayer, DEFAULT_INTERFACE, DEFAULT_LISTEN_PORT,
	DEFAULT_PUBLIC_KEY_FILE, DEFAULT_SERVER_ID,
};
