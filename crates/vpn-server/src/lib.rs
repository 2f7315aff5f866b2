// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP boundary for the VPN subscription backend.

pub mod api;
pub mod api_response;
pub mod auth_middleware;
pub mod error;
pub mod health;
pub mod routes;
pub mod validation;
pub mod version;

pub use api::{create_app_state, create_router, AppState};
pub use error::ServerError;
