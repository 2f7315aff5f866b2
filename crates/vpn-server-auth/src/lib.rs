// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication for the VPN backend: user identity, Argon2 password hashing,
//! HS256 bearer tokens and header extraction.

mod argon2_config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod types;

pub use error::{AuthError, Result};
pub use jwt::{Claims, JwtManager, DEFAULT_TOKEN_TTL};
pub use middleware::{authenticate_headers, extract_bearer_token, CurrentUser};
pub use password::{hash_password, verify_password};
pub use types::{User, UserId, UserResponse};
