// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Input validation for the user endpoints.

use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	#[allow(clippy::unwrap_used)]
	Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

pub const MIN_PASSWORD_LEN: usize = 8;

/// Sanitize an email address by trimming whitespace and lowercasing.
pub fn sanitize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
	EMAIL_REGEX.is_match(email)
}

/// At least one upper-case letter, one lower-case letter and one digit.
pub fn is_strong_password(password: &str) -> bool {
	password.chars().any(|c| c.is_ascii_uppercase())
		&& password.chars().any(|c| c.is_ascii_lowercase())
		&& password.chars().any(|c| c.is_ascii_digit())
}

pub fn validate_registration(email: &str, password: &str) -> Result<(), String> {
	validate_email(email)?;
	if password.is_empty() {
		return Err("password is required".to_string());
	}
	if password.chars().count() < MIN_PASSWORD_LEN {
		return Err(format!("password must be at least {MIN_PASSWORD_LEN} characters"));
	}
	if !is_strong_password(password) {
		return Err(
			"password must contain at least one uppercase letter, one lowercase letter, and one number"
				.to_string(),
		);
	}
	Ok(())
}

pub fn validate_login(email: &str, password: &str) -> Result<(), String> {
	validate_email(email)?;
	if password.is_empty() {
		return Err("password is required".to_string());
	}
	Ok(())
}

fn validate_email(email: &str) -> Result<(), String> {
	if email.is_empty() {
		return Err("email is required".to_string());
	}
	if !is_valid_email(email) {
		return Err("invalid email format".to_string());
	}
	Ok(())
}

pub fn parse_server_id(raw: &str) -> Result<Uuid, String> {
	Uuid::parse_str(raw.trim()).map_err(|_| "Invalid server ID".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn accepts_ordinary_emails() {
		assert!(is_valid_email("a@example.com"));
		assert!(is_valid_email("first.last+tag@sub.example.co"));
	}

	#[test]
	fn rejects_malformed_emails() {
		for email in ["", "plain", "a@b", "a@b.c", "@example.com", "a b@example.com"] {
			assert!(!is_valid_email(email), "{email} should be rejected");
		}
	}

	#[test]
	fn sanitize_trims_and_lowercases() {
		assert_eq!(sanitize_email("  A@Example.COM "), "a@example.com");
	}

	#[test]
	fn registration_rules() {
		assert!(validate_registration("a@example.com", "SecurePass1").is_ok());
		assert!(validate_registration("a@example.com", "").is_err());
		assert!(validate_registration("a@example.com", "Sh0rt").is_err());
		assert!(validate_registration("a@example.com", "alllowercase1").is_err());
		assert!(validate_registration("a@example.com", "ALLUPPERCASE1").is_err());
		assert!(validate_registration("a@example.com", "NoDigitsHere").is_err());
		assert!(validate_registration("", "SecurePass1").is_err());
	}

	#[test]
	fn login_only_needs_presence() {
		assert!(validate_login("a@example.com", "x").is_ok());
		assert!(validate_login("a@example.com", "").is_err());
		assert!(validate_login("nope", "x").is_err());
	}

	#[test]
	fn server_ids_must_be_uuids() {
		assert!(parse_server_id("a7f4c3d6-1b3c-4e8b-9f0e-1d2c3b4a5e6f").is_ok());
		assert!(parse_server_id("server-1").is_err());
	}

	proptest! {
		#[test]
		fn strong_passwords_pass(
			upper in "[A-Z]{1,4}",
			lower in "[a-z]{6,8}",
			digits in "[0-9]{1,4}",
		) {
			let password = format!("{upper}{lower}{digits}");
			prop_assert!(validate_registration("a@example.com", &password).is_ok());
		}

		#[test]
		fn digitless_passwords_fail(password in "[A-Za-z]{8,20}") {
			prop_assert!(validate_registration("a@example.com", &password).is_err());
		}
	}
}
