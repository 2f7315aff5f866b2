// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Response envelopes shared by every handler.
//!
//! Success: `{ "success": true, "data": ..., "timestamp": ... }`
//! Failure: `{ "error": true, "message": ..., "timestamp": ... }`

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
	pub success: bool,
	pub data: T,
	pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
	pub error: bool,
	pub message: String,
	pub timestamp: String,
}

impl ErrorBody {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			error: true,
			message: message.into(),
			timestamp: chrono::Utc::now().to_rfc3339(),
		}
	}
}

/// `200 OK` with `data` wrapped in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Response {
	with_status(StatusCode::OK, data)
}

/// `201 Created` with `data` wrapped in the success envelope.
pub fn created<T: Serialize>(data: T) -> Response {
	with_status(StatusCode::CREATED, data)
}

pub fn with_status<T: Serialize>(status: StatusCode, data: T) -> Response {
	(
		status,
		Json(ApiResponse {
			success: true,
			data,
			timestamp: chrono::Utc::now().to_rfc3339(),
		}),
	)
		.into_response()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn success_envelope_shape() {
		let response = created(serde_json::json!({ "id": 1 }));
		assert_eq!(response.status(), StatusCode::CREATED);

		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
		assert_eq!(json["success"], true);
		assert_eq!(json["data"]["id"], 1);
		assert!(json["timestamp"].is_string());
	}

	#[test]
	fn error_body_is_flagged() {
		let body = ErrorBody::new("nope");
		assert!(body.error);
		assert_eq!(body.message, "nope");
	}
}
