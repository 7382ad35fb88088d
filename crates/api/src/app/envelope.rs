//! Uniform JSON envelope around every API response.
//!
//! ```json
//! { "success": true, "statusCode": 201, "message": "User created successfully", "data": { ... } }
//! { "success": false, "statusCode": 404, "message": "user not found" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Standard API response wrapper.
///
/// The HTTP status of the response always equals `statusCode` in the body.
/// A unit payload (`()`) serializes as `"data": null`; error envelopes carry
/// no `data` key at all.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,

    pub status_code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK with a payload and no message.
    pub fn success(data: T) -> Self {
        Self::with_status(data, StatusCode::OK, None)
    }

    /// Successful response with an explicit status and optional message.
    pub fn with_status(data: T, status: StatusCode, message: Option<&str>) -> Self {
        Self {
            success: true,
            status_code: status.as_u16(),
            message: message.map(str::to_string),
            data: Some(data),
        }
    }

    /// Failed response: no payload, always a message.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: status.as_u16(),
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_defaults_to_ok_without_message() {
        let body = serde_json::to_value(ApiResponse::success(json!({"id": 1}))).unwrap();
        assert_eq!(
            body,
            json!({"success": true, "statusCode": 200, "data": {"id": 1}})
        );
    }

    #[test]
    fn success_with_status_and_message() {
        let resp = ApiResponse::with_status("x", StatusCode::CREATED, Some("User created successfully"));
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body = serde_json::to_value(resp).unwrap();
        assert_eq!(body["statusCode"], 201);
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["data"], "x");
    }

    #[test]
    fn unit_payload_is_explicit_null() {
        let body = serde_json::to_value(ApiResponse::with_status((), StatusCode::OK, Some("gone"))).unwrap();
        assert!(body.as_object().unwrap().contains_key("data"));
        assert!(body["data"].is_null());
    }

    #[test]
    fn error_has_no_data_key() {
        let body = serde_json::to_value(ApiResponse::<()>::error(StatusCode::NOT_FOUND, "user not found")).unwrap();
        assert_eq!(
            body,
            json!({"success": false, "statusCode": 404, "message": "user not found"})
        );
    }

    #[test]
    fn http_status_matches_body() {
        let resp = ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "email exists").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
