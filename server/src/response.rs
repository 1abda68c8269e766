//! Response shaping.
//!
//! Handlers produce exactly two kinds of non-streaming responses: a JSON
//! body (listings and error envelopes) or an empty body with
//! `Content-Length: 0`. Downloads build their own streaming response.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::{ErrorKind, GatewayError};

/// `statusCode` used for every error in flat mode.
pub const FLAT_STATUS_CODE: u64 = 1;

/// How errors are presented on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ErrorMode {
    /// Status and `statusCode` follow the error kind.
    #[default]
    Typed,
    /// Every error is HTTP 400 with `statusCode: 1`.
    Flat,
}

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "statusCode")]
    pub status_code: u64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ErrorEnvelope {
    pub fn new(err: &GatewayError, mode: ErrorMode) -> Self {
        match mode {
            ErrorMode::Flat => Self {
                status_code: FLAT_STATUS_CODE,
                message: err.message.clone(),
                kind: None,
            },
            ErrorMode::Typed => Self {
                status_code: err.kind.code(),
                message: err.message.clone(),
                kind: Some(err.kind),
            },
        }
    }
}

/// Send `data` as JSON with the given status.
///
/// A payload that cannot be serialized degrades to a plain-text 500.
pub fn respond_with_json<T: Serialize>(status: StatusCode, data: &T) -> Response {
    match serde_json::to_vec(data) {
        Ok(body) => (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("failed to marshal response payload: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

/// Empty response with an explicit `Content-Length: 0`.
pub fn respond_no_content(status: StatusCode) -> Response {
    (
        status,
        [(header::CONTENT_LENGTH, HeaderValue::from_static("0"))],
    )
        .into_response()
}

/// A gateway error in its wire presentation.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    status: StatusCode,
    envelope: ErrorEnvelope,
}

impl ErrorResponse {
    pub fn new(err: &GatewayError, mode: ErrorMode) -> Self {
        let status = match mode {
            ErrorMode::Flat => StatusCode::BAD_REQUEST,
            ErrorMode::Typed => err.kind.status(),
        };
        Self {
            status,
            envelope: ErrorEnvelope::new(err, mode),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        respond_with_json(self.status, &self.envelope)
    }
}

/// Error envelope for `err`, shaped according to `mode`.
pub fn respond_error(err: &GatewayError, mode: ErrorMode) -> Response {
    ErrorResponse::new(err, mode).into_response()
}

/// Plain-text rejection of an unsupported HTTP method.
pub fn respond_method_not_allowed(method: &Method, mode: ErrorMode) -> Response {
    let body = format!("Method not allow {method}");
    match mode {
        ErrorMode::Flat => body.into_response(),
        ErrorMode::Typed => (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, HeaderValue::from_static("GET, POST, DELETE"))],
            body,
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Stage;
    use rest2sftp_core::errors::FileError;

    fn not_found() -> GatewayError {
        GatewayError::file(&FileError::NotFound("/gone.txt".into()), Stage::DeleteFile)
    }

    #[test]
    fn flat_envelope_uses_constant_code() {
        let env = ErrorEnvelope::new(&not_found(), ErrorMode::Flat);
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(
            json,
            r#"{"statusCode":1,"message":"File not found: /gone.txt, Delete file error"}"#
        );
    }

    #[test]
    fn typed_envelope_carries_kind() {
        let env = ErrorEnvelope::new(&not_found(), ErrorMode::Typed);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["statusCode"], 3);
        assert_eq!(json["kind"], "pathNotFound");
    }

    #[test]
    fn error_status_depends_on_mode() {
        let err = not_found();
        assert_eq!(
            respond_error(&err, ErrorMode::Flat).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            respond_error(&err, ErrorMode::Typed).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn json_responses_set_content_type() {
        let resp = respond_with_json(StatusCode::OK, &serde_json::json!({"files": []}));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn unserializable_payload_degrades_to_500() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("nope"))
            }
        }
        let resp = respond_with_json(StatusCode::OK, &Broken);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn no_content_sets_zero_length() {
        let resp = respond_no_content(StatusCode::OK);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_LENGTH).unwrap(), "0");
    }

    #[test]
    fn method_not_allowed_by_mode() {
        let flat = respond_method_not_allowed(&Method::PUT, ErrorMode::Flat);
        assert_eq!(flat.status(), StatusCode::OK);

        let typed = respond_method_not_allowed(&Method::PUT, ErrorMode::Typed);
        assert_eq!(typed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            typed.headers().get(header::ALLOW).unwrap(),
            "GET, POST, DELETE"
        );
    }
}
