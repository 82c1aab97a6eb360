//! Gateway responses.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::rpc::Status;

/// JSON body of a failed gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

impl From<&Status> for ErrorBody {
    fn from(status: &Status) -> Self {
        Self {
            code: status.code().as_i32(),
            message: status.message().to_string(),
        }
    }
}

/// Successful call: the reply payload, served as JSON.
pub fn payload_response(payload: Bytes) -> Response<Body> {
    let mut response = Response::new(Body::from(payload));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Failed call: HTTP status mapped from the status code, JSON error body.
pub fn error_response(status: &Status) -> Response<Body> {
    (status.code().http_status(), Json(ErrorBody::from(status))).into_response()
}
