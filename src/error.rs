//! Error taxonomy and plain-text responses for the relay

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use thiserror::Error;

/// Faults that abort a single request
#[derive(Debug, Error)]
pub enum RelayError {
    /// The upstream could not be reached or its body could not be read
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Reading a local asset failed after it was found
    #[error("local asset read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// HTTP status reported to the client for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic response; details stay in the logs
    pub fn into_response(self) -> Response<Full<Bytes>> {
        text_response(self.status_code(), "Internal Server Error")
    }
}

/// Create a response with an explicit content type
pub fn body_response(
    status: StatusCode,
    content_type: &str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let builder = Response::builder().status(status);
    let builder = match hyper::header::HeaderValue::from_str(content_type) {
        Ok(value) => builder.header(hyper::header::CONTENT_TYPE, value),
        Err(_) => builder.header(hyper::header::CONTENT_TYPE, "application/octet-stream"),
    };
    builder
        .body(Full::new(body.into()))
        .expect("valid response with StatusCode and validated header")
}

/// Create a plain-text response
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    body_response(status, "text/plain; charset=utf-8", body)
}

/// Convert an upstream status code, falling back to 502 for values hyper rejects
pub fn upstream_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY)
}
