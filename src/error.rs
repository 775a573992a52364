// SPDX-License-Identifier: Apache-2.0
use actix_web::{http::{header, StatusCode}, HttpResponse, ResponseError};
use thiserror::Error;

/// Fatal errors raised while building the gateway at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("usage: tokengate [ <target> | <listen> <target> ]")]
    Usage { given: usize },

    #[error("{field} port is not usable: {value}")]
    InvalidPort { field: &'static str, value: String },

    #[error("failed to load TLS material: {0}")]
    Tls(#[from] openssl::error::ErrorStack),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A failure reported by the forwarding client. Surfaced to the client as a
/// 500 whose body is the error code, e.g. `ECONNREFUSED`.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct UpstreamError {
    pub code: &'static str,
    pub message: String,
}

impl ResponseError for UpstreamError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::InternalServerError()
            .insert_header((header::CONTENT_TYPE, "text/plain"))
            .body(self.code)
    }
}

#[derive(Debug, Error)]
pub enum StaticFileError {
    #[error("Error getting the file: {0}.")]
    Read(#[from] std::io::Error),
}

impl ResponseError for StaticFileError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::InternalServerError()
            .insert_header((header::CONTENT_TYPE, "text/plain"))
            .body(self.to_string())
    }
}
