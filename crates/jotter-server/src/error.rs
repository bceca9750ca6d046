use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::negotiate::ResponseFormat;
use crate::pages;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the error in the representation the client asked for.
    pub fn into_negotiated(self, format: ResponseFormat) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{self}");
        }
        let message = self.to_string();
        match format {
            ResponseFormat::Json => (status, Json(ErrorBody { error: message })).into_response(),
            ResponseFormat::Html => {
                (status, Html(pages::error_page(status, &message))).into_response()
            }
            ResponseFormat::Plain => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("{message}\n"),
            )
                .into_response(),
        }
    }
}

impl From<jotter_core::Error> for AppError {
    fn from(error: jotter_core::Error) -> Self {
        match error {
            jotter_core::Error::NotFound(what) => Self::NotFound(what),
            error if error.is_invalid_input() => Self::BadRequest(error.to_string()),
            error => Self::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_negotiated(ResponseFormat::Json)
    }
}

/// An error paired with the representation it should be rendered in.
#[derive(Debug)]
pub struct NegotiatedError {
    format: ResponseFormat,
    error: AppError,
}

impl IntoResponse for NegotiatedError {
    fn into_response(self) -> Response {
        self.error.into_negotiated(self.format)
    }
}

pub trait Negotiate<T> {
    /// Attach the response format so the error renders as the client expects.
    fn negotiated(self, format: ResponseFormat) -> Result<T, NegotiatedError>;
}

impl<T, E: Into<AppError>> Negotiate<T> for Result<T, E> {
    fn negotiated(self, format: ResponseFormat) -> Result<T, NegotiatedError> {
        self.map_err(|error| NegotiatedError {
            format,
            error: error.into(),
        })
    }
}
