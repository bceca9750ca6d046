//! `Accept` header negotiation between JSON, HTML, and plain text.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

/// Representation chosen for a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Html,
    Plain,
}

impl ResponseFormat {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .map_or(Self::Plain, Self::from_accept)
    }

    /// Pick the best supported media range; ties go to the earlier entry and
    /// anything unrecognised falls back to plain text.
    pub fn from_accept(accept: &str) -> Self {
        let mut best: Option<(Self, f32)> = None;
        for range in accept.split(',') {
            let mut params = range.split(';');
            let media = params.next().unwrap_or("").trim().to_ascii_lowercase();
            let quality = params
                .filter_map(|param| param.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);

            let format = match media.as_str() {
                "application/json" => Self::Json,
                "text/html" | "application/xhtml+xml" => Self::Html,
                "text/plain" => Self::Plain,
                _ => continue,
            };
            if quality > 0.0 && best.is_none_or(|(_, best_quality)| quality > best_quality) {
                best = Some((format, quality));
            }
        }
        best.map_or(Self::Plain, |(format, _)| format)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ResponseFormat {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
