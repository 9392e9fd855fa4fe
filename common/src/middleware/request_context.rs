//! Request context middleware.
//!
//! Attaches a request ID and the optional widget ID to every request. The
//! widget ID keys last-request-wins tracking for widget refreshes.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header::HeaderName, request::Parts, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::utils::IdGenerator;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub static WIDGET_ID_HEADER: HeaderName = HeaderName::from_static("x-widget-id");

/// Per-request identifiers, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub widget: Option<String>,
}

impl RequestContext {
    /// Reads identifiers from headers, generating a request ID if absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        Self {
            request_id: header(&REQUEST_ID_HEADER).unwrap_or_else(IdGenerator::request_id),
            widget: header(&WIDGET_ID_HEADER),
        }
    }

    /// Widget ID, or the endpoint's default when the caller sent none.
    pub fn widget_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.widget.as_deref().unwrap_or(default)
    }
}

/// Stores a [`RequestContext`] in the request, traces the request inside a
/// span carrying both IDs and echoes the request ID back.
pub async fn request_context_middleware(mut req: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_headers(req.headers());
    req.extensions_mut().insert(ctx.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ctx.request_id,
        widget = ctx.widget.as_deref().unwrap_or("-"),
        method = %req.method(),
        uri = %req.uri(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::from_headers(&parts.headers)))
    }
}
