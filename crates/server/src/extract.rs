//! Request extractors whose rejections render as [`ServerError`] envelopes.
//!
//! axum's own `Json` and `Query` reject with plain-text bodies; these wrappers
//! route the rejection through `From<JsonRejection>`/`From<QueryRejection>`
//! so malformed input gets the same `{ "error": ... }` shape as every other
//! failure.

use crate::error::ServerError;
use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON body extractor and response.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string extractor.
#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServerError))]
pub struct Query<T>(pub T);
