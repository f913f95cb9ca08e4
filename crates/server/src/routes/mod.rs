//! API route handlers
//!
//! Routes are organized by the collection they serve:
//!
//! - `health`: Health checks, readiness, and metrics
//! - `auth`: Access token issuance
//! - `users`: Donor profiles and role/status administration
//! - `requests`: Blood donation requests
//! - `blogs`: Blog posts
//! - `payments`: Payment intents and recorded funds
//! - `stats`: Dashboard counters

pub mod auth;
pub mod blogs;
pub mod health;
pub mod payments;
pub mod requests;
pub mod stats;
pub mod users;

use crate::auth::Claims;
use crate::error::{ServerError, ServerResult};
use lifedrops::{Document, FindOptions};
use serde::Deserialize;

/// Landing text served at `GET /`.
pub const LANDING_TEXT: &str = "Life Drops : A Blood Donation Platform";

/// Root endpoint (GET /). Requires no authentication.
pub async fn home() -> &'static str {
    LANDING_TEXT
}

/// 404 Not Found handler
///
/// Returns a standardized error response for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

/// `page`/`size` query parameters shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl Pagination {
    /// Page `options`. Pages whose offset or size the database cannot
    /// represent are rejected.
    pub fn apply(&self, options: FindOptions) -> ServerResult<FindOptions> {
        let Some(size) = self.size.filter(|s| *s > 0) else {
            return Ok(options);
        };
        let size = driver_count("size", size)?;
        let skip = self
            .page
            .unwrap_or(0)
            .checked_mul(size)
            .ok_or_else(|| ServerError::BadRequest("page is out of range".to_string()))?;
        driver_count("page", skip)?;
        Ok(options.paginate(self.page, Some(size)))
    }
}

/// Counts (limits, offsets) are signed 64-bit on the wire.
pub(crate) fn driver_count(name: &str, value: u64) -> ServerResult<u64> {
    match i64::try_from(value) {
        Ok(_) => Ok(value),
        Err(_) => Err(ServerError::BadRequest(format!("{name} is out of range"))),
    }
}

/// Reject a request whose path email is not the caller's own.
pub(crate) fn require_same_user(claims: &Claims, email: &str) -> ServerResult<()> {
    if claims.email != email {
        return Err(ServerError::Forbidden);
    }
    Ok(())
}

/// Drop fields a client must never set directly.
pub(crate) fn without_fields(mut doc: Document, protected: &[&str]) -> Document {
    for field in protected {
        doc.remove(*field);
    }
    doc
}

/// Current time as the RFC 3339 string stored in `createdAt`/`date` fields.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
