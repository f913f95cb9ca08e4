//! # Life Drops
//!
//! Domain vocabulary and document storage for the Life Drops blood-donation
//! platform. The HTTP surface lives in the `lifedrops-server` crate; this crate
//! owns everything that touches the database.
//!
//! ## Core Features
//!
//! - **Pluggable Backends**: every handler talks to a [`DocumentStore`]. Out of
//!   the box there are two implementations:
//!   - An in-memory backend for tests and local runs without a database.
//!   - A MongoDB backend (enabled via the `backend-mongo` feature) that speaks to
//!     a real cluster through the official driver.
//! - **MongoDB-shaped queries**: [`Filter`] is a conjunction of field equality
//!   conditions, [`Update`] is a `$set`, and [`FindOptions`] carries sort, skip
//!   and limit. Write operations return the same acknowledged/count shapes the
//!   driver returns, so handlers can pass them straight through as JSON.
//!
//! ## Example Usage
//!
//! ```
//! use lifedrops::{BackendConfig, Collection, Filter, FindOptions};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), lifedrops::StoreError> {
//! let store = BackendConfig::in_memory().build().await?;
//!
//! let doc = json!({ "requesterEmail": "a@example.com", "status": "pending" });
//! let inserted = store
//!     .insert_one(Collection::DonationRequests, doc.as_object().cloned().unwrap_or_default())
//!     .await?;
//! assert!(inserted.acknowledged);
//!
//! let filter = Filter::new().eq_opt("status", Some("pending"));
//! let found = store
//!     .find(Collection::DonationRequests, &filter, &FindOptions::default())
//!     .await?;
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod model;
mod query;

pub use backend::{BackendConfig, DocumentStore, InMemoryBackend};
#[cfg(feature = "backend-mongo")]
pub use backend::MongoBackend;
pub use model::{BlogStatus, Collection, RequestStatus, Role, UserStatus};
pub use query::{
    DeleteResult, Filter, FindOptions, InsertOneResult, SortOrder, Update, UpdateResult,
    generate_id, is_object_id,
};

use thiserror::Error;

/// A stored document: a JSON object whose `_id` is a 24-character hex string.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Name of the primary key field on every document.
pub const ID_FIELD: &str = "_id";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}
