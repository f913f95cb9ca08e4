//! Life Drops Server - HTTP REST API for the blood donation platform
//!
//! This crate exposes the `lifedrops` document store over a REST API. It
//! supports:
//!
//! - **Donors**: Registration, profiles, roles, blocking, and donor search
//! - **Donation Requests**: Creation, filtering, status workflow, and counts
//! - **Blogs**: Drafting, publishing, and moderation by staff
//! - **Funds**: Payment intents and recorded contributions
//! - **Health & Metrics**: Liveness/readiness checks plus Prometheus-compatible metrics
//!
//! # Features
//!
//! - **Authentication**: Signed access tokens with admin and volunteer role gates
//! - **Middleware**: Compression, CORS, request ID tracking, structured logging
//! - **Configuration**: Environment variable and file-based configuration
//! - **Error Handling**: JSON error envelopes with stable error codes
//! - **Graceful Shutdown**: Proper signal handling for production deployments
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Public Endpoints
//!
//! - `GET /` - Landing text
//! - `GET /health`, `GET /ready`, `GET /metrics` - Probes and metrics
//! - `POST /jwt` - Issue an access token
//! - `POST /users` - Register a donor
//! - `GET /donors` - Search active donors
//! - `GET /donationRequest`, `GET /donationRequestCount` - Browse requests
//! - `GET /blogs`, `GET /blogs/{id}` - Read blog posts
//!
//! ## Token Endpoints (`Authorization: Bearer <token>`)
//!
//! - `GET|PUT /users/{email}` - Own profile
//! - `GET /users/role/{email}`, `GET /users/admin/{email}` - Role checks
//! - `POST /donationRequest` - Create a request
//! - `GET|PUT|DELETE /donationRequest/{id}`, `PATCH /donationRequest/{id}/status`
//! - `POST /create-payment-intent`, `GET|POST /funds`
//! - `GET /metadata` - Server metadata
//!
//! ## Staff Endpoints (admin or volunteer)
//!
//! - `POST /blogs` - Draft a blog post
//! - `GET /admin-stats` - Dashboard counters
//!
//! ## Admin Endpoints
//!
//! - `GET /users` - List users
//! - `PATCH /users/{id}/role`, `PATCH /users/{id}/status`
//! - `PATCH /blogs/{id}/status`, `DELETE /blogs/{id}`

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod payments;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::{Claims, TokenIssuer};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use payments::{PaymentGateway, StripeGateway};
pub use server::{build_router, start_server};
pub use state::ServerState;
