use crate::auth::TokenIssuer;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::payments::{PaymentGateway, StripeGateway};
use lifedrops::model::fields;
use lifedrops::{Collection, DocumentStore, Filter, Role, UserStatus};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Document store (shared across requests)
    pub store: Arc<dyn DocumentStore>,

    /// Access token signer/verifier
    pub tokens: TokenIssuer,

    /// Payment processor client
    pub payments: Arc<dyn PaymentGateway>,

    /// Prometheus renderer, present when a recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create new server state, connecting to the configured database
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = config.database.backend_config()?.build().await?;
        let payments = Arc::new(StripeGateway::new(&config.payments, config.timeout())?);
        Ok(Self::with_parts(config, store, payments))
    }

    /// Assemble state from already-built parts
    pub fn with_parts(
        config: ServerConfig,
        store: Arc<dyn DocumentStore>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            tokens: TokenIssuer::new(&config.auth),
            config: Arc::new(config),
            store,
            payments,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Role of the user registered under `email`, if any
    pub async fn role_of(&self, email: &str) -> ServerResult<Option<Role>> {
        let user = self
            .store
            .find_one(Collection::Users, &Filter::new().eq(fields::EMAIL, email))
            .await?;
        Ok(user.as_ref().and_then(Role::from_document))
    }

    /// Whether the user registered under `email` has been blocked
    pub async fn is_blocked(&self, email: &str) -> ServerResult<bool> {
        let user = self
            .store
            .find_one(Collection::Users, &Filter::new().eq(fields::EMAIL, email))
            .await?;
        Ok(user.as_ref().and_then(UserStatus::from_document) == Some(UserStatus::Blocked))
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}
