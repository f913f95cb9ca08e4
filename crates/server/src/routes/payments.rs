use super::Pagination;
use crate::auth::Claims;
use crate::error::ServerResult;
use crate::extract::{Json, Query};
use crate::payments::amount_in_minor_units;
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Extension;
use lifedrops::model::fields;
use lifedrops::{Collection, Document, Filter, FindOptions, SortOrder, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Body of `POST /create-payment-intent`
#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

/// Create a payment intent for a donation to the platform
pub async fn create_payment_intent(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<PaymentIntentRequest>,
) -> ServerResult<impl IntoResponse> {
    let amount = amount_in_minor_units(request.price)?;
    let client_secret = state.payments.create_payment_intent(amount).await?;
    tracing::info!(amount, "payment intent created");
    Ok(Json(PaymentIntentResponse { client_secret }))
}

/// Record a completed payment
pub async fn record_fund(
    State(state): State<Arc<ServerState>>,
    Extension(claims): Extension<Claims>,
    Json(mut fund): Json<Document>,
) -> ServerResult<impl IntoResponse> {
    fund.remove(ID_FIELD);
    fund.entry(fields::EMAIL)
        .or_insert_with(|| json!(claims.email));
    fund.entry(fields::DATE)
        .or_insert_with(|| json!(super::now_rfc3339()));

    let result = state.store.insert_one(Collection::Funds, fund).await?;
    Ok(Json(result))
}

/// Recorded payments, newest first
pub async fn list_funds(
    State(state): State<Arc<ServerState>>,
    Query(pagination): Query<Pagination>,
) -> ServerResult<impl IntoResponse> {
    let newest_first = FindOptions::new().sorted_by(fields::DATE, SortOrder::Descending);
    let options = pagination.apply(newest_first)?;
    let funds = state
        .store
        .find(Collection::Funds, &Filter::new(), &options)
        .await?;
    Ok(Json(funds))
}
