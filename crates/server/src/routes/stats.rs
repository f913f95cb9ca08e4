use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use lifedrops::model::fields;
use lifedrops::{Collection, Filter, FindOptions, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub users: u64,
    pub donation_requests: u64,
    pub total_funds: f64,
}

/// Dashboard counters (admins and volunteers)
pub async fn admin_stats(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let users = state
        .store
        .count(
            Collection::Users,
            &Filter::new().eq(fields::ROLE, Role::Donor.as_str()),
        )
        .await?;
    let donation_requests = state
        .store
        .count(Collection::DonationRequests, &Filter::new())
        .await?;
    let funds = state
        .store
        .find(Collection::Funds, &Filter::new(), &FindOptions::default())
        .await?;
    // Non-numeric amounts are ignored rather than failing the dashboard.
    let total_funds = funds
        .iter()
        .filter_map(|fund| fund.get(fields::AMOUNT).and_then(|v| v.as_f64()))
        .sum();

    Ok(Json(AdminStats {
        users,
        donation_requests,
        total_funds,
    }))
}
