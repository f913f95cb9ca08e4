use super::Pagination;
use crate::auth::Claims;
use crate::error::{ServerError, ServerResult};
use crate::extract::{Json, Query};
use crate::state::ServerState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Extension;
use lifedrops::model::fields;
use lifedrops::{
    Collection, Document, Filter, FindOptions, RequestStatus, SortOrder, Update, ID_FIELD,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Query parameters for listing and counting donation requests
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRequestQuery {
    #[serde(default)]
    pub requester_email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Most recent N requests, newest first
    #[serde(default)]
    pub limit: Option<u64>,
}

impl DonationRequestQuery {
    pub fn filter(&self) -> Filter {
        Filter::new()
            .eq_opt(fields::STATUS, self.status.as_deref())
            .eq_opt(fields::REQUESTER_EMAIL, self.requester_email.as_deref())
    }
}

/// Body of `PATCH /donationRequest/{id}/status`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: RequestStatus,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub donor_email: Option<String>,
}

impl StatusChange {
    /// The `$set` for this change. Taking a request in progress records who
    /// is donating, so both donor fields are required then.
    pub fn to_update(&self) -> ServerResult<Update> {
        let mut update = Update::set_field(fields::STATUS, self.status.as_str());
        if self.status == RequestStatus::InProgress {
            let name = non_empty(self.donor_name.as_deref());
            let email = non_empty(self.donor_email.as_deref());
            match (name, email) {
                (Some(name), Some(email)) => {
                    update = update
                        .and_set(fields::DONOR_NAME, name)
                        .and_set(fields::DONOR_EMAIL, email);
                }
                _ => {
                    return Err(ServerError::BadRequest(
                        "donorName and donorEmail are required to start a donation".to_string(),
                    ))
                }
            }
        }
        Ok(update)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// List donation requests, filtered by requester and/or status
pub async fn list_requests(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<DonationRequestQuery>,
    Query(pagination): Query<Pagination>,
) -> ServerResult<impl IntoResponse> {
    let mut options = pagination.apply(FindOptions::new())?;
    if let Some(limit) = query.limit.filter(|l| *l > 0) {
        options = FindOptions::new()
            .sorted_by(ID_FIELD, SortOrder::Descending)
            .with_limit(super::driver_count("limit", limit)?);
    }

    let requests = state
        .store
        .find(Collection::DonationRequests, &query.filter(), &options)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Error fetching submissions");
            ServerError::ReadFailed("Failed to fetch submissions")
        })?;
    Ok(Json(requests))
}

/// Number of donation requests matching the same filters as the listing
pub async fn count_requests(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<DonationRequestQuery>,
) -> ServerResult<impl IntoResponse> {
    let count = state
        .store
        .count(Collection::DonationRequests, &query.filter())
        .await?;
    Ok(Json(CountResponse { count }))
}

/// Create a donation request. Blocked users may not create requests.
pub async fn create_request(
    State(state): State<Arc<ServerState>>,
    Extension(claims): Extension<Claims>,
    Json(mut request): Json<Document>,
) -> ServerResult<impl IntoResponse> {
    if state.is_blocked(&claims.email).await? {
        return Err(ServerError::ForbiddenAction(
            "blocked users cannot create donation requests".to_string(),
        ));
    }

    request.remove(ID_FIELD);
    request
        .entry(fields::STATUS)
        .or_insert_with(|| json!(RequestStatus::Pending));
    request
        .entry(fields::REQUESTER_EMAIL)
        .or_insert_with(|| json!(claims.email));

    let result = state
        .store
        .insert_one(Collection::DonationRequests, request)
        .await?;
    tracing::info!(id = %result.inserted_id, requester = %claims.email, "donation request created");
    Ok(Json(result))
}

/// Fetch one donation request
pub async fn get_request(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let request = state
        .store
        .find_one(Collection::DonationRequests, &Filter::by_id(&id)?)
        .await?;
    Ok(Json(request))
}

/// Edit the fields of a donation request
pub async fn update_request(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(changes): Json<Document>,
) -> ServerResult<impl IntoResponse> {
    let filter = Filter::by_id(&id)?;
    let update = Update::set(changes);
    if update.is_empty() {
        return Err(ServerError::BadRequest("no fields to update".to_string()));
    }
    let result = state
        .store
        .update_one(Collection::DonationRequests, &filter, &update, false)
        .await?;
    Ok(Json(result))
}

/// Move a donation request to a new status
pub async fn set_status(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> ServerResult<impl IntoResponse> {
    let filter = Filter::by_id(&id)?;
    let update = change.to_update()?;
    let result = state
        .store
        .update_one(Collection::DonationRequests, &filter, &update, false)
        .await?;
    tracing::info!(id = %id, status = change.status.as_str(), "donation request status changed");
    Ok(Json(result))
}

/// Delete a donation request
pub async fn delete_request(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let result = state
        .store
        .delete_one(Collection::DonationRequests, &Filter::by_id(&id)?)
        .await?;
    Ok(Json(result))
}
