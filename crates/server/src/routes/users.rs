use super::{require_same_user, without_fields, Pagination};
use crate::auth::Claims;
use crate::error::{ServerError, ServerResult};
use crate::extract::{Json, Query};
use crate::state::ServerState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Extension;
use lifedrops::model::fields;
use lifedrops::{Collection, Document, Filter, FindOptions, Role, Update, UserStatus, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Fields a user cannot change through their own profile update
const PROTECTED_PROFILE_FIELDS: [&str; 4] =
    [ID_FIELD, fields::EMAIL, fields::ROLE, fields::STATUS];

/// Query parameters for the admin user listing
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Query parameters for the public donor search
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorSearchQuery {
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub upazila: Option<String>,
}

/// Body of `PATCH /users/{id}/role`
#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

/// Body of `PATCH /users/{id}/status`
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: UserStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleResponse {
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminResponse {
    pub admin: bool,
}

/// Register a user. Registering an existing email is not an error; the
/// response says so and nothing is inserted.
pub async fn create_user(
    State(state): State<Arc<ServerState>>,
    Json(mut user): Json<Document>,
) -> ServerResult<impl IntoResponse> {
    let email = match user.get(fields::EMAIL) {
        Some(Value::String(email)) if !email.trim().is_empty() => email.trim().to_string(),
        _ => return Err(ServerError::BadRequest("email is required".to_string())),
    };

    // New accounts always start as active donors.
    user.insert(fields::EMAIL.to_string(), json!(email));
    user.insert(fields::ROLE.to_string(), json!(Role::Donor));
    user.insert(fields::STATUS.to_string(), json!(UserStatus::Active));
    user.remove(ID_FIELD);

    let by_email = Filter::new().eq(fields::EMAIL, email.as_str());
    let Some(result) = state
        .store
        .insert_if_absent(Collection::Users, &by_email, user)
        .await?
    else {
        return Ok(Json(json!({
            "message": "user already exists",
            "insertedId": null,
        })));
    };

    tracing::info!(email = %email, id = %result.inserted_id, "user registered");
    Ok(Json(serde_json::to_value(result)?))
}

/// List users, optionally by status (admin only)
pub async fn list_users(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<UserListQuery>,
    Query(pagination): Query<Pagination>,
) -> ServerResult<impl IntoResponse> {
    let filter = Filter::new().eq_opt(fields::STATUS, query.status.as_deref());
    let options = pagination.apply(FindOptions::new())?;
    let users = state.store.find(Collection::Users, &filter, &options).await?;
    Ok(Json(users))
}

/// Fetch one user profile by email
pub async fn get_user(
    State(state): State<Arc<ServerState>>,
    Path(email): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let user = state
        .store
        .find_one(Collection::Users, &Filter::new().eq(fields::EMAIL, email))
        .await?;
    Ok(Json(user))
}

/// Update the caller's own profile
pub async fn update_profile(
    State(state): State<Arc<ServerState>>,
    Extension(claims): Extension<Claims>,
    Path(email): Path<String>,
    Json(profile): Json<Document>,
) -> ServerResult<impl IntoResponse> {
    require_same_user(&claims, &email)?;

    let update = Update::set(without_fields(profile, &PROTECTED_PROFILE_FIELDS));
    if update.is_empty() {
        return Err(ServerError::BadRequest("no profile fields to update".to_string()));
    }
    let result = state
        .store
        .update_one(
            Collection::Users,
            &Filter::new().eq(fields::EMAIL, email),
            &update,
            false,
        )
        .await?;
    Ok(Json(result))
}

/// Role of a user, `null` when no such user exists
pub async fn get_role(
    State(state): State<Arc<ServerState>>,
    Path(email): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let role = state.role_of(&email).await?;
    Ok(Json(RoleResponse { role }))
}

/// Whether the caller is an admin. Callers may only ask about themselves.
pub async fn check_admin(
    State(state): State<Arc<ServerState>>,
    Extension(claims): Extension<Claims>,
    Path(email): Path<String>,
) -> ServerResult<impl IntoResponse> {
    require_same_user(&claims, &email)?;
    let admin = state.role_of(&email).await? == Some(Role::Admin);
    Ok(Json(AdminResponse { admin }))
}

/// Change a user's role (admin only)
pub async fn set_role(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(change): Json<RoleChange>,
) -> ServerResult<impl IntoResponse> {
    let result = state
        .store
        .update_one(
            Collection::Users,
            &Filter::by_id(&id)?,
            &Update::set_field(fields::ROLE, change.role.as_str()),
            false,
        )
        .await?;
    tracing::info!(user_id = %id, role = change.role.as_str(), "user role changed");
    Ok(Json(result))
}

/// Block or unblock a user (admin only)
pub async fn set_status(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> ServerResult<impl IntoResponse> {
    let result = state
        .store
        .update_one(
            Collection::Users,
            &Filter::by_id(&id)?,
            &Update::set_field(fields::STATUS, change.status.as_str()),
            false,
        )
        .await?;
    tracing::info!(user_id = %id, status = change.status.as_str(), "user status changed");
    Ok(Json(result))
}

/// Public donor search by blood group and location
pub async fn search_donors(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<DonorSearchQuery>,
) -> ServerResult<impl IntoResponse> {
    let filter = Filter::new()
        .eq(fields::ROLE, Role::Donor.as_str())
        .eq(fields::STATUS, UserStatus::Active.as_str())
        .eq_opt(fields::BLOOD_GROUP, query.blood_group.as_deref())
        .eq_opt(fields::DISTRICT, query.district.as_deref())
        .eq_opt(fields::UPAZILA, query.upazila.as_deref());
    let donors = state
        .store
        .find(Collection::Users, &filter, &FindOptions::default())
        .await?;
    Ok(Json(donors))
}
