use crate::error::{ServerError, ServerResult};
use crate::extract::Json;
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of `POST /jwt`
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Issue an access token for the signed-in user
pub async fn issue_token(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<TokenRequest>,
) -> ServerResult<impl IntoResponse> {
    let email = request.email.trim();
    if email.is_empty() {
        return Err(ServerError::BadRequest("email is required".to_string()));
    }
    let token = state.tokens.issue(email)?;
    Ok(Json(TokenResponse { token }))
}
