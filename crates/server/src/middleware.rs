use crate::auth::{bearer_token, Claims};
use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use lifedrops::Role;
use std::sync::Arc;

/// Access token verification middleware
///
/// On success the token's [`Claims`] are available to handlers as an
/// `Extension<Claims>`.
pub async fn verify_token(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(ServerError::Unauthorized)?;

    let claims = state.tokens.verify(token)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Admin-only gate. Must run after [`verify_token`].
pub async fn verify_admin(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let email = caller_email(&request)?;
    let role = state.role_of(&email).await?;
    if role != Some(Role::Admin) {
        return Err(ServerError::Forbidden);
    }
    Ok(next.run(request).await)
}

/// Admin-or-volunteer gate. Must run after [`verify_token`].
pub async fn verify_staff(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let email = caller_email(&request)?;
    let role = state.role_of(&email).await?;
    if !role.is_some_and(|r| r.is_staff()) {
        return Err(ServerError::Forbidden);
    }
    Ok(next.run(request).await)
}

/// Email of the verified caller. Copied out so no borrow of the request is
/// held across the role lookup.
fn caller_email(request: &Request) -> Result<String, ServerError> {
    request
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.email.clone())
        .ok_or(ServerError::Unauthorized)
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    // Generate or extract request ID
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Add to request extensions for handlers to access
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Request ID as stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Logging and metrics middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    tracing::info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "Request started"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(duration.as_secs_f64());

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}
