use crate::error::{ServerError, ServerResult};
use crate::extract::{Json, Query};
use crate::state::ServerState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use lifedrops::model::fields;
use lifedrops::{
    BlogStatus, Collection, Document, Filter, FindOptions, SortOrder, Update, ID_FIELD,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct BlogQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `PATCH /blogs/{id}/status`
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: BlogStatus,
}

/// List blog posts, newest first
pub async fn list_blogs(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<BlogQuery>,
) -> ServerResult<impl IntoResponse> {
    let filter = Filter::new().eq_opt(fields::STATUS, query.status.as_deref());
    let options = FindOptions::new().sorted_by(fields::CREATED_AT, SortOrder::Descending);
    let blogs = state.store.find(Collection::Blogs, &filter, &options).await?;
    Ok(Json(blogs))
}

pub async fn get_blog(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let blog = state
        .store
        .find_one(Collection::Blogs, &Filter::by_id(&id)?)
        .await?;
    Ok(Json(blog))
}

/// Create a blog post (admins and volunteers). Posts start as drafts.
pub async fn create_blog(
    State(state): State<Arc<ServerState>>,
    Json(mut blog): Json<Document>,
) -> ServerResult<impl IntoResponse> {
    match blog.get(fields::TITLE) {
        Some(Value::String(title)) if !title.trim().is_empty() => {}
        _ => return Err(ServerError::BadRequest("title is required".to_string())),
    }

    blog.remove(ID_FIELD);
    blog.insert(fields::STATUS.to_string(), json!(BlogStatus::Draft));
    blog.entry(fields::CREATED_AT)
        .or_insert_with(|| json!(super::now_rfc3339()));

    let result = state.store.insert_one(Collection::Blogs, blog).await?;
    tracing::info!(id = %result.inserted_id, "blog created");
    Ok(Json(result))
}

/// Publish or unpublish a blog post (admin only)
pub async fn set_status(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> ServerResult<impl IntoResponse> {
    let result = state
        .store
        .update_one(
            Collection::Blogs,
            &Filter::by_id(&id)?,
            &Update::set_field(fields::STATUS, change.status.as_str()),
            false,
        )
        .await?;
    Ok(Json(result))
}

/// Delete a blog post (admin only)
pub async fn delete_blog(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let result = state
        .store
        .delete_one(Collection::Blogs, &Filter::by_id(&id)?)
        .await?;
    Ok(Json(result))
}
