//! Admin API endpoints
//!
//! Staff-only JSON management of the content that has no page of its own:
//! - GET/POST /admin/categories, PUT/DELETE /admin/categories/{id}
//! - GET/POST /admin/locations, PUT/DELETE /admin/locations/{id}
//! - GET /admin/posts - search and moderation listing
//! - PATCH /admin/posts/{id} - publish, hide, fix text or category
//! - DELETE /admin/comments/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    AdminPostPatch, Category, CreateCategoryInput, CreateLocationInput, Location, PagedResult,
    Post, PostWithMeta, UpdateCategoryInput, UpdateLocationInput,
};

/// Build admin router; callers wrap it with the staff check
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", put(update_category).delete(delete_category))
        .route("/locations", get(list_locations).post(create_location))
        .route("/locations/{id}", put(update_location).delete(delete_location))
        .route("/posts", get(list_posts))
        .route("/posts/{id}", patch(patch_post))
        .route("/comments/{id}", delete(delete_comment))
}

// ============================================================================
// Categories
// ============================================================================

/// GET /admin/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state.category_service.list().await?;
    Ok(Json(categories))
}

/// POST /admin/categories
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /admin/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    let category = state.category_service.update(id, body).await?;
    Ok(Json(category))
}

/// DELETE /admin/categories/{id} - posts of the category are kept, detached
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Locations
// ============================================================================

async fn list_locations(State(state): State<AppState>) -> Result<Json<Vec<Location>>, ApiError> {
    let locations = state.location_service.list().await?;
    Ok(Json(locations))
}

async fn create_location(
    State(state): State<AppState>,
    Json(body): Json<CreateLocationInput>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    let location = state.location_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateLocationInput>,
) -> Result<Json<Location>, ApiError> {
    let location = state.location_service.update(id, body).await?;
    Ok(Json(location))
}

async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.location_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Posts and comments
// ============================================================================

/// Query parameters for the moderation listing
#[derive(Debug, Default, Deserialize)]
pub struct AdminPostsQuery {
    pub search: Option<String>,
    pub is_published: Option<bool>,
    pub page: Option<String>,
}

/// GET /admin/posts
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<AdminPostsQuery>,
) -> Result<Json<PagedResult<PostWithMeta>>, ApiError> {
    let posts = state
        .post_service
        .admin_list(
            query.search.as_deref(),
            query.is_published,
            query.page.as_deref(),
        )
        .await?;
    Ok(Json(posts))
}

/// PATCH /admin/posts/{id}
async fn patch_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AdminPostPatch>,
) -> Result<Json<Post>, ApiError> {
    let post = state.post_service.admin_patch(id, body).await?;
    tracing::info!(post_id = id, "Post moderated");
    Ok(Json(post))
}

/// DELETE /admin/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.admin_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
