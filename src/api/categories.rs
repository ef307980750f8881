//! Category listing
//!
//! - GET /category/{slug}/ - visible posts of a published category

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use tera::Context as TeraContext;

use crate::api::common::{render_page, PageQuery};
use crate::api::middleware::{AppState, MaybeUser, PageError};

pub fn router() -> Router<AppState> {
    Router::new().route("/category/{slug}/", get(category_posts))
}

/// GET /category/{slug}/ - unknown and unpublished categories are both 404
pub async fn category_posts(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let category = state.category_service.get_published_by_slug(&slug).await?;
    let page_obj = state
        .post_service
        .list_category(&category, query.raw(), Utc::now())
        .await?;

    let mut context = TeraContext::new();
    context.insert("category", &category);
    context.insert("page_obj", &page_obj);
    render_page(&state, "blog/category.html", &context, user.as_ref(), uri.path())
}
