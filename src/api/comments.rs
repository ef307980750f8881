//! Comment pages
//!
//! - POST /posts/{id}/comment/ - add a comment (login required)
//! - GET|POST /posts/{id}/edit_comment/{comment_id}/ - edit own comment
//! - GET|POST /posts/{id}/delete_comment/{comment_id}/ - delete own comment

use axum::{
    extract::{Path, State},
    http::Uri,
    response::Response,
    routing::{get, post},
    Form, Router,
};

use crate::api::common::{form_context, render_page};
use crate::api::forms::{CommentForm, FormErrors};
use crate::api::guards;
use crate::api::middleware::{AppState, AuthenticatedUser, PageError};
use crate::api::urls;
use crate::models::{Comment, User};

const TEMPLATE: &str = "blog/comment.html";

/// Routes for comment pages
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/comment/", post(add_comment))
        .route(
            "/posts/{id}/edit_comment/{comment_id}/",
            get(edit_form).post(edit_submit),
        )
        .route(
            "/posts/{id}/delete_comment/{comment_id}/",
            get(delete_form).post(delete_submit),
        )
}

/// POST /posts/{id}/comment/
pub async fn add_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => {
            return render_comment_page(
                &state,
                "create",
                post_id,
                None,
                &form,
                &errors,
                &user,
                uri.path(),
            );
        }
    };

    state
        .comment_service
        .create(post_id, user.id, &text)
        .await?;

    Ok(urls::found(&urls::post_detail(post_id)))
}

/// GET /posts/{id}/edit_comment/{comment_id}/
pub async fn edit_form(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<Response, PageError> {
    let comment = owned_comment(&state, comment_id, &user).await?;
    let form = CommentForm {
        text: comment.text.clone(),
    };
    render_comment_page(
        &state,
        "edit",
        post_id,
        Some(&comment),
        &form,
        &FormErrors::default(),
        &user,
        uri.path(),
    )
}

/// POST /posts/{id}/edit_comment/{comment_id}/
pub async fn edit_submit(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let comment = owned_comment(&state, comment_id, &user).await?;

    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => {
            return render_comment_page(
                &state,
                "edit",
                post_id,
                Some(&comment),
                &form,
                &errors,
                &user,
                uri.path(),
            );
        }
    };

    state
        .comment_service
        .update(comment.id, user.id, &text)
        .await?;

    Ok(urls::found(&urls::post_detail(post_id)))
}

/// GET /posts/{id}/delete_comment/{comment_id}/ - confirmation page
pub async fn delete_form(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<Response, PageError> {
    let comment = owned_comment(&state, comment_id, &user).await?;
    let form = CommentForm {
        text: comment.text.clone(),
    };
    render_comment_page(
        &state,
        "delete",
        post_id,
        Some(&comment),
        &form,
        &FormErrors::default(),
        &user,
        uri.path(),
    )
}

/// POST /posts/{id}/delete_comment/{comment_id}/
pub async fn delete_submit(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<Response, PageError> {
    let comment = owned_comment(&state, comment_id, &user).await?;
    state.comment_service.delete(comment.id, user.id).await?;
    Ok(urls::found(&urls::post_detail(post_id)))
}

async fn owned_comment(state: &AppState, comment_id: i64, user: &User) -> Result<Comment, PageError> {
    let comment = state.comment_service.get(comment_id).await?;
    guards::comment_owner(&comment, user).check()?;
    Ok(comment)
}

#[allow(clippy::too_many_arguments)]
fn render_comment_page(
    state: &AppState,
    mode: &str,
    post_id: i64,
    comment: Option<&Comment>,
    form: &CommentForm,
    errors: &FormErrors,
    user: &User,
    request_path: &str,
) -> Result<Response, PageError> {
    let mut context = form_context(form, errors);
    context.insert("mode", mode);
    context.insert("post_id", &post_id);
    context.insert("comment", &comment);
    render_page(state, TEMPLATE, &context, Some(user), request_path)
}
