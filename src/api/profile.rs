//! Profile pages
//!
//! - GET /profile/{username}/ - a user's page with all of their posts
//! - GET|POST /profile/edit - edit the requester's own account

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::Response,
    routing::get,
    Form, Router,
};
use tera::Context as TeraContext;

use crate::api::common::{form_context, render_page, PageQuery};
use crate::api::forms::{FormErrors, ProfileForm};
use crate::api::middleware::{AppState, AuthenticatedUser, MaybeUser, PageError};
use crate::api::urls;
use crate::services::UserServiceError;

const TEMPLATE_EDIT: &str = "blog/user.html";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile/edit", get(edit_form).post(edit_submit))
        .route("/profile/{username}/", get(profile_posts))
}

/// GET /profile/{username}/
pub async fn profile_posts(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let (profile, page_obj) = state
        .post_service
        .list_profile(&username, query.raw())
        .await?;

    let mut context = TeraContext::new();
    context.insert("profile", &profile);
    context.insert("page_obj", &page_obj);
    render_page(&state, "blog/profile.html", &context, user.as_ref(), uri.path())
}

/// GET /profile/edit
pub async fn edit_form(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
) -> Result<Response, PageError> {
    let context = form_context(&ProfileForm::from_user(&user), &FormErrors::default());
    render_page(&state, TEMPLATE_EDIT, &context, Some(&user), uri.path())
}

/// POST /profile/edit - on success, go to the index
pub async fn edit_submit(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    Form(form): Form<ProfileForm>,
) -> Result<Response, PageError> {
    let rerender = |errors: FormErrors| {
        let context = form_context(&form, &errors);
        render_page(&state, TEMPLATE_EDIT, &context, Some(&user), uri.path())
    };

    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return rerender(errors),
    };

    match state.user_service.update_profile(user.id, input).await {
        Ok(_) => Ok(urls::found(&urls::index())),
        Err(UserServiceError::UserExists(_)) => {
            let mut errors = FormErrors::default();
            errors.add("username", "A user with that username already exists.");
            rerender(errors)
        }
        Err(UserServiceError::ValidationError(message)) => {
            let mut errors = FormErrors::default();
            errors.add("username", message);
            rerender(errors)
        }
        Err(e) => Err(e.into()),
    }
}
