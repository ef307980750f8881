//! Post pages
//!
//! - GET / - index listing of visible posts
//! - GET /posts/{id}/ - post detail with comments
//! - GET|POST /posts/create/ - new post (login required)
//! - GET|POST /posts/{id}/edit/ - edit post (author only)
//! - GET|POST /posts/{id}/delete/ - delete post (author only, GET confirms)

use axum::{
    extract::{Multipart, Path, Query, State},
    http::Uri,
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use tera::Context as TeraContext;

use crate::api::common::{form_context, render_page, PageQuery};
use crate::api::forms::{CommentForm, FormErrors, PostForm, ValidPost};
use crate::api::guards;
use crate::api::middleware::{AppState, AuthenticatedUser, MaybeUser, PageError};
use crate::api::upload::{check_image, read_post_submission, save_post_image, PostSubmission};
use crate::api::urls;
use crate::models::{Category, Location, Post, User};

const TEMPLATE_FORM: &str = "blog/create.html";

/// Routes for post pages
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/posts/create/", get(create_form).post(create_submit))
        .route("/posts/{id}/", get(detail))
        .route("/posts/{id}/edit/", get(edit_form).post(edit_submit))
        .route("/posts/{id}/delete/", get(delete_form).post(delete_submit))
}

/// GET / - publicly visible posts, newest first
pub async fn index(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let page_obj = state
        .post_service
        .list_index(query.raw(), Utc::now())
        .await?;

    let mut context = TeraContext::new();
    context.insert("page_obj", &page_obj);
    render_page(&state, "blog/index.html", &context, user.as_ref(), uri.path())
}

/// GET /posts/{id}/ - the author always sees the post, others only while
/// it is publicly visible
pub async fn detail(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Path(post_id): Path<i64>,
) -> Result<Response, PageError> {
    let post = state
        .post_service
        .get_for_viewer(post_id, user.id(), Utc::now())
        .await?;
    let comments = state.comment_service.list_for_post(post.id).await?;

    let mut context = form_context(&CommentForm::default(), &FormErrors::default());
    context.insert("post", &post);
    context.insert("comments", &comments);
    render_page(&state, "blog/detail.html", &context, user.as_ref(), uri.path())
}

/// GET /posts/create/
pub async fn create_form(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
) -> Result<Response, PageError> {
    let (categories, locations) = load_choices(&state).await?;
    render_post_form(
        &state,
        PostFormPage {
            mode: "create",
            post: None,
            form: &PostForm::blank(Utc::now()),
            errors: &FormErrors::default(),
            categories: &categories,
            locations: &locations,
        },
        &user,
        uri.path(),
    )
}

/// POST /posts/create/ - on success, go to the author's profile
pub async fn create_submit(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    uri: Uri,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let submission = read_post_submission(multipart).await?;
    let (categories, locations) = load_choices(&state).await?;

    let valid = match validate_submission(&state, &submission, &categories, &locations) {
        Ok(valid) => valid,
        Err(errors) => {
            return render_post_form(
                &state,
                PostFormPage {
                    mode: "create",
                    post: None,
                    form: &submission.form,
                    errors: &errors,
                    categories: &categories,
                    locations: &locations,
                },
                &user,
                uri.path(),
            );
        }
    };

    let image = match &submission.image {
        Some(image) => Some(save_post_image(image, &state.upload_config).await?),
        None => None,
    };
    state
        .post_service
        .create(user.id, valid.into_create(image))
        .await?;

    Ok(urls::found(&urls::profile(&user.username)))
}

/// GET /posts/{id}/edit/
pub async fn edit_form(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Path(post_id): Path<i64>,
) -> Result<Response, PageError> {
    let (post, owner) = owned_post(&state, post_id, &user).await?;
    let (categories, locations) = load_choices(&state).await?;

    render_post_form(
        &state,
        PostFormPage {
            mode: "edit",
            post: Some(&post),
            form: &PostForm::from_post(&post),
            errors: &FormErrors::default(),
            categories: &categories,
            locations: &locations,
        },
        &owner,
        uri.path(),
    )
}

/// POST /posts/{id}/edit/ - on success, back to the post
pub async fn edit_submit(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let (post, owner) = owned_post(&state, post_id, &user).await?;
    let submission = read_post_submission(multipart).await?;
    let (categories, locations) = load_choices(&state).await?;

    let valid = match validate_submission(&state, &submission, &categories, &locations) {
        Ok(valid) => valid,
        Err(errors) => {
            return render_post_form(
                &state,
                PostFormPage {
                    mode: "edit",
                    post: Some(&post),
                    form: &submission.form,
                    errors: &errors,
                    categories: &categories,
                    locations: &locations,
                },
                &owner,
                uri.path(),
            );
        }
    };

    let image = match &submission.image {
        Some(image) => Some(save_post_image(image, &state.upload_config).await?),
        None => None,
    };
    state
        .post_service
        .update(post_id, owner.id, valid.into_update(submission.image_change(image)))
        .await?;

    Ok(urls::found(&urls::post_detail(post_id)))
}

/// GET /posts/{id}/delete/ - confirmation page
pub async fn delete_form(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Path(post_id): Path<i64>,
) -> Result<Response, PageError> {
    let (post, owner) = owned_post(&state, post_id, &user).await?;

    let mut context = form_context(&PostForm::from_post(&post), &FormErrors::default());
    context.insert("mode", "delete");
    context.insert("post", &post);
    render_page(&state, TEMPLATE_FORM, &context, Some(&owner), uri.path())
}

/// POST /posts/{id}/delete/ - on success, go to the index
pub async fn delete_submit(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(post_id): Path<i64>,
) -> Result<Response, PageError> {
    let (_, owner) = owned_post(&state, post_id, &user).await?;
    state.post_service.delete(post_id, owner.id).await?;
    Ok(urls::found(&urls::index()))
}

/// Fetch a post and make sure the requester wrote it
async fn owned_post(
    state: &AppState,
    post_id: i64,
    user: &MaybeUser,
) -> Result<(Post, User), PageError> {
    let post = state.post_service.get(post_id).await?;
    guards::post_owner(&post, user.as_ref()).check()?;
    let owner = user
        .0
        .clone()
        .ok_or_else(|| PageError::Redirect(urls::post_detail(post_id)))?;
    Ok((post, owner))
}

async fn load_choices(state: &AppState) -> Result<(Vec<Category>, Vec<Location>), PageError> {
    let categories = state.post_service.categories_for_form().await?;
    let locations = state.post_service.locations_for_form().await?;
    Ok((categories, locations))
}

fn validate_submission(
    state: &AppState,
    submission: &PostSubmission,
    categories: &[Category],
    locations: &[Location],
) -> Result<ValidPost, FormErrors> {
    let (valid, mut errors) = match submission.form.validate(categories, locations) {
        Ok(valid) => (Some(valid), FormErrors::default()),
        Err(errors) => (None, errors),
    };

    if let Some(image) = &submission.image {
        if let Err(message) = check_image(image, &state.upload_config) {
            errors.add("image", message);
        }
        if submission.clear_image {
            errors.add(
                "image",
                "Please either submit a file or check the clear checkbox, not both.",
            );
        }
    }

    match valid {
        Some(valid) if errors.is_empty() => Ok(valid),
        _ => Err(errors),
    }
}

struct PostFormPage<'a> {
    mode: &'static str,
    post: Option<&'a Post>,
    form: &'a PostForm,
    errors: &'a FormErrors,
    categories: &'a [Category],
    locations: &'a [Location],
}

fn render_post_form(
    state: &AppState,
    page: PostFormPage<'_>,
    user: &User,
    request_path: &str,
) -> Result<Response, PageError> {
    let mut context = form_context(page.form, page.errors);
    context.insert("mode", page.mode);
    context.insert("post", &page.post);
    context.insert("categories", page.categories);
    context.insert("locations", page.locations);
    render_page(state, TEMPLATE_FORM, &context, Some(user), request_path)
}
