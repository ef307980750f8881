//! API middleware
//!
//! Contains:
//! - Shared application state
//! - Session resolution (cookie or bearer token) for every request
//! - Extractors for the logged-in user
//! - Error types for HTML pages and the admin JSON API
//! - Rendering of error pages through the template engine

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::api::urls;
use crate::config::UploadConfig;
use crate::models::User;
use crate::services::{
    CategoryService, CategoryServiceError, CommentService, CommentServiceError, LocationService,
    LocationServiceError, PostService, PostServiceError, UserService, UserServiceError,
};
use crate::theme::{StandardTemplateVars, ThemeEngine};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub category_service: Arc<CategoryService>,
    pub location_service: Arc<LocationService>,
    pub theme: Arc<ThemeEngine>,
    pub upload_config: Arc<UploadConfig>,
    /// Session lifetime, for the cookie Max-Age
    pub session_days: i64,
}

/// Logged-in user extracted from request.
///
/// Rejects anonymous requests with a redirect to the login page that
/// returns to the requested path.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The logged-in user, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn as_ref(&self) -> Option<&User> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string());
                PageError::LoginRequired(next)
            })
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|au| au.0.clone()),
        ))
    }
}

// ============================================================================
// HTML page errors
// ============================================================================

/// Failure outcomes of an HTML handler
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Not found")]
    NotFound,

    /// Login required; carries the path to come back to
    #[error("Login required")]
    LoginRequired(String),

    /// Denied access that sends the user elsewhere
    #[error("Redirect to {0}")]
    Redirect(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Marks a response whose body is replaced by a rendered error page
#[derive(Debug, Clone, Copy)]
pub struct ErrorPage(pub StatusCode);

fn error_page_response(status: StatusCode) -> Response {
    let mut response = (status, status.canonical_reason().unwrap_or("Error")).into_response();
    response.extensions_mut().insert(ErrorPage(status));
    response
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::NotFound => error_page_response(StatusCode::NOT_FOUND),
            PageError::LoginRequired(next) => urls::found(&urls::login_with_next(&next)),
            PageError::Redirect(url) => urls::found(&url),
            PageError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            PageError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                error_page_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl From<PostServiceError> for PageError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound => PageError::NotFound,
            PostServiceError::NotOwner(id) => PageError::Redirect(urls::post_detail(id)),
            PostServiceError::ValidationError(message) => PageError::BadRequest(message),
            PostServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<CommentServiceError> for PageError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound | CommentServiceError::PostNotFound => PageError::NotFound,
            CommentServiceError::ValidationError(message) => PageError::BadRequest(message),
            CommentServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<CategoryServiceError> for PageError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::NotFound(_) => PageError::NotFound,
            CategoryServiceError::DuplicateSlug(slug) => {
                PageError::BadRequest(format!("Duplicate slug: {}", slug))
            }
            CategoryServiceError::ValidationError(message) => PageError::BadRequest(message),
            CategoryServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::NotFound => PageError::NotFound,
            UserServiceError::InternalError(e) => PageError::Internal(e),
            other => PageError::BadRequest(other.to_string()),
        }
    }
}

// ============================================================================
// Admin API errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!("Admin request failed: {:#}", e);
    ApiError::internal_error("Internal server error")
}

impl From<CategoryServiceError> for ApiError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::NotFound(id) => {
                ApiError::not_found(format!("Category not found: {}", id))
            }
            CategoryServiceError::DuplicateSlug(slug) => {
                ApiError::conflict(format!("Category slug already exists: {}", slug))
            }
            CategoryServiceError::ValidationError(message) => ApiError::validation_error(message),
            CategoryServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<LocationServiceError> for ApiError {
    fn from(e: LocationServiceError) -> Self {
        match e {
            LocationServiceError::NotFound(id) => {
                ApiError::not_found(format!("Location not found: {}", id))
            }
            LocationServiceError::ValidationError(message) => ApiError::validation_error(message),
            LocationServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound => ApiError::not_found("Post not found"),
            PostServiceError::NotOwner(id) => {
                ApiError::forbidden(format!("Not the author of post {}", id))
            }
            PostServiceError::ValidationError(message) => ApiError::validation_error(message),
            PostServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound => ApiError::not_found("Comment not found"),
            CommentServiceError::PostNotFound => ApiError::not_found("Post not found"),
            CommentServiceError::ValidationError(message) => ApiError::validation_error(message),
            CommentServiceError::InternalError(e) => internal(e),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Extract session token from request headers
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    let prefix = format!("{}=", SESSION_COOKIE);
    for cookie_header in headers.get_all(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix(&prefix) {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Resolve the session, if any, and attach the user to the request
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Staff authorization middleware for the admin API
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_staff {
        return Err(ApiError::forbidden("Staff privileges required"));
    }

    Ok(next.run(request).await)
}

/// Replace the body of responses marked with `ErrorPage` by the rendered
/// error template
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|au| au.0.clone());

    let response = next.run(request).await;

    let Some(ErrorPage(status)) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let (template, title) = if status == StatusCode::NOT_FOUND {
        ("pages/404.html", "Page not found")
    } else {
        ("pages/500.html", "Server error")
    };
    let vars = StandardTemplateVars::new(path).with_user(user.as_ref());
    let body = state
        .theme
        .render_with_fallback(template, &TeraContext::new(), &vars, title);

    (status, Html(body)).into_response()
}
