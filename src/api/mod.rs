//! HTTP layer - page handlers, the admin API and routing
//!
//! - Post, comment, category and profile pages (server-rendered HTML)
//! - Login, logout and registration pages
//! - Staff-only JSON admin API under /admin
//! - Uploaded media under /media

pub mod admin;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod common;
pub mod forms;
pub mod guards;
pub mod middleware;
pub mod posts;
pub mod profile;
pub mod upload;
pub mod urls;

use axum::{
    extract::DefaultBodyLimit, middleware as axum_middleware, response::IntoResponse, Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCommentRepository, SqlxLocationRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    CategoryService, CommentService, LocationService, MailTransport, NotificationService,
    PostService, UserService,
};
use crate::theme::ThemeEngine;

pub use middleware::{ApiError, AppState, PageError};

/// Room left in a request body for the text fields next to an image
const FORM_OVERHEAD: usize = 1024 * 1024;

/// Wire repositories and services into the shared state
pub fn build_state(
    pool: DynDatabasePool,
    mail_transport: Arc<dyn MailTransport>,
    config: &Config,
    theme: ThemeEngine,
) -> AppState {
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let category_repo = SqlxCategoryRepository::boxed(pool.clone());
    let location_repo = SqlxLocationRepository::boxed(pool.clone());
    let post_repo = SqlxPostRepository::boxed(pool.clone());
    let comment_repo = SqlxCommentRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());

    let notifications = Arc::new(NotificationService::new(mail_transport, &config.email));

    AppState {
        pool,
        user_service: Arc::new(UserService::new(
            user_repo.clone(),
            session_repo,
            config.auth.session_days,
        )),
        post_service: Arc::new(PostService::new(
            post_repo.clone(),
            category_repo.clone(),
            location_repo.clone(),
            user_repo,
        )),
        comment_service: Arc::new(CommentService::new(comment_repo, post_repo, notifications)),
        category_service: Arc::new(CategoryService::new(category_repo)),
        location_service: Arc::new(LocationService::new(location_repo)),
        theme: Arc::new(theme),
        upload_config: Arc::new(config.upload.clone()),
        session_days: config.auth.session_days,
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let admin_routes = admin::router()
        .route_layer(axum_middleware::from_fn(middleware::require_staff));

    let body_limit = usize::try_from(state.upload_config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD);

    Router::new()
        .merge(posts::router())
        .merge(comments::router())
        .merge(categories::router())
        .merge(profile::router())
        .merge(auth::router())
        .nest("/admin", admin_routes)
        .nest_service("/media", ServeDir::new(state.upload_config.path.clone()))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        // Outermost of the two so error pages know who is logged in
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    PageError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateCategoryInput, CreatePostInput, Post, User};
    use crate::services::email::testing::RecordingTransport;
    use axum::http::{header, HeaderValue, StatusCode};
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use serde_json::json;

    struct Fixture {
        server: TestServer,
        state: AppState,
        mail: Arc<RecordingTransport>,
        _media: tempfile::TempDir,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let media = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.upload.path = media.path().to_path_buf();

        let mail = Arc::new(RecordingTransport::default());
        let state = build_state(
            pool,
            mail.clone(),
            &config,
            ThemeEngine::builtin().unwrap(),
        );
        let server = TestServer::new(build_router(state.clone())).unwrap();

        Fixture {
            server,
            state,
            mail,
            _media: media,
        }
    }

    /// Register a user and open a session, returning the cookie to send
    async fn user_with_session(state: &AppState, username: &str) -> (User, HeaderValue) {
        state
            .user_service
            .register(crate::models::CreateUserInput {
                username: username.to_string(),
                email: String::new(),
                password: "secret-pass".to_string(),
            })
            .await
            .unwrap();
        let (session, user) = state
            .user_service
            .login(username, "secret-pass")
            .await
            .unwrap();
        let cookie = HeaderValue::from_str(&format!("session={}", session.id)).unwrap();
        (user, cookie)
    }

    async fn post_by(state: &AppState, author: &User, pub_date: chrono::DateTime<Utc>) -> Post {
        state
            .post_service
            .create(
                author.id,
                CreatePostInput {
                    title: "Hello world".to_string(),
                    text: "First post".to_string(),
                    pub_date,
                    location_id: None,
                    category_id: None,
                    image: None,
                    is_published: true,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_lists_post_in_published_category() {
        let fx = setup().await;
        let (author, _) = user_with_session(&fx.state, "author").await;
        let category = fx
            .state
            .category_service
            .create(CreateCategoryInput {
                title: "News".to_string(),
                description: String::new(),
                slug: "news".to_string(),
                is_published: true,
            })
            .await
            .unwrap();

        fx.state
            .post_service
            .create(
                author.id,
                CreatePostInput {
                    title: "Yesterday".to_string(),
                    text: "Body".to_string(),
                    pub_date: Utc::now() - Duration::days(1),
                    location_id: None,
                    category_id: Some(category.id),
                    image: None,
                    is_published: true,
                },
            )
            .await
            .unwrap();

        let response = fx.server.get("/").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.text();
        assert!(body.contains("Yesterday"));
        assert!(body.contains("Comments (0)"));

        let response = fx.server.get("/category/news/").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response.text().contains("Yesterday"));
    }

    #[tokio::test]
    async fn test_future_post_hidden_from_others_but_not_author() {
        let fx = setup().await;
        let (author, author_cookie) = user_with_session(&fx.state, "author").await;
        let post = post_by(&fx.state, &author, Utc::now() + Duration::days(1)).await;
        let path = format!("/posts/{}/", post.id);

        let index = fx.server.get("/").await;
        assert!(!index.text().contains("Hello world"));

        let anonymous = fx.server.get(&path).await;
        assert_eq!(anonymous.status_code(), StatusCode::NOT_FOUND);
        assert!(anonymous.text().contains("does not exist"));

        let own = fx
            .server
            .get(&path)
            .add_header(header::COOKIE, author_cookie)
            .await;
        assert_eq!(own.status_code(), StatusCode::OK);
        assert!(own.text().contains("Hello world"));
    }

    #[tokio::test]
    async fn test_comment_delete_only_by_its_author() {
        let fx = setup().await;
        let (owner, _) = user_with_session(&fx.state, "owner").await;
        let (commenter, commenter_cookie) = user_with_session(&fx.state, "commenter").await;
        let (_, stranger_cookie) = user_with_session(&fx.state, "stranger").await;
        let post = post_by(&fx.state, &owner, Utc::now() - Duration::hours(1)).await;

        let response = fx
            .server
            .post(&format!("/posts/{}/comment/", post.id))
            .add_header(header::COOKIE, commenter_cookie.clone())
            .form(&json!({ "text": "Nice post" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(fx.mail.count(), 1);

        let comments = fx.state.comment_service.list_for_post(post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author_id, commenter.id);
        let delete_path = format!("/posts/{}/delete_comment/{}/", post.id, comments[0].id);

        let denied = fx
            .server
            .post(&delete_path)
            .add_header(header::COOKIE, stranger_cookie)
            .await;
        assert_eq!(denied.status_code(), StatusCode::NOT_FOUND);

        let deleted = fx
            .server
            .post(&delete_path)
            .add_header(header::COOKIE, commenter_cookie)
            .await;
        assert_eq!(deleted.status_code(), StatusCode::FOUND);
        assert_eq!(
            deleted.header(header::LOCATION),
            format!("/posts/{}/", post.id).as_str()
        );
        assert!(fx
            .state
            .comment_service
            .list_for_post(post.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_empty_comment_rerenders_form() {
        let fx = setup().await;
        let (owner, cookie) = user_with_session(&fx.state, "owner").await;
        let post = post_by(&fx.state, &owner, Utc::now() - Duration::hours(1)).await;

        let response = fx
            .server
            .post(&format!("/posts/{}/comment/", post.id))
            .add_header(header::COOKIE, cookie)
            .form(&json!({ "text": "   " }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response.text().contains("This field is required."));
        assert_eq!(fx.mail.count(), 0);
    }

    #[tokio::test]
    async fn test_login_required_pages_redirect_to_login() {
        let fx = setup().await;

        let response = fx.server.get("/posts/create/").await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(
            response.header(header::LOCATION),
            "/auth/login/?next=%2Fposts%2Fcreate%2F"
        );

        let response = fx.server.get("/profile/edit").await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_non_author_edit_redirects_to_post() {
        let fx = setup().await;
        let (author, _) = user_with_session(&fx.state, "author").await;
        let (_, other_cookie) = user_with_session(&fx.state, "other").await;
        let post = post_by(&fx.state, &author, Utc::now() - Duration::hours(1)).await;
        let detail = format!("/posts/{}/", post.id);

        let response = fx
            .server
            .get(&format!("/posts/{}/edit/", post.id))
            .add_header(header::COOKIE, other_cookie.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.header(header::LOCATION), detail.as_str());

        let response = fx
            .server
            .post(&format!("/posts/{}/delete/", post.id))
            .add_header(header::COOKIE, other_cookie)
            .await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.header(header::LOCATION), detail.as_str());
        assert!(fx.state.post_service.get(post.id).await.is_ok());

        let anonymous = fx.server.get(&format!("/posts/{}/edit/", post.id)).await;
        assert_eq!(anonymous.header(header::LOCATION), detail.as_str());
    }

    #[tokio::test]
    async fn test_create_post_from_multipart_form() {
        let fx = setup().await;
        let (_, cookie) = user_with_session(&fx.state, "writer").await;

        let form = MultipartForm::new()
            .add_text("title", "Multipart post")
            .add_text("text", "Written in a form")
            .add_text("pub_date", "2024-01-02T10:30")
            .add_text("is_published", "on");
        let response = fx
            .server
            .post("/posts/create/")
            .add_header(header::COOKIE, cookie.clone())
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.header(header::LOCATION), "/profile/writer/");

        let index = fx.server.get("/").await;
        assert!(index.text().contains("Multipart post"));

        let invalid = MultipartForm::new()
            .add_text("title", "")
            .add_text("text", "No title")
            .add_text("pub_date", "2024-01-02T10:30");
        let response = fx
            .server
            .post("/posts/create/")
            .add_header(header::COOKIE, cookie)
            .multipart(invalid)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response.text().contains("No title"));
    }

    #[tokio::test]
    async fn test_uploaded_image_is_served_as_image() {
        let fx = setup().await;
        let (_, cookie) = user_with_session(&fx.state, "writer").await;

        let image = Part::bytes(b"<script>alert(1)</script>".to_vec())
            .file_name("evil.html")
            .mime_type("image/png");
        let form = MultipartForm::new()
            .add_text("title", "With image")
            .add_text("text", "Body")
            .add_text("pub_date", "2024-01-02T10:30")
            .add_text("is_published", "on")
            .add_part("image", image);
        let response = fx
            .server
            .post("/posts/create/")
            .add_header(header::COOKIE, cookie)
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), StatusCode::FOUND);

        let page = fx
            .state
            .post_service
            .list_index(None, Utc::now())
            .await
            .unwrap();
        let stored = page.items[0].image.clone().unwrap();
        assert!(stored.starts_with("posts_images/"));
        assert!(stored.ends_with(".png"));

        let media = fx.server.get(&format!("/media/{}", stored)).await;
        assert_eq!(media.status_code(), StatusCode::OK);
        assert_eq!(media.header(header::CONTENT_TYPE), "image/png");
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_follows_next() {
        let fx = setup().await;
        user_with_session(&fx.state, "reader").await;

        let response = fx
            .server
            .post("/auth/login/")
            .form(&json!({
                "username": "reader",
                "password": "secret-pass",
                "next": "/profile/reader/",
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.header(header::LOCATION), "/profile/reader/");
        let cookie = response.header(header::SET_COOKIE);
        assert!(cookie.to_str().unwrap().starts_with("session="));

        let response = fx
            .server
            .post("/auth/login/")
            .form(&json!({
                "username": "reader",
                "password": "wrong",
                "next": "https://evil.example/",
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response.text().contains("Please enter a correct username and password"));
    }

    #[tokio::test]
    async fn test_registration_and_duplicate_username() {
        let fx = setup().await;
        let form = json!({
            "username": "newbie",
            "email": "newbie@example.com",
            "password1": "pass-word-1",
            "password2": "pass-word-1",
        });

        let response = fx.server.post("/auth/registration/").form(&form).await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.header(header::LOCATION), "/");

        let response = fx.server.post("/auth/registration/").form(&form).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response
            .text()
            .contains("A user with that username already exists."));
    }

    #[tokio::test]
    async fn test_unknown_pages_are_404() {
        let fx = setup().await;
        assert_eq!(
            fx.server.get("/category/missing/").await.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            fx.server.get("/profile/nobody/").await.status_code(),
            StatusCode::NOT_FOUND
        );
        let response = fx.server.get("/no/such/page").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert!(response.text().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_admin_api_requires_staff() {
        let fx = setup().await;
        // The first registered account is staff
        let (_, staff_cookie) = user_with_session(&fx.state, "boss").await;
        let (_, user_cookie) = user_with_session(&fx.state, "plain").await;

        let anonymous = fx.server.get("/admin/categories").await;
        assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

        let forbidden = fx
            .server
            .get("/admin/categories")
            .add_header(header::COOKIE, user_cookie)
            .await;
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let body = json!({ "title": "Travel", "slug": "travel" });
        let created = fx
            .server
            .post("/admin/categories")
            .add_header(header::COOKIE, staff_cookie.clone())
            .json(&body)
            .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);
        assert_eq!(created.json::<serde_json::Value>()["slug"], "travel");

        let duplicate = fx
            .server
            .post("/admin/categories")
            .add_header(header::COOKIE, staff_cookie)
            .json(&body)
            .await;
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            duplicate.json::<serde_json::Value>()["error"]["code"],
            "CONFLICT"
        );
    }

    #[tokio::test]
    async fn test_admin_can_hide_post() {
        let fx = setup().await;
        let (staff, staff_cookie) = user_with_session(&fx.state, "boss").await;
        let post = post_by(&fx.state, &staff, Utc::now() - Duration::hours(1)).await;

        let response = fx
            .server
            .patch(&format!("/admin/posts/{}", post.id))
            .add_header(header::COOKIE, staff_cookie.clone())
            .json(&json!({ "is_published": false }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<serde_json::Value>()["is_published"], false);

        let listing = fx
            .server
            .get("/admin/posts?is_published=false")
            .add_header(header::COOKIE, staff_cookie)
            .await;
        assert_eq!(listing.json::<serde_json::Value>()["total"], 1);

        let index = fx.server.get("/").await;
        assert!(!index.text().contains("Hello world"));
    }
}
