//! Account pages
//!
//! - GET|POST /auth/login/ - log in, then go to `next` or the index
//! - POST /auth/logout/ - end the session
//! - GET|POST /auth/registration/ - sign up

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Uri},
    response::Response,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

use crate::api::common::{form_context, render_page};
use crate::api::forms::{FormErrors, LoginForm, RegistrationForm};
use crate::api::middleware::{extract_session_token, AppState, MaybeUser, PageError, SESSION_COOKIE};
use crate::api::urls;
use crate::services::UserServiceError;

const TEMPLATE_LOGIN: &str = "registration/login.html";
const TEMPLATE_REGISTRATION: &str = "registration/registration_form.html";

const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login/", get(login_form).post(login_submit))
        .route("/auth/logout/", post(logout))
        .route(
            "/auth/registration/",
            get(registration_form).post(registration_submit),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// GET /auth/login/
pub async fn login_form(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Query(query): Query<NextQuery>,
) -> Result<Response, PageError> {
    let form = LoginForm {
        next: urls::safe_next(query.next.as_deref()),
        ..LoginForm::default()
    };
    render_login(&state, &form, &FormErrors::default(), user, uri.path())
}

/// POST /auth/login/
pub async fn login_submit(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    if let Err(errors) = form.validate() {
        return render_login(&state, &form, &errors, user, uri.path());
    }

    let (session, logged_in) = match state.user_service.login(&form.username, &form.password).await
    {
        Ok(result) => result,
        Err(UserServiceError::AuthenticationError(_)) => {
            let mut errors = FormErrors::default();
            errors.add_non_field(INVALID_LOGIN);
            return render_login(&state, &form, &errors, user, uri.path());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = logged_in.id, "User logged in");

    let target = urls::safe_next(form.next.as_deref()).unwrap_or_else(urls::index);
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session.id,
        state.session_days * 24 * 60 * 60
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| anyhow::anyhow!("Invalid session cookie: {}", e))?;

    let mut response = urls::found(&target);
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// POST /auth/logout/
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, PageError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    let clear_cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    let clear_cookie = HeaderValue::from_str(&clear_cookie)
        .map_err(|e| anyhow::anyhow!("Invalid session cookie: {}", e))?;

    let mut response = urls::found(&urls::index());
    response.headers_mut().insert(header::SET_COOKIE, clear_cookie);
    Ok(response)
}

/// GET /auth/registration/
pub async fn registration_form(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
) -> Result<Response, PageError> {
    let context = form_context(&RegistrationForm::default(), &FormErrors::default());
    render_page(&state, TEMPLATE_REGISTRATION, &context, user.as_ref(), uri.path())
}

/// POST /auth/registration/ - on success, go to the index
pub async fn registration_submit(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, PageError> {
    let rerender = |errors: FormErrors| {
        let context = form_context(&form, &errors);
        render_page(&state, TEMPLATE_REGISTRATION, &context, user.as_ref(), uri.path())
    };

    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return rerender(errors),
    };

    match state.user_service.register(input).await {
        Ok(_) => Ok(urls::found(&urls::index())),
        Err(UserServiceError::UserExists(_)) => {
            let mut errors = FormErrors::default();
            errors.add("username", "A user with that username already exists.");
            rerender(errors)
        }
        Err(UserServiceError::ValidationError(message)) => {
            let mut errors = FormErrors::default();
            errors.add_non_field(message);
            rerender(errors)
        }
        Err(e) => Err(e.into()),
    }
}

fn render_login(
    state: &AppState,
    form: &LoginForm,
    errors: &FormErrors,
    user: MaybeUser,
    request_path: &str,
) -> Result<Response, PageError> {
    let mut context = form_context(form, errors);
    context.insert("next", form.next.as_deref().unwrap_or(""));
    render_page(state, TEMPLATE_LOGIN, &context, user.as_ref(), request_path)
}
