//! Common handler utilities and shared types

use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::forms::FormErrors;
use crate::api::middleware::{AppState, PageError};
use crate::models::User;
use crate::theme::StandardTemplateVars;

/// `?page=` as typed; resolved against the item count by the service
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn raw(&self) -> Option<&str> {
        self.page.as_deref()
    }
}

/// Render a page template with the standard variables
pub fn render_page(
    state: &AppState,
    template: &str,
    context: &TeraContext,
    user: Option<&User>,
    request_path: &str,
) -> Result<Response, PageError> {
    let vars = StandardTemplateVars::new(request_path).with_user(user);
    let html = state
        .theme
        .render_with_standard_vars(template, context, &vars)?;
    Ok(Html(html).into_response())
}

/// Context for a form page: the submitted values plus their errors
pub fn form_context<F: serde::Serialize>(form: &F, errors: &FormErrors) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context
}
