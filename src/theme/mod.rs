//! Template engine
//!
//! Pages are rendered with Tera. The built-in templates are compiled into
//! the binary; any `.html` file under the configured theme directory
//! replaces the built-in template with the same relative name (or adds a
//! new one), so a deployment can restyle the site without rebuilding.

use anyhow::{Context, Result};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::ThemeError;

/// Site name shown in page titles and the header
pub const SITE_NAME: &str = "Blogicum";

/// Built-in templates, keyed by their Tera name
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("templates/base.html")),
    ("includes/paginator.html", include_str!("templates/includes/paginator.html")),
    ("includes/post_card.html", include_str!("templates/includes/post_card.html")),
    ("includes/form_errors.html", include_str!("templates/includes/form_errors.html")),
    ("blog/index.html", include_str!("templates/blog/index.html")),
    ("blog/category.html", include_str!("templates/blog/category.html")),
    ("blog/profile.html", include_str!("templates/blog/profile.html")),
    ("blog/detail.html", include_str!("templates/blog/detail.html")),
    ("blog/create.html", include_str!("templates/blog/create.html")),
    ("blog/comment.html", include_str!("templates/blog/comment.html")),
    ("blog/user.html", include_str!("templates/blog/user.html")),
    ("registration/login.html", include_str!("templates/registration/login.html")),
    (
        "registration/registration_form.html",
        include_str!("templates/registration/registration_form.html"),
    ),
    ("pages/404.html", include_str!("templates/pages/404.html")),
    ("pages/500.html", include_str!("templates/pages/500.html")),
];

/// Template engine for rendering pages
pub struct ThemeEngine {
    /// Tera template engine instance
    tera: Tera,
    /// Directory holding override templates
    override_path: PathBuf,
}

impl ThemeEngine {
    /// Create the engine from the built-in templates plus any overrides
    /// found under `override_path`. A missing directory means no overrides.
    pub fn new(override_path: &Path) -> Result<Self> {
        let override_path = override_path.to_path_buf();
        let tera = Self::load_templates(&override_path)?;
        Ok(Self {
            tera,
            override_path,
        })
    }

    /// Create the engine with the built-in templates only
    pub fn builtin() -> Result<Self> {
        Self::new(Path::new(""))
    }

    fn load_templates(override_path: &Path) -> Result<Tera> {
        let mut templates: Vec<(String, String)> = BUILTIN_TEMPLATES
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect();

        let mut overrides = Vec::new();
        if !override_path.as_os_str().is_empty() && override_path.is_dir() {
            collect_templates_from_dir(override_path, override_path, &mut overrides)?;
        }
        for (name, content) in overrides {
            tracing::debug!("Using override template '{}'", name);
            match templates.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = content,
                None => templates.push((name, content)),
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(format!("Failed to add templates: {}", chain(&e))))?;
        Ok(tera)
    }

    /// Re-read override templates from disk
    pub fn reload_templates(&mut self) -> Result<()> {
        self.tera = Self::load_templates(&self.override_path)?;
        Ok(())
    }

    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        if !self.has_template(template) {
            return Err(ThemeError::NotFound(template.to_string()).into());
        }
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!("Failed to render '{}': {}", template, chain(&e)))
                .into()
        })
    }

    /// Render a template with the standard page variables added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();

        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        full_context.insert("current_user", &standard_vars.current_user);

        self.render(template, &full_context)
    }

    /// Render a template, falling back to a plain HTML page on failure.
    ///
    /// Used for error pages, which must always produce a body.
    pub fn render_with_fallback(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
        title: &str,
    ) -> String {
        match self.render_with_standard_vars(template, context, standard_vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}", template, e);
                Self::simple_page(title)
            }
        }
    }

    /// Last-resort page used when even an error template fails
    fn simple_page(title: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body>
    <h1>{title}</h1>
    <p><a href="/">{site}</a></p>
</body>
</html>"#,
            title = title,
            site = SITE_NAME
        )
    }
}

/// Recursively collect `.html` files with names relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;

            // Forward slashes on every platform
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;

            templates.push((template_name, content));
        }
    }

    Ok(())
}

fn chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Variables every page template receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    /// Logged-in user, if any
    pub current_user: Option<CurrentUser>,
    /// Path of the current request
    pub request_path: String,
    /// Current year (for the footer)
    pub year: i32,
}

/// Current user information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
        }
    }
}

impl StandardTemplateVars {
    pub fn new(request_path: impl Into<String>) -> Self {
        Self {
            site_name: SITE_NAME.to_string(),
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    /// Set the current user
    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }
}
