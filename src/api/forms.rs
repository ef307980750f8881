//! HTML forms
//!
//! Each form keeps the submitted values so an invalid submission can be
//! re-rendered as typed, and validates into the input type of its service.
//! Errors are collected per field in `FormErrors`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    Category, CreatePostInput, CreateUserInput, ImageChange, Location, Post, UpdatePostInput,
    UpdateProfileInput, User,
};
use crate::services::post::TITLE_MAX_LEN;
use crate::services::validate_username;

/// Key for errors that belong to no single field
pub const NON_FIELD: &str = "non_field";

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_DATETIME: &str = "Enter a valid date/time.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";

/// Value format of the `datetime-local` publication date input
pub const PUB_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

const NAME_MAX_LEN: usize = 150;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Valid email regex"));

/// Validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.add(NON_FIELD, message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(value)` when no error was recorded
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

fn max_length_message(max: usize, actual: usize) -> String {
    format!(
        "Ensure this value has at most {} characters (it has {}).",
        max, actual
    )
}

fn check_max_len(errors: &mut FormErrors, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        errors.add(field, max_length_message(max, len));
    }
}

fn check_email(errors: &mut FormErrors, email: &str) {
    if !email.is_empty() && !EMAIL_RE.is_match(email) {
        errors.add("email", INVALID_EMAIL);
    }
}

/// Parse the publication date as UTC.
///
/// Accepts the `datetime-local` format with or without seconds, a space
/// instead of `T`, or a bare date meaning midnight.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    for format in [
        PUB_DATE_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ============================================================================
// Post form
// ============================================================================

/// Post create/edit form (the image is handled separately)
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    /// Raw publication date as typed
    pub pub_date: String,
    pub location: Option<i64>,
    pub category: Option<i64>,
    pub is_published: bool,
    /// Select fields whose submitted value was not an id
    #[serde(skip)]
    malformed_choices: Vec<&'static str>,
}

/// A post form that passed validation
#[derive(Debug, Clone)]
pub struct ValidPost {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub is_published: bool,
}

impl PostForm {
    /// Empty form for a new post, publishing now
    pub fn blank(now: DateTime<Utc>) -> Self {
        Self {
            pub_date: now.format(PUB_DATE_FORMAT).to_string(),
            is_published: true,
            ..Default::default()
        }
    }

    /// Form pre-filled from a stored post
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date.format(PUB_DATE_FORMAT).to_string(),
            location: post.location_id,
            category: post.category_id,
            is_published: post.is_published,
            malformed_choices: Vec::new(),
        }
    }

    /// Record one submitted text field; unknown names are ignored
    pub fn set_field(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "text" => self.text = value,
            "pub_date" => self.pub_date = value,
            "location" => self.location = self.parse_choice("location", &value),
            "category" => self.category = self.parse_choice("category", &value),
            "is_published" => {
                self.is_published = matches!(value.as_str(), "on" | "true" | "1")
            }
            _ => {}
        }
    }

    fn parse_choice(&mut self, field: &'static str, value: &str) -> Option<i64> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match value.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                self.malformed_choices.push(field);
                None
            }
        }
    }

    /// Validate against the choices offered by the form
    pub fn validate(
        &self,
        categories: &[Category],
        locations: &[Location],
    ) -> Result<ValidPost, FormErrors> {
        let mut errors = FormErrors::default();

        let title = self.title.trim();
        if title.is_empty() {
            errors.add("title", REQUIRED);
        }
        check_max_len(&mut errors, "title", title, TITLE_MAX_LEN);

        if self.text.trim().is_empty() {
            errors.add("text", REQUIRED);
        }

        let pub_date = if self.pub_date.trim().is_empty() {
            errors.add("pub_date", REQUIRED);
            None
        } else {
            let parsed = parse_pub_date(&self.pub_date);
            if parsed.is_none() {
                errors.add("pub_date", INVALID_DATETIME);
            }
            parsed
        };

        for field in &self.malformed_choices {
            errors.add(field, INVALID_CHOICE);
        }
        if let Some(id) = self.category {
            if !categories.iter().any(|c| c.id == id) {
                errors.add("category", INVALID_CHOICE);
            }
        }
        if let Some(id) = self.location {
            if !locations.iter().any(|l| l.id == id) {
                errors.add("location", INVALID_CHOICE);
            }
        }

        match pub_date {
            Some(pub_date) if errors.is_empty() => Ok(ValidPost {
                title: title.to_string(),
                text: self.text.clone(),
                pub_date,
                location_id: self.location,
                category_id: self.category,
                is_published: self.is_published,
            }),
            _ => Err(errors),
        }
    }
}

impl ValidPost {
    pub fn into_create(self, image: Option<String>) -> CreatePostInput {
        CreatePostInput {
            title: self.title,
            text: self.text,
            pub_date: self.pub_date,
            location_id: self.location_id,
            category_id: self.category_id,
            image,
            is_published: self.is_published,
        }
    }

    pub fn into_update(self, image: ImageChange) -> UpdatePostInput {
        UpdatePostInput {
            title: self.title,
            text: self.text,
            pub_date: self.pub_date,
            location_id: self.location_id,
            category_id: self.category_id,
            image,
            is_published: self.is_published,
        }
    }
}

// ============================================================================
// Comment form
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        if self.text.trim().is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.into_result(self.text.clone())
    }
}

// ============================================================================
// Profile form
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl ProfileForm {
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }

    /// Field checks only; uniqueness is settled by the user service
    pub fn validate(&self) -> Result<UpdateProfileInput, FormErrors> {
        let mut errors = FormErrors::default();

        let username = self.username.trim();
        if let Err(message) = validate_username(username) {
            errors.add("username", message);
        }
        check_max_len(&mut errors, "first_name", self.first_name.trim(), NAME_MAX_LEN);
        check_max_len(&mut errors, "last_name", self.last_name.trim(), NAME_MAX_LEN);
        check_email(&mut errors, self.email.trim());

        errors.into_result(UpdateProfileInput {
            username: username.to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
        })
    }
}

// ============================================================================
// Registration and login forms
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<CreateUserInput, FormErrors> {
        let mut errors = FormErrors::default();

        let username = self.username.trim();
        if let Err(message) = validate_username(username) {
            errors.add("username", message);
        }
        check_email(&mut errors, self.email.trim());

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors.into_result(CreateUserInput {
            username: username.to_string(),
            email: self.email.trim().to_string(),
            password: self.password1.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(())
    }
}
