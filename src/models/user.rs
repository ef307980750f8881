//! User model
//!
//! Defines the registered user account and the inputs used to create or
//! edit one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
///
/// The first account ever registered is marked as staff and may use the
/// admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address, may be empty
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Whether the user may manage categories, locations and moderation
    pub is_staff: bool,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, is_staff: bool) -> Self {
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            first_name: String::new(),
            last_name: String::new(),
            password_hash,
            is_staff,
            created_at: Utc::now(),
        }
    }

    /// First and last name joined, or the username if both are empty
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
}

/// Input for a user editing their own profile
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
            false,
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "alice");
        assert!(user.first_name.is_empty());
        assert!(!user.is_staff);
    }

    #[test]
    fn test_display_name() {
        let mut user = User::new("alice".to_string(), String::new(), "hash".to_string(), false);
        assert_eq!(user.display_name(), "alice");

        user.first_name = "Alice".to_string();
        assert_eq!(user.display_name(), "Alice");

        user.last_name = "Liddell".to_string();
        assert_eq!(user.display_name(), "Alice Liddell");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("alice".to_string(), String::new(), "secret-hash".to_string(), true);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"is_staff\":true"));
    }
}
