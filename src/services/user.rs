//! User service
//!
//! Implements business logic for user accounts:
//! - Registration (the first user becomes staff)
//! - Login/logout with database-backed sessions
//! - Session validation and cleanup
//! - Profile self-edit

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, UpdateProfileInput, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Maximum username length
pub const USERNAME_MAX_LEN: usize = 150;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("Valid username regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Check a username against the allowed length and characters.
///
/// Returns the message shown next to the field when it is rejected.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("This field is required.".to_string());
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(format!(
            "Ensure this value has at most {} characters.",
            USERNAME_MAX_LEN
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    Ok(())
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime: Duration::days(session_days.max(1)),
        }
    }

    /// Register a new user.
    ///
    /// The very first account is created as staff.
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        validate_username(&username).map_err(UserServiceError::ValidationError)?;

        if input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Password cannot be empty".to_string(),
            ));
        }

        if self.username_taken(&username, None).await? {
            return Err(UserServiceError::UserExists(username));
        }

        let is_first = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?
            == 0;

        let password_hash = hash_password(&input.password)?;
        let user = User::new(username, input.email.trim().to_string(), password_hash, is_first);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Check credentials and open a session
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Session, User), UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .user_repo
            .get_by_username(username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        let session = Session::new(user.id, self.session_lifetime);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok((session, user))
    }

    /// Invalidate a session
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens yield `None`; an expired session is removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?;
        Ok(user)
    }

    /// Whether `username` belongs to an account other than `exclude_id`
    pub async fn username_taken(
        &self,
        username: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, UserServiceError> {
        let existing = self.get_by_username(username).await?;
        Ok(matches!(existing, Some(u) if Some(u.id) != exclude_id))
    }

    /// Update the requesting user's own profile
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)?;

        let username = input.username.trim().to_string();
        validate_username(&username).map_err(UserServiceError::ValidationError)?;

        if self.username_taken(&username, Some(user.id)).await? {
            return Err(UserServiceError::UserExists(username));
        }

        user.username = username;
        user.first_name = input.first_name.trim().to_string();
        user.last_name = input.last_name.trim().to_string();
        user.email = input.email.trim().to_string();

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn create_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            14,
        )
    }

    fn input(username: &str, password: &str) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: String::new(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.l+i-c_e@x").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("semi;colon").is_err());
        assert!(validate_username(&"a".repeat(150)).is_ok());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[tokio::test]
    async fn test_first_user_is_staff() {
        let service = create_test_service().await;

        let first = service.register(input("alice", "pw")).await.unwrap();
        let second = service.register(input("bob", "pw")).await.unwrap();

        assert!(first.is_staff);
        assert!(!second.is_staff);
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let service = create_test_service().await;
        service.register(input("alice", "pw")).await.unwrap();

        let result = service.register(input("alice", "other")).await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let service = create_test_service().await;
        assert!(matches!(
            service.register(input("bad name", "pw")).await,
            Err(UserServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.register(input("alice", "")).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = create_test_service().await;
        let user = service.register(input("alice", "secret")).await.unwrap();

        let (session, logged_in) = service.login("alice", "secret").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let resolved = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(resolved.username, "alice");

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let service = create_test_service().await;
        service.register(input("alice", "secret")).await.unwrap();

        assert!(matches!(
            service.login("alice", "wrong").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        assert!(matches!(
            service.login("nobody", "secret").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_token() {
        let service = create_test_service().await;
        assert!(service.validate_session("no-such-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = create_test_service().await;
        let alice = service.register(input("alice", "pw")).await.unwrap();
        service.register(input("bob", "pw")).await.unwrap();

        let updated = service
            .update_profile(
                alice.id,
                UpdateProfileInput {
                    username: "alice_l".to_string(),
                    first_name: "Alice".to_string(),
                    last_name: "Liddell".to_string(),
                    email: "alice@example.com".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "alice_l");
        assert_eq!(updated.email, "alice@example.com");

        let taken = service
            .update_profile(
                alice.id,
                UpdateProfileInput {
                    username: "bob".to_string(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(taken, Err(UserServiceError::UserExists(_))));

        // Keeping one's own username is allowed
        let same = service
            .update_profile(
                alice.id,
                UpdateProfileInput {
                    username: "alice_l".to_string(),
                    ..Default::default()
                },
            )
            .await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let service = create_test_service().await;
        service.register(input("alice", "pw")).await.unwrap();
        service.login("alice", "pw").await.unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 0);
    }
}
