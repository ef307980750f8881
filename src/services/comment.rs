//! Comment service
//!
//! Comments are written by logged-in users under existing posts. A comment
//! can only be edited or deleted by its author; for everyone else it does
//! not exist. Every accepted submission (new or edited) sends the comment
//! notification.

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CommentWithAuthor};
use crate::services::email::NotificationService;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Comment not found")]
    NotFound,

    #[error("Post not found")]
    PostNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    comment_repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
    notifications: Arc<NotificationService>,
}

impl CommentService {
    pub fn new(
        comment_repo: Arc<dyn CommentRepository>,
        post_repo: Arc<dyn PostRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            notifications,
        }
    }

    /// Comments of a post, oldest first
    pub async fn list_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        let comments = self
            .comment_repo
            .list_for_post(post_id)
            .await
            .context("Failed to list comments")?;
        Ok(comments)
    }

    pub async fn create(
        &self,
        post_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let text = validate_text(text)?;

        self.post_repo
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .ok_or(CommentServiceError::PostNotFound)?;

        let comment = Comment {
            id: 0,
            text,
            post_id,
            author_id,
            created_at: Utc::now(),
        };
        let created = self
            .comment_repo
            .create(&comment)
            .await
            .context("Failed to create comment")?;

        self.notifications.comment_submitted().await;
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.comment_repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or(CommentServiceError::NotFound)
    }

    /// Look up a comment owned by `author_id`.
    ///
    /// Someone else's comment is reported as `NotFound`.
    pub async fn get_owned(
        &self,
        id: i64,
        author_id: i64,
    ) -> Result<Comment, CommentServiceError> {
        let comment = self.get(id).await?;
        if comment.author_id != author_id {
            return Err(CommentServiceError::NotFound);
        }
        Ok(comment)
    }

    pub async fn update(
        &self,
        id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let mut comment = self.get_owned(id, author_id).await?;
        let text = validate_text(text)?;

        self.comment_repo
            .update_text(id, &text)
            .await
            .context("Failed to update comment")?;
        comment.text = text;

        self.notifications.comment_submitted().await;
        Ok(comment)
    }

    pub async fn delete(&self, id: i64, author_id: i64) -> Result<Comment, CommentServiceError> {
        let comment = self.get_owned(id, author_id).await?;
        self.comment_repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        Ok(comment)
    }

    /// Staff removal of any comment
    pub async fn admin_delete(&self, id: i64) -> Result<(), CommentServiceError> {
        let deleted = self
            .comment_repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        if !deleted {
            return Err(CommentServiceError::NotFound);
        }
        Ok(())
    }
}

fn validate_text(text: &str) -> Result<String, CommentServiceError> {
    if text.trim().is_empty() {
        return Err(CommentServiceError::ValidationError(
            "This field is required.".to_string(),
        ));
    }
    Ok(text.to_string())
}
