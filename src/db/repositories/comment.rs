//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithAuthor};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of a post with their authors, oldest first
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;

    async fn update_text(&self, id: i64, text: &str) -> Result<()>;

    /// Delete a comment, returning whether it existed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! row_to_comment {
    ($row:expr) => {
        Comment {
            id: $row.get("id"),
            text: $row.get("text"),
            post_id: $row.get("post_id"),
            author_id: $row.get("author_id"),
            created_at: $row.get("created_at"),
        }
    };
}

macro_rules! row_to_comment_with_author {
    ($row:expr) => {
        CommentWithAuthor {
            id: $row.get("id"),
            text: $row.get("text"),
            post_id: $row.get("post_id"),
            author_id: $row.get("author_id"),
            author_username: $row.get("author_username"),
            created_at: $row.get("created_at"),
        }
    };
}

const LIST_FOR_POST: &str = r#"
    SELECT cm.id, cm.text, cm.post_id, cm.author_id, u.username AS author_username, cm.created_at
    FROM comments cm
    JOIN users u ON u.id = cm.author_id
    WHERE cm.post_id = ?
    ORDER BY cm.created_at ASC, cm.id ASC
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        let sql = "INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?, ?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&comment.text)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(comment.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&comment.text)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(comment.created_at)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            ..comment.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = "SELECT id, text, post_id, author_id, created_at FROM comments WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get comment")?;
                Ok(row.map(|row| row_to_comment!(row)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get comment")?;
                Ok(row.map(|row| row_to_comment!(row)))
            }
        }
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_FOR_POST)
                    .bind(post_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list comments")?;
                Ok(rows.iter().map(|row| row_to_comment_with_author!(row)).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_FOR_POST)
                    .bind(post_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list comments")?;
                Ok(rows.iter().map(|row| row_to_comment_with_author!(row)).collect())
            }
        }
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<()> {
        let sql = "UPDATE comments SET text = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(text)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update comment")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(text)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update comment")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM comments WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}
