//! Post service
//!
//! Implements business logic for posts:
//! - Public listings (index, category page) through the visibility filter
//! - Profile listing with every post of one author
//! - Detail lookup where the author always sees their own post
//! - Author create/update/delete with ownership checks
//! - Staff moderation (search, publish toggle, text/category edits)

use crate::db::repositories::{
    CategoryRepository, LocationRepository, PostRepository, UserRepository,
};
use crate::models::{
    AdminPostPatch, Category, CreatePostInput, ListParams, Location, PagedResult, Post, PostFilter,
    PostWithMeta, UpdatePostInput, User, POSTS_PER_PAGE,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const TITLE_MAX_LEN: usize = 256;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Missing, or hidden from the requester
    #[error("Post not found")]
    NotFound,

    /// The requester is not the post's author
    #[error("Not the author of post {0}")]
    NotOwner(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Post service for listings, detail lookup and authoring
pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    location_repo: Arc<dyn LocationRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl PostService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        location_repo: Arc<dyn LocationRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            post_repo,
            category_repo,
            location_repo,
            user_repo,
        }
    }

    /// Run the canonical listing query for one page
    async fn page(
        &self,
        filter: &PostFilter,
        raw_page: Option<&str>,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        let total = self
            .post_repo
            .count(filter)
            .await
            .context("Failed to count posts")?;
        let params = ListParams::resolve(raw_page, POSTS_PER_PAGE, total);
        let items = self
            .post_repo
            .list(filter, &params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Publicly visible posts, newest first
    pub async fn list_index(
        &self,
        raw_page: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        self.page(&PostFilter::visible_at(now), raw_page).await
    }

    /// Publicly visible posts of a published category.
    ///
    /// `category` must already have been resolved with
    /// `CategoryService::get_published_by_slug`.
    pub async fn list_category(
        &self,
        category: &Category,
        raw_page: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        let filter = PostFilter::visible_at(now).in_category(category.id);
        self.page(&filter, raw_page).await
    }

    /// Every post of a user, regardless of visibility
    pub async fn list_profile(
        &self,
        username: &str,
        raw_page: Option<&str>,
    ) -> Result<(User, PagedResult<PostWithMeta>), PostServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?
            .ok_or(PostServiceError::NotFound)?;
        let posts = self.page(&PostFilter::by_author(user.id), raw_page).await?;
        Ok((user, posts))
    }

    /// Fetch a post for its detail page.
    ///
    /// The author sees their post unconditionally; everyone else only while
    /// it is publicly visible at `now`.
    pub async fn get_for_viewer(
        &self,
        id: i64,
        viewer_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<PostWithMeta, PostServiceError> {
        let post = self
            .post_repo
            .get_with_meta(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)?;

        if viewer_id == Some(post.author.id) || post.is_visible_at(now) {
            Ok(post)
        } else {
            Err(PostServiceError::NotFound)
        }
    }

    /// Fetch the stored post, without any visibility rule
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.post_repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)
    }

    pub async fn create(
        &self,
        author_id: i64,
        input: CreatePostInput,
    ) -> Result<Post, PostServiceError> {
        let title = validate_title(&input.title)?;
        validate_text(&input.text)?;
        self.check_references(input.category_id, input.location_id)
            .await?;

        let post = Post {
            id: 0,
            title,
            text: input.text,
            pub_date: input.pub_date,
            author_id,
            location_id: input.location_id,
            category_id: input.category_id,
            image: input.image,
            is_published: input.is_published,
            created_at: Utc::now(),
        };

        let created = self
            .post_repo
            .create(&post)
            .await
            .context("Failed to create post")?;

        tracing::info!(post_id = created.id, author_id, "Post created");
        Ok(created)
    }

    /// Rewrite a post from the author's edit form
    pub async fn update(
        &self,
        id: i64,
        requester_id: i64,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        let mut post = self.get(id).await?;
        if post.author_id != requester_id {
            return Err(PostServiceError::NotOwner(id));
        }

        validate_title(&input.title)?;
        validate_text(&input.text)?;
        self.check_references(input.category_id, input.location_id)
            .await?;

        input.apply(&mut post);
        post.title = post.title.trim().to_string();

        let updated = self
            .post_repo
            .update(&post)
            .await
            .context("Failed to update post")?;
        Ok(updated)
    }

    /// Delete a post and, through the schema, its comments
    pub async fn delete(&self, id: i64, requester_id: i64) -> Result<Post, PostServiceError> {
        let post = self.get(id).await?;
        if post.author_id != requester_id {
            return Err(PostServiceError::NotOwner(id));
        }
        self.post_repo
            .delete(id)
            .await
            .context("Failed to delete post")?;

        tracing::info!(post_id = id, "Post deleted");
        Ok(post)
    }

    /// Staff listing: optional title search and published filter, newest first
    pub async fn admin_list(
        &self,
        search: Option<&str>,
        is_published: Option<bool>,
        raw_page: Option<&str>,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        let filter = PostFilter {
            title_contains: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            is_published,
            ..Default::default()
        };
        self.page(&filter, raw_page).await
    }

    /// Staff edit of the moderated fields
    pub async fn admin_patch(
        &self,
        id: i64,
        patch: AdminPostPatch,
    ) -> Result<Post, PostServiceError> {
        let mut post = self.get(id).await?;

        if let Some(text) = patch.text {
            validate_text(&text)?;
            post.text = text;
        }
        if let Some(is_published) = patch.is_published {
            post.is_published = is_published;
        }
        if let Some(category_id) = patch.category_id {
            self.check_references(category_id, None).await?;
            post.category_id = category_id;
        }

        let updated = self
            .post_repo
            .update(&post)
            .await
            .context("Failed to update post")?;
        Ok(updated)
    }

    /// Choices for the category select of the post form
    pub async fn categories_for_form(&self) -> Result<Vec<Category>, PostServiceError> {
        let categories = self
            .category_repo
            .list()
            .await
            .context("Failed to list categories")?;
        Ok(categories)
    }

    /// Choices for the location select of the post form
    pub async fn locations_for_form(&self) -> Result<Vec<Location>, PostServiceError> {
        let locations = self
            .location_repo
            .list()
            .await
            .context("Failed to list locations")?;
        Ok(locations)
    }

    async fn check_references(
        &self,
        category_id: Option<i64>,
        location_id: Option<i64>,
    ) -> Result<(), PostServiceError> {
        if let Some(id) = category_id {
            let exists = self
                .category_repo
                .get_by_id(id)
                .await
                .context("Failed to get category")?
                .is_some();
            if !exists {
                return Err(PostServiceError::ValidationError(
                    "Select a valid choice. That choice is not one of the available choices."
                        .to_string(),
                ));
            }
        }
        if let Some(id) = location_id {
            let exists = self
                .location_repo
                .get_by_id(id)
                .await
                .context("Failed to get location")?
                .is_some();
            if !exists {
                return Err(PostServiceError::ValidationError(
                    "Select a valid choice. That choice is not one of the available choices."
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<String, PostServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(PostServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            TITLE_MAX_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_text(text: &str) -> Result<(), PostServiceError> {
    if text.trim().is_empty() {
        return Err(PostServiceError::ValidationError(
            "Text cannot be empty".to_string(),
        ));
    }
    Ok(())
}
