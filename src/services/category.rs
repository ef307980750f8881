//! Category service
//!
//! Implements business logic for category management:
//! - Create, read, update, delete categories
//! - Slug format and uniqueness validation
//! - Public lookup that only resolves published categories

use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const TITLE_MAX_LEN: usize = 256;
pub const SLUG_MAX_LEN: usize = 50;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("Valid slug regex"));

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service for managing blog categories
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let title = input.title.trim().to_string();
        let slug = input.slug.trim().to_string();
        validate_title(&title)?;
        validate_slug(&slug)?;

        if self
            .repo
            .slug_exists(&slug, None)
            .await
            .context("Failed to check slug")?
        {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }

        let mut category = Category::new(title, input.description, slug);
        category.is_published = input.is_published;

        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        let category = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?;
        Ok(category)
    }

    /// Look up a category for its public page.
    ///
    /// Unknown and unpublished slugs are both `NotFound`.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?
            .filter(|c| c.is_published)
            .ok_or_else(|| CategoryServiceError::NotFound(slug.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        let categories = self.repo.list().await.context("Failed to list categories")?;
        Ok(categories)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))?;

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            validate_title(&title)?;
            category.title = title;
        }
        if let Some(slug) = input.slug {
            let slug = slug.trim().to_string();
            validate_slug(&slug)?;
            if self
                .repo
                .slug_exists(&slug, Some(id))
                .await
                .context("Failed to check slug")?
            {
                return Err(CategoryServiceError::DuplicateSlug(slug));
            }
            category.slug = slug;
        }
        if let Some(description) = input.description {
            category.description = description;
        }
        if let Some(is_published) = input.is_published {
            category.is_published = is_published;
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?;
        Ok(updated)
    }

    /// Delete a category; its posts remain without a category
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        if self.get_by_id(id).await?.is_none() {
            return Err(CategoryServiceError::NotFound(id.to_string()));
        }
        self.repo
            .delete(id)
            .await
            .context("Failed to delete category")?;
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), CategoryServiceError> {
    if title.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(CategoryServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            TITLE_MAX_LEN
        )));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> Result<(), CategoryServiceError> {
    if slug.len() > SLUG_MAX_LEN || !SLUG_RE.is_match(slug) {
        return Err(CategoryServiceError::ValidationError(format!(
            "Slug must be 1-{} latin letters, digits, hyphens or underscores",
            SLUG_MAX_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCategoryRepository;
    use crate::db::{create_test_pool, migrations};

    async fn create_test_service() -> CategoryService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        CategoryService::new(SqlxCategoryRepository::boxed(pool))
    }

    fn input(slug: &str, is_published: bool) -> CreateCategoryInput {
        CreateCategoryInput {
            title: format!("Title {}", slug),
            description: String::new(),
            slug: slug.to_string(),
            is_published,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_slug() {
        let service = create_test_service().await;
        service.create(input("news", true)).await.unwrap();

        let result = service.create(input("news", true)).await;
        assert!(matches!(result, Err(CategoryServiceError::DuplicateSlug(_))));
    }

    #[tokio::test]
    async fn test_create_validates_slug() {
        let service = create_test_service().await;
        for bad in ["", "with space", "кириллица", &"a".repeat(51)] {
            let result = service.create(input(bad, true)).await;
            assert!(
                matches!(result, Err(CategoryServiceError::ValidationError(_))),
                "slug {:?} should be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_published_lookup_hides_unpublished() {
        let service = create_test_service().await;
        service.create(input("open", true)).await.unwrap();
        service.create(input("closed", false)).await.unwrap();

        assert!(service.get_published_by_slug("open").await.is_ok());
        assert!(matches!(
            service.get_published_by_slug("closed").await,
            Err(CategoryServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.get_published_by_slug("missing").await,
            Err(CategoryServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_partial() {
        let service = create_test_service().await;
        let created = service.create(input("news", true)).await.unwrap();
        service.create(input("taken", true)).await.unwrap();

        let updated = service
            .update(
                created.id,
                UpdateCategoryInput {
                    is_published: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_published);
        assert_eq!(updated.slug, "news");

        let clash = service
            .update(
                created.id,
                UpdateCategoryInput {
                    slug: Some("taken".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(CategoryServiceError::DuplicateSlug(_))));
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let service = create_test_service().await;
        assert!(matches!(
            service.delete(42).await,
            Err(CategoryServiceError::NotFound(_))
        ));
    }
}
