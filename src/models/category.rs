//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A thematic category. Posts are listed per category under `/category/{slug}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// URL identifier (unique)
    pub slug: String,
    /// Unpublishing a category hides all of its posts from public listings
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(title: String, description: String, slug: String) -> Self {
        Self {
            id: 0,
            title,
            description,
            slug,
            is_published: true,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

/// Input for updating a category; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub is_published: Option<bool>,
}

pub(crate) fn default_published() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_new_is_published() {
        let category = Category::new("News".to_string(), "All the news".to_string(), "news".to_string());
        assert_eq!(category.id, 0);
        assert_eq!(category.slug, "news");
        assert!(category.is_published);
    }

    #[test]
    fn test_create_input_defaults() {
        let input: CreateCategoryInput =
            serde_json::from_str(r#"{"title": "News", "slug": "news"}"#).unwrap();
        assert!(input.is_published);
        assert!(input.description.is_empty());
    }
}
